//! Error helpers shared by all seshat crates.
//!
//! [`FmtCompact`] renders an error together with its whole `source()` chain
//! on a single line, which is what we want in structured log fields:
//!
//! ```
//! use seshat_util_error::FmtCompact as _;
//!
//! let err = std::io::Error::other("disk on fire");
//! assert_eq!(err.fmt_compact().to_string(), "disk on fire");
//! ```

use std::{error, fmt, result};

pub type BoxedError = Box<dyn error::Error + Send + Sync + 'static>;
pub type BoxedErrorResult<T> = result::Result<T, BoxedError>;

pub type WhateverResult<T> = result::Result<T, snafu::Whatever>;

pub struct FmtCompactError<'e, E>(pub &'e E);

impl<E> fmt::Display for FmtCompactError<'_, E>
where
    E: error::Error,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut error = Some(self.0 as &dyn error::Error);

        while let Some(err) = error {
            f.write_fmt(format_args!("{err}"))?;
            error = err.source();
            if error.is_some() {
                f.write_str(": ")?;
            }
        }

        Ok(())
    }
}

pub struct FmtCompactResult<'r, O, E>(pub &'r result::Result<O, E>);

impl<O, E> fmt::Display for FmtCompactResult<'_, O, E>
where
    E: error::Error,
    O: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Ok(o) => o.fmt(f),
            Err(e) => FmtCompactError(e).fmt(f),
        }
    }
}

pub trait FmtCompact {
    type Report: fmt::Display;
    fn fmt_compact(self) -> Self::Report;
}

impl<'e, E> FmtCompact for &'e E
where
    E: error::Error,
{
    type Report = FmtCompactError<'e, E>;

    fn fmt_compact(self) -> Self::Report {
        FmtCompactError(self)
    }
}

pub trait FmtCompactResultExt {
    type Report: fmt::Display;
    fn fmt_compact_result(self) -> Self::Report;
}

impl<'r, O, E> FmtCompactResultExt for &'r result::Result<O, E>
where
    E: error::Error,
    O: fmt::Display,
{
    type Report = FmtCompactResult<'r, O, E>;

    fn fmt_compact_result(self) -> Self::Report {
        FmtCompactResult(self)
    }
}
