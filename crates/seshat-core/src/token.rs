//! Session token generation.
//!
//! A token is the lowercase hex encoding of a 256-bit BLAKE3 digest over the
//! current high-resolution time, 256 bits from a CSPRNG and the subject the
//! session is issued for. The subject only contributes entropy; it cannot be
//! recovered from the token.

use std::fmt;

use data_encoding::HEXLOWER;
use time::OffsetDateTime;

/// Length of every generated token, in characters
pub const TOKEN_LEN: usize = 64;

/// Opaque session token
///
/// Tokens handed in by callers are not validated on construction: a
/// malformed token is just a token that never matches any stored record.
#[cfg_attr(feature = "bincode", derive(::bincode::Encode, ::bincode::Decode))]
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a fresh token for `username`
    pub fn generate(username: &str) -> Self {
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
        let entropy: [u8; 32] = rand::random();
        Self::from_parts(username, nanos, &entropy)
    }

    fn from_parts(username: &str, nanos: i128, entropy: &[u8; 32]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&nanos.to_be_bytes());
        hasher.update(entropy);
        hasher.update(&(username.len() as u64).to_be_bytes());
        hasher.update(username.as_bytes());

        Self(HEXLOWER.encode(hasher.finalize().as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Does this look like something [`SessionToken::generate`] would return
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == TOKEN_LEN
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }

    /// Shortened form, safe to put in logs
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for SessionToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionToken {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl AsRef<str> for SessionToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
