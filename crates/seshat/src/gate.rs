//! Allow/deny decisions for protected requests.

use std::sync::Arc;

use seshat_core::{SessionData, SessionToken};
use seshat_db::RecordStore;
use seshat_util_error::FmtCompact as _;
use snafu::Snafu;
use tracing::{debug, warn};

use crate::manager::{SessionManager, Validation};

const LOG_TARGET: &str = "seshat::gate";

/// Identity of the caller behind an accepted token
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Principal {
    pub username: String,
    pub data: Option<SessionData>,
}

#[derive(Debug, Snafu, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    #[snafu(display("Not authorised"))]
    Unauthorized,
    #[snafu(display("Internal error"))]
    InternalError,
}

impl DenyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::Unauthorized => "unauthorized",
            DenyReason::InternalError => "internal_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Allow(Principal),
    Deny(DenyReason),
}

impl Outcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Outcome::Allow(_))
    }

    pub fn into_result(self) -> Result<Principal, DenyReason> {
        match self {
            Outcome::Allow(principal) => Ok(principal),
            Outcome::Deny(reason) => Err(reason),
        }
    }
}

impl From<Validation> for Outcome {
    fn from(validation: Validation) -> Self {
        match validation {
            Validation {
                valid: true,
                username: Some(username),
                data,
            } => Outcome::Allow(Principal { username, data }),
            _ => Outcome::Deny(DenyReason::Unauthorized),
        }
    }
}

/// Pick the token out of a request: body first, then query
///
/// Empty values count as absent.
pub fn extract_token<'a>(body: Option<&'a str>, query: Option<&'a str>) -> Option<&'a str> {
    body.filter(|t| !t.is_empty())
        .or_else(|| query.filter(|t| !t.is_empty()))
}

/// Gate in front of protected operations
pub struct AuthorizationGate<S> {
    manager: Arc<SessionManager<S>>,
}

impl<S> Clone for AuthorizationGate<S> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
        }
    }
}

impl<S> AuthorizationGate<S>
where
    S: RecordStore,
{
    pub fn new(manager: Arc<SessionManager<S>>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<SessionManager<S>> {
        &self.manager
    }

    pub async fn authorize(&self, token: Option<&str>) -> Outcome {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            debug!(target: LOG_TARGET, "No session token");
            return Outcome::Deny(DenyReason::Unauthorized);
        };
        let token = SessionToken::from(token);

        match self.manager.validate_session(&token).await {
            Ok(validation) => {
                let outcome = Outcome::from(validation);
                if !outcome.is_allowed() {
                    debug!(target: LOG_TARGET, token = %token.short(), "Session rejected");
                }
                outcome
            }
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    err = %err.fmt_compact(),
                    token = %token.short(),
                    "Session validation failed"
                );
                Outcome::Deny(DenyReason::InternalError)
            }
        }
    }
}
