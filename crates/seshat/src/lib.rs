//! Opaque session tokens on top of a [`seshat_db::RecordStore`].
//!
//! [`SessionManager`] issues, validates and revokes tokens.
//! [`AuthorizationGate`] turns a token from a request into an allow/deny
//! decision, and [`sweeper::spawn_sweep_task`] periodically removes records
//! that have outlived their [`MaxAge`].

pub mod config;
pub mod gate;
pub mod manager;
pub mod sweeper;

pub use self::config::{MaxAge, SessionConfig};
pub use self::gate::{AuthorizationGate, DenyReason, Outcome, Principal, extract_token};
pub use self::manager::{
    Deletion, SessionError, SessionManager, SessionResult, SweepOutcome, Validation,
    session_data_from_json,
};
