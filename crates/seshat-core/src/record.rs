use serde::{Deserialize, Serialize};
use snafu::{ResultExt as _, Snafu};

use crate::{RecordId, SessionToken, Timestamp};

/// Opaque payload attached to a session at creation time
pub type SessionData = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Snafu)]
pub enum DataError {
    #[snafu(display("Session data is not valid JSON"))]
    Json { source: serde_json::Error },
    #[snafu(display("Session data must be a JSON object"))]
    NotAnObject,
}

/// Parse session data from its JSON text form
pub fn parse_session_data(s: &str) -> Result<SessionData, DataError> {
    match serde_json::from_str::<serde_json::Value>(s).context(JsonSnafu)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => NotAnObjectSnafu.fail(),
    }
}

/// A session record, as handed to a store for insertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub token: SessionToken,
    pub username: String,
    /// Set once, when the session is created
    pub created_at: Timestamp,
    pub data: Option<SessionData>,
}

/// A session record as read back from a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSessionRecord {
    pub id: RecordId,
    pub inner: SessionRecord,
}
