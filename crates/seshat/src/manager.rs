use std::time::Duration;

use seshat_core::{
    DataError, RecordId, SessionData, SessionRecord, SessionToken, Timestamp, parse_session_data,
};
use seshat_db::{RecordStore, StoreError};
use snafu::{Location, ResultExt as _, Snafu, ensure};
use tracing::{debug, info, instrument, warn};

use crate::config::SessionConfig;

const LOG_TARGET: &str = "seshat::session";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionError {
    #[snafu(display("Record store failure"))]
    Storage {
        source: StoreError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Username must not be empty"))]
    EmptyUsername,
    #[snafu(display("Invalid session data"))]
    InvalidData { source: DataError },
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Parse a JSON object into [`SessionData`]
pub fn session_data_from_json(s: &str) -> SessionResult<SessionData> {
    parse_session_data(s).context(InvalidDataSnafu)
}

/// Result of validating a token
///
/// An unknown token and an expired one look exactly the same.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Validation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<SessionData>,
}

impl Validation {
    pub fn invalid() -> Self {
        Self {
            valid: false,
            username: None,
            data: None,
        }
    }

    pub fn valid(username: String, data: Option<SessionData>) -> Self {
        Self {
            valid: true,
            username: Some(username),
            data,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Deletion {
    pub removed_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SweepOutcome {
    /// Expired records found
    pub scanned: usize,
    /// Records the store actually removed
    pub removed: usize,
}

/// Issues, validates and revokes session tokens
///
/// Holds no mutable state of its own: everything lives in the record store,
/// and validity is computed from `created_at` on every read.
#[derive(Debug)]
pub struct SessionManager<S> {
    store: S,
    config: SessionConfig,
}

#[bon::bon]
impl<S> SessionManager<S>
where
    S: RecordStore,
{
    #[builder(finish_fn(name = "build"))]
    pub fn new(store: S, #[builder(default)] config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[instrument(skip_all)]
    pub async fn create_session(
        &self,
        username: &str,
        data: Option<SessionData>,
    ) -> SessionResult<SessionToken> {
        ensure!(!username.is_empty(), EmptyUsernameSnafu);

        info!(target: LOG_TARGET, %username, "Creating session");
        let token = SessionToken::generate(username);
        let id = self
            .store
            .insert(SessionRecord {
                token: token.clone(),
                username: username.to_owned(),
                created_at: Timestamp::now(),
                data,
            })
            .await
            .context(StorageSnafu)?;

        debug!(target: LOG_TARGET, %id, token = %token.short(), "Session created");
        Ok(token)
    }

    pub async fn validate_session(&self, token: &SessionToken) -> SessionResult<Validation> {
        self.validate_session_at(token, Timestamp::now()).await
    }

    /// Like [`Self::validate_session`], with the current time supplied by the
    /// caller
    pub async fn validate_session_at(
        &self,
        token: &SessionToken,
        now: Timestamp,
    ) -> SessionResult<Validation> {
        if token.is_empty() {
            return Ok(Validation::invalid());
        }

        let Some(record) = self
            .store
            .find_by_token(token)
            .await
            .context(StorageSnafu)?
            .into_iter()
            .next()
        else {
            debug!(target: LOG_TARGET, token = %token.short(), "Session not found");
            return Ok(Validation::invalid());
        };

        let record = record.inner;
        if record.token.is_empty() {
            return Ok(Validation::invalid());
        }

        let age_ms = now.millis_since(record.created_at);
        if !self.config.max_age.admits(age_ms) {
            debug!(
                target: LOG_TARGET,
                token = %token.short(),
                created_at = %record.created_at,
                age_ms,
                "Session expired"
            );
            return Ok(Validation::invalid());
        }

        Ok(Validation::valid(record.username, record.data))
    }

    /// Remove every record carrying `token`
    #[instrument(skip_all)]
    pub async fn delete_session(&self, token: &SessionToken) -> SessionResult<Deletion> {
        if token.is_empty() {
            return Ok(Deletion::default());
        }

        let ids: Vec<RecordId> = self
            .store
            .find_by_token(token)
            .await
            .context(StorageSnafu)?
            .into_iter()
            .map(|r| r.id)
            .collect();

        if ids.is_empty() {
            debug!(target: LOG_TARGET, token = %token.short(), "Nothing to delete");
            return Ok(Deletion::default());
        }

        let removed = self.store.delete_by_ids(&ids).await.context(StorageSnafu)?;
        info!(
            target: LOG_TARGET,
            token = %token.short(),
            removed = removed.len(),
            "Session deleted"
        );

        Ok(Deletion {
            removed_count: removed.len(),
        })
    }

    pub async fn sweep(&self) -> SessionResult<SweepOutcome> {
        self.sweep_at(Timestamp::now()).await
    }

    /// Physically remove every record that would no longer validate at `now`
    #[instrument(skip_all)]
    pub async fn sweep_at(&self, now: Timestamp) -> SessionResult<SweepOutcome> {
        // Anything created at or before the cutoff has `age >= max_age`
        let Some(cutoff) = now.checked_sub(Duration::from_millis(self.config.max_age.as_millis()))
        else {
            debug!(target: LOG_TARGET, "Max age reaches past the epoch, nothing to sweep");
            return Ok(SweepOutcome::default());
        };

        let batch_size = self.config.sweep_batch_size.max(1);
        let mut outcome = SweepOutcome::default();

        loop {
            let expired = self
                .store
                .find_created_before(cutoff, batch_size)
                .await
                .context(StorageSnafu)?;
            if expired.is_empty() {
                break;
            }

            let ids: Vec<RecordId> = expired.iter().map(|r| r.id).collect();
            let removed = self.store.delete_by_ids(&ids).await.context(StorageSnafu)?;

            outcome.scanned += ids.len();
            outcome.removed += removed.len();
            debug!(
                target: LOG_TARGET,
                batch = ids.len(),
                removed = removed.len(),
                "Swept batch"
            );

            if ids.len() < batch_size {
                break;
            }
            if removed.is_empty() {
                warn!(
                    target: LOG_TARGET,
                    batch = ids.len(),
                    "Store removed none of the expired records, stopping sweep"
                );
                break;
            }
        }

        Ok(outcome)
    }

    /// Number of stored records, including expired ones not swept yet
    pub async fn count_sessions(&self) -> SessionResult<usize> {
        self.store.count().await.context(StorageSnafu)
    }
}

#[cfg(test)]
mod tests;
