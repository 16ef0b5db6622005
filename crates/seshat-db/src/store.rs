use std::sync::Arc;

use async_trait::async_trait;
use seshat_core::{RecordId, SessionRecord, SessionToken, StoredSessionRecord, Timestamp};
use snafu::Snafu;

use crate::DbError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    #[snafu(transparent)]
    Db { source: DbError },
    #[snafu(display("Record store backend error: {msg}"))]
    Backend { msg: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Storage for session records
///
/// Implementations own the physical records and nothing else: they never
/// decide whether a session is still valid.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new record, returning the id the store assigned to it
    ///
    /// Either the whole record is stored, or nothing is.
    async fn insert(&self, record: SessionRecord) -> StoreResult<RecordId>;

    /// All records carrying `token`, in ascending [`RecordId`] order
    ///
    /// No match is an empty `Vec`, not an error.
    async fn find_by_token(&self, token: &SessionToken) -> StoreResult<Vec<StoredSessionRecord>>;

    /// Remove records by id, returning the ids that were actually removed
    async fn delete_by_ids(&self, ids: &[RecordId]) -> StoreResult<Vec<RecordId>>;

    /// Up to `limit` records created at or before `cutoff`, oldest first
    async fn find_created_before(
        &self,
        cutoff: Timestamp,
        limit: usize,
    ) -> StoreResult<Vec<StoredSessionRecord>>;

    /// Number of records currently stored
    async fn count(&self) -> StoreResult<usize>;
}

#[async_trait]
impl<S> RecordStore for Arc<S>
where
    S: RecordStore + ?Sized,
{
    async fn insert(&self, record: SessionRecord) -> StoreResult<RecordId> {
        (**self).insert(record).await
    }

    async fn find_by_token(&self, token: &SessionToken) -> StoreResult<Vec<StoredSessionRecord>> {
        (**self).find_by_token(token).await
    }

    async fn delete_by_ids(&self, ids: &[RecordId]) -> StoreResult<Vec<RecordId>> {
        (**self).delete_by_ids(ids).await
    }

    async fn find_created_before(
        &self,
        cutoff: Timestamp,
        limit: usize,
    ) -> StoreResult<Vec<StoredSessionRecord>> {
        (**self).find_created_before(cutoff, limit).await
    }

    async fn count(&self) -> StoreResult<usize> {
        (**self).count().await
    }
}
