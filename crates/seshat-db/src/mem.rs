use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use seshat_core::{RecordId, SessionRecord, SessionToken, StoredSessionRecord, Timestamp};

use crate::{DbError, RecordStore, StoreResult};

#[derive(Debug, Default)]
struct MemRecordStoreInner {
    last_id: u64,
    records: BTreeMap<RecordId, SessionRecord>,
}

/// [`RecordStore`] keeping all records in process memory
///
/// Records are gone when the store is dropped. Useful for tests and for
/// embedding where sessions don't need to outlive the process.
#[derive(Debug, Default)]
pub struct MemRecordStore {
    inner: Mutex<MemRecordStoreInner>,
}

impl MemRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemRecordStoreInner> {
        self.inner.lock().expect("Locking failed")
    }

    fn collect<'a>(
        iter: impl Iterator<Item = (&'a RecordId, &'a SessionRecord)>,
    ) -> Vec<StoredSessionRecord> {
        iter.map(|(id, record)| StoredSessionRecord {
            id: *id,
            inner: record.clone(),
        })
        .collect()
    }
}

#[async_trait]
impl RecordStore for MemRecordStore {
    async fn insert(&self, record: SessionRecord) -> StoreResult<RecordId> {
        let mut inner = self.lock();
        let next = inner.last_id.checked_add(1).ok_or(DbError::Overflow)?;
        inner.last_id = next;

        let id = RecordId::new(next);
        inner.records.insert(id, record);
        Ok(id)
    }

    async fn find_by_token(&self, token: &SessionToken) -> StoreResult<Vec<StoredSessionRecord>> {
        let inner = self.lock();
        Ok(Self::collect(
            inner.records.iter().filter(|(_, r)| &r.token == token),
        ))
    }

    async fn delete_by_ids(&self, ids: &[RecordId]) -> StoreResult<Vec<RecordId>> {
        let mut inner = self.lock();
        Ok(ids
            .iter()
            .copied()
            .filter(|id| inner.records.remove(id).is_some())
            .collect())
    }

    async fn find_created_before(
        &self,
        cutoff: Timestamp,
        limit: usize,
    ) -> StoreResult<Vec<StoredSessionRecord>> {
        let inner = self.lock();
        let mut expired = Self::collect(
            inner
                .records
                .iter()
                .filter(|(_, r)| r.created_at <= cutoff),
        );
        expired.sort_by_key(|r| (r.inner.created_at, r.id));
        expired.truncate(limit);
        Ok(expired)
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.lock().records.len())
    }
}
