use redb_bincode::ReadableTable as _;
use seshat_core::{RecordId, SessionToken, StoredSessionRecord, Timestamp};
use tracing::{debug, warn};

use crate::{
    Database, DbError, DbResult, LOG_TARGET, SessionRecordStored, sessions, sessions_by_time,
    sessions_by_token, sessions_next_id,
};

impl Database {
    pub(crate) fn insert_session_tx(
        record: SessionRecordStored,
        sessions_next_id_table: &mut sessions_next_id::Table,
        sessions_table: &mut sessions::Table,
        sessions_by_token_table: &mut sessions_by_token::Table,
        sessions_by_time_table: &mut sessions_by_time::Table,
    ) -> DbResult<RecordId> {
        let id = sessions_next_id_table
            .get(&())?
            .map(|g| g.value())
            .unwrap_or(RecordId::new(1));
        let next_id = id.next().ok_or(DbError::Overflow)?;
        sessions_next_id_table.insert(&(), &next_id)?;

        sessions_by_token_table.insert(&(record.token.clone(), id), &())?;
        sessions_by_time_table.insert(&(record.created_at, id), &())?;
        sessions_table.insert(&id, &record)?;

        debug!(target: LOG_TARGET, %id, token = %record.token.short(), "Session record inserted");
        Ok(id)
    }

    pub(crate) fn find_by_token_tx(
        token: &SessionToken,
        sessions_table: &impl sessions::ReadableTable,
        sessions_by_token_table: &impl sessions_by_token::ReadableTable,
    ) -> DbResult<Vec<StoredSessionRecord>> {
        let ids = sessions_by_token_table
            .range(&(token.clone(), RecordId::ZERO)..=&(token.clone(), RecordId::MAX))?
            .map(|res| res.map(|(k, _)| k.value().1))
            .collect::<Result<Vec<_>, _>>()?;

        Self::load_sessions_tx(ids, sessions_table)
    }

    pub(crate) fn find_created_before_tx(
        cutoff: Timestamp,
        limit: usize,
        sessions_table: &impl sessions::ReadableTable,
        sessions_by_time_table: &impl sessions_by_time::ReadableTable,
    ) -> DbResult<Vec<StoredSessionRecord>> {
        let ids = sessions_by_time_table
            .range(&(Timestamp::ZERO, RecordId::ZERO)..=&(cutoff, RecordId::MAX))?
            .take(limit)
            .map(|res| res.map(|(k, _)| k.value().1))
            .collect::<Result<Vec<_>, _>>()?;

        Self::load_sessions_tx(ids, sessions_table)
    }

    fn load_sessions_tx(
        ids: Vec<RecordId>,
        sessions_table: &impl sessions::ReadableTable,
    ) -> DbResult<Vec<StoredSessionRecord>> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(stored) = sessions_table.get(&id)?.map(|g| g.value()) else {
                // Index entry without a record; delete removes both in one
                // transaction, so this should never happen.
                warn!(target: LOG_TARGET, %id, "Dangling session index entry");
                continue;
            };
            records.push(StoredSessionRecord {
                id,
                inner: stored.into_record(id)?,
            });
        }
        Ok(records)
    }

    pub(crate) fn delete_sessions_tx(
        ids: &[RecordId],
        sessions_table: &mut sessions::Table,
        sessions_by_token_table: &mut sessions_by_token::Table,
        sessions_by_time_table: &mut sessions_by_time::Table,
    ) -> DbResult<Vec<RecordId>> {
        let mut removed = Vec::with_capacity(ids.len());
        for &id in ids {
            let Some(stored) = sessions_table.remove(&id)?.map(|g| g.value()) else {
                continue;
            };
            sessions_by_token_table.remove(&(stored.token, id))?;
            sessions_by_time_table.remove(&(stored.created_at, id))?;
            removed.push(id);
        }

        debug!(target: LOG_TARGET, requested = ids.len(), removed = removed.len(), "Session records deleted");
        Ok(removed)
    }

    pub(crate) fn count_sessions_tx(
        sessions_table: &impl sessions::ReadableTable,
    ) -> DbResult<usize> {
        let mut count = 0;
        for res in sessions_table.range::<RecordId>(..)? {
            res?;
            count += 1;
        }
        Ok(count)
    }
}
