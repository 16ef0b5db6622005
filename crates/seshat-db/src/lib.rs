//! Persistent and in-memory session record stores.
//!
//! [`RecordStore`] is the whole contract the session manager relies on.
//! [`Database`] implements it on top of a redb file, [`MemRecordStore`] keeps
//! everything in process memory.

mod mem;
mod migration_ops;
mod store;
mod tables;
mod tx_ops;

use std::path::PathBuf;

use async_trait::async_trait;
use redb_bincode::{ReadTransaction, WriteTransaction};
use seshat_core::{RecordId, SessionRecord, SessionToken, StoredSessionRecord, Timestamp};
use snafu::{Location, ResultExt as _, Snafu};
use tokio::task::JoinError;
use tracing::{debug, instrument};

pub use self::mem::MemRecordStore;
pub use self::store::{BackendSnafu, RecordStore, StoreError, StoreResult};
pub use self::tables::*;

const LOG_TARGET: &str = "seshat::db";

#[derive(Debug, Snafu)]
pub enum DbError {
    Database {
        source: redb::DatabaseError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(transparent)]
    Table {
        source: redb::TableError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(transparent)]
    Storage {
        source: redb::StorageError,
        #[snafu(implicit)]
        location: Location,
    },
    Transaction {
        source: redb::TransactionError,
        #[snafu(implicit)]
        location: Location,
    },
    Commit {
        source: redb::CommitError,
        #[snafu(implicit)]
        location: Location,
    },
    DbVersionTooHigh {
        db_ver: u64,
        code_ver: u64,
        #[snafu(implicit)]
        location: Location,
    },
    Join {
        source: JoinError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Can't serialize session data"))]
    SessionDataEncode {
        source: serde_json::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Corrupted session data in record {id}"))]
    SessionDataDecode {
        id: RecordId,
        source: serde_json::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Record id space exhausted"))]
    Overflow,
}
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Session record store backed by a redb database file
#[derive(Debug)]
pub struct Database {
    inner: redb_bincode::Database,
}

impl Database {
    #[instrument(skip_all)]
    pub async fn open(path: impl Into<PathBuf>) -> DbResult<Database> {
        let path = path.into();
        debug!(target: LOG_TARGET, path = %path.display(), "Opening database");
        let inner = tokio::task::spawn_blocking(move || redb_bincode::Database::create(path))
            .await
            .context(JoinSnafu)?
            .context(DatabaseSnafu)?;

        Self::write_with_inner(&inner, |tx| {
            Self::init_tables_tx(tx)?;
            Self::handle_db_ver_migrations(tx)?;
            Ok(())
        })
        .await?;

        Ok(Self { inner })
    }

    pub async fn write_with_inner<T>(
        inner: &redb_bincode::Database,
        f: impl FnOnce(&'_ WriteTransaction) -> DbResult<T>,
    ) -> DbResult<T> {
        tokio::task::block_in_place(|| {
            let dbtx = inner.begin_write().context(TransactionSnafu)?;
            let res = f(&dbtx)?;

            dbtx.commit().context(CommitSnafu)?;

            Ok(res)
        })
    }

    pub async fn write_with<T>(
        &self,
        f: impl FnOnce(&'_ WriteTransaction) -> DbResult<T>,
    ) -> DbResult<T> {
        Self::write_with_inner(&self.inner, f).await
    }

    pub async fn read_with_inner<T>(
        inner: &redb_bincode::Database,
        f: impl FnOnce(&'_ ReadTransaction) -> DbResult<T>,
    ) -> DbResult<T> {
        tokio::task::block_in_place(|| {
            let dbtx = inner.begin_read().context(TransactionSnafu)?;

            f(&dbtx)
        })
    }

    pub async fn read_with<T>(
        &self,
        f: impl FnOnce(&'_ ReadTransaction) -> DbResult<T>,
    ) -> DbResult<T> {
        Self::read_with_inner(&self.inner, f).await
    }
}

#[async_trait]
impl RecordStore for Database {
    async fn insert(&self, record: SessionRecord) -> StoreResult<RecordId> {
        let stored = SessionRecordStored::from_record(&record)?;
        Ok(self
            .write_with(|tx| {
                Database::insert_session_tx(
                    stored,
                    &mut tx.open_table(&sessions_next_id::TABLE)?,
                    &mut tx.open_table(&sessions::TABLE)?,
                    &mut tx.open_table(&sessions_by_token::TABLE)?,
                    &mut tx.open_table(&sessions_by_time::TABLE)?,
                )
            })
            .await?)
    }

    async fn find_by_token(&self, token: &SessionToken) -> StoreResult<Vec<StoredSessionRecord>> {
        Ok(self
            .read_with(|tx| {
                Database::find_by_token_tx(
                    token,
                    &tx.open_table(&sessions::TABLE)?,
                    &tx.open_table(&sessions_by_token::TABLE)?,
                )
            })
            .await?)
    }

    async fn delete_by_ids(&self, ids: &[RecordId]) -> StoreResult<Vec<RecordId>> {
        Ok(self
            .write_with(|tx| {
                Database::delete_sessions_tx(
                    ids,
                    &mut tx.open_table(&sessions::TABLE)?,
                    &mut tx.open_table(&sessions_by_token::TABLE)?,
                    &mut tx.open_table(&sessions_by_time::TABLE)?,
                )
            })
            .await?)
    }

    async fn find_created_before(
        &self,
        cutoff: Timestamp,
        limit: usize,
    ) -> StoreResult<Vec<StoredSessionRecord>> {
        Ok(self
            .read_with(|tx| {
                Database::find_created_before_tx(
                    cutoff,
                    limit,
                    &tx.open_table(&sessions::TABLE)?,
                    &tx.open_table(&sessions_by_time::TABLE)?,
                )
            })
            .await?)
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self
            .read_with(|tx| Database::count_sessions_tx(&tx.open_table(&sessions::TABLE)?))
            .await?)
    }
}
