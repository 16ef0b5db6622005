use bincode::{Decode, Encode};
use seshat_core::{RecordId, SessionData, SessionRecord, SessionToken, Timestamp};
use snafu::ResultExt as _;

use crate::{DbResult, SessionDataDecodeSnafu, SessionDataEncodeSnafu};

#[macro_export]
macro_rules! def_table {
    ($(#[$outer:meta])*
        $name:ident : $k:ty => $v:ty) => {
        #[allow(unused)]
        $(#[$outer])*
        pub mod $name {
            use super::*;
            pub type Key = $k;
            pub type Value = $v;
            pub type Definition<'a> = redb_bincode::TableDefinition<'a, Key, Value>;
            pub trait ReadableTable: redb_bincode::ReadableTable<Key, Value> {}
            impl<RT> ReadableTable for RT where RT: redb_bincode::ReadableTable<Key, Value> {}
            pub type Table<'a> = redb_bincode::Table<'a, Key, Value>;
            pub const TABLE: Definition = redb_bincode::TableDefinition::new(stringify!($name));
        }
    };
}

def_table! {
    /// Tracks database/schema version
    db_version: () => u64
}

def_table! {
    /// Next [`RecordId`] to hand out
    sessions_next_id: () => RecordId
}

def_table! {
    /// Session records, by store-assigned id
    sessions: RecordId => SessionRecordStored
}

def_table! {
    /// Index: token to record ids
    ///
    /// Tokens are unique in practice, but nothing here enforces it, so
    /// the id is part of the key.
    sessions_by_token: (SessionToken, RecordId) => ()
}

def_table! {
    /// Index: creation time to record ids, used to find expired sessions
    sessions_by_time: (Timestamp, RecordId) => ()
}

/// Session record as persisted
///
/// The attached data is arbitrary JSON, which bincode can't encode, so it is
/// kept as serialized JSON bytes.
#[derive(Debug, Clone, Encode, Decode)]
pub struct SessionRecordStored {
    pub token: SessionToken,
    pub username: String,
    pub created_at: Timestamp,
    pub data: Option<Vec<u8>>,
}

impl SessionRecordStored {
    pub(crate) fn from_record(record: &SessionRecord) -> DbResult<Self> {
        let data = record
            .data
            .as_ref()
            .map(serde_json::to_vec)
            .transpose()
            .context(SessionDataEncodeSnafu)?;
        Ok(Self {
            token: record.token.clone(),
            username: record.username.clone(),
            created_at: record.created_at,
            data,
        })
    }

    pub(crate) fn into_record(self, id: RecordId) -> DbResult<SessionRecord> {
        let data = self
            .data
            .map(|bytes| serde_json::from_slice::<SessionData>(&bytes))
            .transpose()
            .context(SessionDataDecodeSnafu { id })?;
        Ok(SessionRecord {
            token: self.token,
            username: self.username,
            created_at: self.created_at,
            data,
        })
    }
}
