use redb_bincode::{ReadableTable as _, WriteTransaction};
use tracing::{debug, info};

use crate::{
    Database, DbResult, DbVersionTooHighSnafu, LOG_TARGET, db_version, sessions, sessions_by_time,
    sessions_by_token, sessions_next_id,
};

impl Database {
    pub(crate) fn init_tables_tx(tx: &WriteTransaction) -> DbResult<()> {
        tx.open_table(&db_version::TABLE)?;

        tx.open_table(&sessions_next_id::TABLE)?;
        tx.open_table(&sessions::TABLE)?;
        tx.open_table(&sessions_by_token::TABLE)?;
        tx.open_table(&sessions_by_time::TABLE)?;
        Ok(())
    }

    pub(crate) fn handle_db_ver_migrations(dbtx: &WriteTransaction) -> DbResult<()> {
        const DB_VER: u64 = 0;

        let mut table_db_ver = dbtx.open_table(&db_version::TABLE)?;

        let Some(cur_db_ver) = table_db_ver.first()?.map(|g| g.1.value()) else {
            info!(target: LOG_TARGET, "Initializing new database");
            table_db_ver.insert(&(), &DB_VER)?;

            return Ok(());
        };

        if DB_VER < cur_db_ver {
            return DbVersionTooHighSnafu {
                db_ver: cur_db_ver,
                code_ver: DB_VER,
            }
            .fail();
        }

        // Schema has not changed since version 0, nothing to migrate
        debug!(target: LOG_TARGET, db_ver = cur_db_ver, "Db version");

        Ok(())
    }
}
