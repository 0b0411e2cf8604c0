mod article_ops;
mod feed_ops;
mod tables;

use std::io;
use std::path::{Path, PathBuf};

use bincode::{Decode, Encode};
use herald_core::ArticleId;
use redb::{ReadTransaction, ReadableTable as _, WriteTransaction};
use snafu::{Location, ResultExt as _, Snafu};
use tokio::task::JoinError;
use tracing::{debug, info, instrument};

pub use self::article_ops::{InsertOutcome, MarkOutcome};
pub use self::tables::*;
pub(crate) use self::tables::{ARTICLES_COUNTER, FEEDS_COUNTER};

const LOG_TARGET: &str = "herald::db";

/// Schema version this code writes
const DB_VER: u64 = 1;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
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
    Encode {
        source: bincode::error::EncodeError,
        #[snafu(implicit)]
        location: Location,
    },
    Decode {
        source: bincode::error::DecodeError,
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
    #[snafu(display("Article {id} not found"))]
    ArticleNotFound {
        id: ArticleId,
        #[snafu(implicit)]
        location: Location,
    },
    Overflow,
}
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Durable article store and feed registry
///
/// Every operation is a single `redb` transaction, and `redb` allows only one
/// write transaction at a time, so concurrent callers need no extra locking.
#[derive(Debug)]
pub struct Database {
    inner: redb::Database,
}

impl Database {
    pub async fn mk_db_path(data_dir: &Path) -> std::result::Result<PathBuf, io::Error> {
        tokio::fs::create_dir_all(&data_dir).await?;
        Ok(data_dir.join("herald.redb"))
    }

    #[instrument(skip_all)]
    pub async fn open(path: impl Into<PathBuf>) -> DbResult<Database> {
        let path = path.into();
        debug!(target: LOG_TARGET, path = %path.display(), "Opening database");
        let inner = tokio::task::spawn_blocking(move || redb::Database::create(path))
            .await
            .context(JoinSnafu)?
            .context(DatabaseSnafu)?;

        let s = Self { inner };

        s.write_with(|tx| {
            Self::init_tables_tx(tx)?;
            Self::handle_db_ver_tx(tx)?;
            Ok(())
        })
        .await?;

        Ok(s)
    }

    fn init_tables_tx(tx: &WriteTransaction) -> DbResult<()> {
        tx.open_table(db_version::TABLE)?;
        tx.open_table(id_counters::TABLE)?;
        tx.open_table(feeds::TABLE)?;
        tx.open_table(articles::TABLE)?;
        tx.open_table(articles_by_link::TABLE)?;
        tx.open_table(articles_unposted::TABLE)?;
        Ok(())
    }

    fn handle_db_ver_tx(tx: &WriteTransaction) -> DbResult<()> {
        let mut table_db_ver = tx.open_table(db_version::TABLE)?;

        let Some(cur_db_ver) = table_db_ver.get(())?.map(|g| g.value()) else {
            info!(target: LOG_TARGET, "Initializing new database");
            table_db_ver.insert((), DB_VER)?;
            return Ok(());
        };

        debug!(target: LOG_TARGET, db_ver = cur_db_ver, "Checking db version");
        if DB_VER < cur_db_ver {
            return DbVersionTooHighSnafu {
                db_ver: cur_db_ver,
                code_ver: DB_VER,
            }
            .fail();
        }

        Ok(())
    }

    pub async fn write_with<T>(
        &self,
        f: impl FnOnce(&'_ WriteTransaction) -> DbResult<T>,
    ) -> DbResult<T> {
        tokio::task::block_in_place(|| {
            let dbtx = self.inner.begin_write().context(TransactionSnafu)?;
            let res = f(&dbtx)?;

            dbtx.commit().context(CommitSnafu)?;

            Ok(res)
        })
    }

    pub async fn read_with<T>(
        &self,
        f: impl FnOnce(&'_ ReadTransaction) -> DbResult<T>,
    ) -> DbResult<T> {
        tokio::task::block_in_place(|| {
            let dbtx = self.inner.begin_read().context(TransactionSnafu)?;

            f(&dbtx)
        })
    }

    /// Hand out the next id of a kind, starting at 1
    pub(crate) fn next_id_tx(counters_t: &mut id_counters::Table, kind: &str) -> DbResult<u64> {
        let next = counters_t.get(kind)?.map(|g| g.value()).unwrap_or(1);
        let after = next.checked_add(1).ok_or(DbError::Overflow)?;
        counters_t.insert(kind, after)?;
        Ok(next)
    }
}

pub(crate) fn encode_record<T: Encode>(record: &T) -> DbResult<Vec<u8>> {
    bincode::encode_to_vec(record, bincode::config::standard()).context(EncodeSnafu)
}

pub(crate) fn decode_record<T: Decode<()>>(bytes: &[u8]) -> DbResult<T> {
    let (record, _len) =
        bincode::decode_from_slice(bytes, bincode::config::standard()).context(DecodeSnafu)?;
    Ok(record)
}
