//! SQLite-backed vote store.
//!
//! Two tables live in one database file:
//!
//! - `votes`: the singleton tally row (`id = 1`) with `upvotes` and `downvotes`.
//! - `user_votes`: append-only log of accepted votes, one row per vote,
//!   keyed by voter identity and timestamped in Unix milliseconds (UTC).
//!
//! Every counter change goes through [`VoteStore::record_vote`] or
//! [`VoteStore::cast_vote`], which update the tally and append the log row in
//! the same transaction.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use crate::error::{CoreError, CoreResult};
use crate::vote::{IntegrityWarning, TallyRead, Totals, VoteType, VoterIdentity};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS votes (
        id INTEGER PRIMARY KEY,
        upvotes INTEGER NOT NULL DEFAULT 0 CHECK (upvotes >= 0),
        downvotes INTEGER NOT NULL DEFAULT 0 CHECK (downvotes >= 0)
    );
    CREATE TABLE IF NOT EXISTS user_votes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        voter_identity TEXT NOT NULL,
        vote_time INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_user_votes_identity_time
        ON user_votes (voter_identity, vote_time);
";

const TALLY_ID: i64 = 1;

fn missing_tally() -> CoreError {
    CoreError::DataIntegrity("tally row is missing".to_string())
}

/// Handle to the vote database.
///
/// Cloning is cheap; all clones share one connection. The connection is
/// locked for the duration of a single operation and released on return.
#[derive(Clone, Debug)]
pub struct VoteStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl VoteStore {
    /// Opens (or creates) the database at `path` and makes sure the schema
    /// and the tally row exist.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!("SQLite journal mode: {mode}");

        Self::init_schema(&conn)?;
        tracing::info!("Vote store opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path),
        })
    }

    /// Opens a private in-memory database with the same schema.
    pub fn open_in_memory() -> CoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Location of the database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init_schema(conn: &Connection) -> CoreResult<()> {
        conn.execute_batch(SCHEMA)?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO votes (id, upvotes, downvotes) VALUES (?1, 0, 0)",
            params![TALLY_ID],
        )?;
        if inserted > 0 {
            tracing::info!("Initialised empty vote tally");
        }
        Ok(())
    }

    fn lock(&self) -> CoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoreError::StorageUnavailable("connection lock poisoned".to_string()))
    }

    /// Reads the current tally.
    ///
    /// A missing tally row is not an error here: the read yields zeros and
    /// carries [`IntegrityWarning::MissingTally`] so the caller can report it.
    pub fn get_totals(&self) -> CoreResult<TallyRead> {
        let conn = self.lock()?;
        let row = read_totals(&conn)?;
        Ok(match row {
            Some(totals) => TallyRead {
                totals,
                warning: None,
            },
            None => TallyRead {
                totals: Totals::default(),
                warning: Some(IntegrityWarning::MissingTally),
            },
        })
    }

    /// Records a vote stamped with the current time.
    pub fn record_vote(&self, identity: &VoterIdentity, vote_type: VoteType) -> CoreResult<Totals> {
        self.record_vote_at(identity, vote_type, Utc::now())
    }

    /// Increments the counter for `vote_type` and appends a record for
    /// `identity` at `at`. Both changes commit together or not at all.
    pub fn record_vote_at(
        &self,
        identity: &VoterIdentity,
        vote_type: VoteType,
        at: DateTime<Utc>,
    ) -> CoreResult<Totals> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let totals = apply_vote(&tx, identity, vote_type, at)?;
        tx.commit()?;
        Ok(totals)
    }

    /// Checks the daily limit and records the vote in one immediate
    /// transaction, so two requests for the same identity cannot both slip
    /// under the limit.
    ///
    /// # Errors
    ///
    /// - [`CoreError::RateLimitExceeded`] if `identity` already has `limit`
    ///   records at or after `window_start`. Nothing is written.
    /// - [`CoreError::DataIntegrity`] if the tally row is missing.
    /// - [`CoreError::StorageUnavailable`] on any database failure.
    pub fn cast_vote(
        &self,
        identity: &VoterIdentity,
        vote_type: VoteType,
        limit: u32,
        window_start: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> CoreResult<Totals> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let used = count_since(&tx, identity, window_start)?;
        if used >= u64::from(limit) {
            tracing::debug!("Identity {identity} at daily limit ({used}/{limit})");
            return Err(CoreError::RateLimitExceeded { limit });
        }

        let totals = apply_vote(&tx, identity, vote_type, at)?;
        tx.commit()?;
        Ok(totals)
    }

    /// Number of records for `identity` with a timestamp at or after `since`.
    pub fn count_since(&self, identity: &VoterIdentity, since: DateTime<Utc>) -> CoreResult<u64> {
        let conn = self.lock()?;
        count_since(&conn, identity, since)
    }

    /// Number of vote records ever kept.
    pub fn record_count(&self) -> CoreResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM user_votes", [], |row| row.get(0))?;
        Ok(to_count(count))
    }

    /// Deletes vote records older than `cutoff`. The tally is untouched.
    pub fn purge_before(&self, cutoff: DateTime<Utc>) -> CoreResult<u64> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM user_votes WHERE vote_time < ?1",
            params![cutoff.timestamp_millis()],
        )?;
        Ok(removed as u64)
    }
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn read_totals(conn: &Connection) -> CoreResult<Option<Totals>> {
    let row = conn
        .query_row(
            "SELECT upvotes, downvotes FROM votes WHERE id = ?1",
            params![TALLY_ID],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?;
    Ok(row.map(|(up, down)| Totals::new(to_count(up), to_count(down))))
}

fn count_since(conn: &Connection, identity: &VoterIdentity, since: DateTime<Utc>) -> CoreResult<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM user_votes WHERE voter_identity = ?1 AND vote_time >= ?2",
        params![identity.as_str(), since.timestamp_millis()],
        |row| row.get(0),
    )?;
    Ok(to_count(count))
}

fn apply_vote(
    tx: &Transaction<'_>,
    identity: &VoterIdentity,
    vote_type: VoteType,
    at: DateTime<Utc>,
) -> CoreResult<Totals> {
    let sql = match vote_type {
        VoteType::Upvote => "UPDATE votes SET upvotes = upvotes + 1 WHERE id = ?1",
        VoteType::Downvote => "UPDATE votes SET downvotes = downvotes + 1 WHERE id = ?1",
    };
    if tx.execute(sql, params![TALLY_ID])? == 0 {
        return Err(missing_tally());
    }

    tx.execute(
        "INSERT INTO user_votes (voter_identity, vote_time) VALUES (?1, ?2)",
        params![identity.as_str(), at.timestamp_millis()],
    )?;

    read_totals(tx)?.ok_or_else(missing_tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn id(raw: &str) -> VoterIdentity {
        VoterIdentity::new(raw).unwrap()
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, hour, minute, 0).unwrap()
    }

    fn drop_tally(store: &VoteStore) {
        store
            .conn
            .lock()
            .unwrap()
            .execute("DELETE FROM votes", [])
            .unwrap();
    }

    // --- open ---

    #[test]
    fn fresh_store_has_zero_totals() {
        let store = VoteStore::open_in_memory().unwrap();
        let read = store.get_totals().unwrap();
        assert_eq!(read.totals, Totals::new(0, 0));
        assert!(read.warning.is_none());
        assert_eq!(store.record_count().unwrap(), 0);
        assert!(store.path().is_none());
    }

    #[test]
    fn open_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("votes.db");
        let store = VoteStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), Some(path.as_path()));
    }

    #[test]
    fn tally_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("votes.db");
        {
            let store = VoteStore::open(&path).unwrap();
            store.record_vote(&id("A"), VoteType::Upvote).unwrap();
            store.record_vote(&id("A"), VoteType::Downvote).unwrap();
        }
        let store = VoteStore::open(&path).unwrap();
        assert_eq!(store.get_totals().unwrap().totals, Totals::new(1, 1));
        assert_eq!(store.record_count().unwrap(), 2);
    }

    #[test]
    fn reopen_keeps_single_tally_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("votes.db");
        VoteStore::open(&path).unwrap();
        let store = VoteStore::open(&path).unwrap();
        let rows: i64 = store
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM votes", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    // --- record_vote ---

    #[test]
    fn upvote_increments_only_upvotes() {
        let store = VoteStore::open_in_memory().unwrap();
        store.record_vote(&id("A"), VoteType::Downvote).unwrap();
        let totals = store.record_vote(&id("A"), VoteType::Upvote).unwrap();
        assert_eq!(totals, Totals::new(1, 1));
        let totals = store.record_vote(&id("B"), VoteType::Upvote).unwrap();
        assert_eq!(totals, Totals::new(2, 1));
    }

    #[test]
    fn downvote_increments_only_downvotes() {
        let store = VoteStore::open_in_memory().unwrap();
        store.record_vote(&id("A"), VoteType::Upvote).unwrap();
        let totals = store.record_vote(&id("A"), VoteType::Downvote).unwrap();
        assert_eq!(totals, Totals::new(1, 1));
    }

    #[test]
    fn totals_match_record_count() {
        let store = VoteStore::open_in_memory().unwrap();
        let votes = [
            ("A", VoteType::Upvote),
            ("B", VoteType::Downvote),
            ("A", VoteType::Upvote),
            ("C", VoteType::Upvote),
            ("B", VoteType::Downvote),
        ];
        for (who, vote_type) in votes {
            store.record_vote(&id(who), vote_type).unwrap();
        }
        let totals = store.get_totals().unwrap().totals;
        assert_eq!(totals, Totals::new(3, 2));
        assert_eq!(totals.total(), store.record_count().unwrap());
    }

    #[test]
    fn missing_tally_reads_as_zero_with_warning() {
        let store = VoteStore::open_in_memory().unwrap();
        store.record_vote(&id("A"), VoteType::Upvote).unwrap();
        drop_tally(&store);

        let read = store.get_totals().unwrap();
        assert_eq!(read.totals, Totals::default());
        assert_eq!(read.warning, Some(IntegrityWarning::MissingTally));
    }

    #[test]
    fn missing_tally_aborts_vote_without_record() {
        let store = VoteStore::open_in_memory().unwrap();
        drop_tally(&store);

        let err = store.record_vote(&id("A"), VoteType::Upvote).unwrap_err();
        assert!(matches!(err, CoreError::DataIntegrity(_)));
        assert_eq!(err.to_string(), "data integrity error: tally row is missing");
        assert_eq!(store.record_count().unwrap(), 0);

        let err = store
            .cast_vote(&id("A"), VoteType::Downvote, 3, at(0, 0), at(9, 0))
            .unwrap_err();
        assert_eq!(err.to_string(), "data integrity error: tally row is missing");
        assert_eq!(store.record_count().unwrap(), 0);
    }

    // --- cast_vote ---

    #[test]
    fn cast_vote_rejects_at_limit_without_mutation() {
        let store = VoteStore::open_in_memory().unwrap();
        let window = at(0, 0);
        for minute in 0..3 {
            store
                .cast_vote(&id("A"), VoteType::Upvote, 3, window, at(9, minute))
                .unwrap();
        }

        let err = store
            .cast_vote(&id("A"), VoteType::Downvote, 3, window, at(10, 0))
            .unwrap_err();
        assert!(matches!(err, CoreError::RateLimitExceeded { limit: 3 }));
        assert_eq!(store.get_totals().unwrap().totals, Totals::new(3, 0));
        assert_eq!(store.record_count().unwrap(), 3);
    }

    #[test]
    fn cast_vote_ignores_records_before_window() {
        let store = VoteStore::open_in_memory().unwrap();
        let yesterday = at(0, 0) - Duration::hours(2);
        for _ in 0..3 {
            store
                .record_vote_at(&id("A"), VoteType::Upvote, yesterday)
                .unwrap();
        }
        let totals = store
            .cast_vote(&id("A"), VoteType::Upvote, 3, at(0, 0), at(8, 0))
            .unwrap();
        assert_eq!(totals, Totals::new(4, 0));
    }

    // --- count_since / purge ---

    #[test]
    fn count_since_is_inclusive_and_per_identity() {
        let store = VoteStore::open_in_memory().unwrap();
        store
            .record_vote_at(&id("A"), VoteType::Upvote, at(0, 0))
            .unwrap();
        store
            .record_vote_at(&id("A"), VoteType::Upvote, at(0, 0) - Duration::milliseconds(1))
            .unwrap();
        store
            .record_vote_at(&id("B"), VoteType::Upvote, at(5, 0))
            .unwrap();

        assert_eq!(store.count_since(&id("A"), at(0, 0)).unwrap(), 1);
        assert_eq!(store.count_since(&id("B"), at(0, 0)).unwrap(), 1);
        assert_eq!(store.count_since(&id("C"), at(0, 0)).unwrap(), 0);
    }

    #[test]
    fn purge_before_keeps_tally_and_newer_records() {
        let store = VoteStore::open_in_memory().unwrap();
        store
            .record_vote_at(&id("A"), VoteType::Upvote, at(1, 0) - Duration::days(3))
            .unwrap();
        store
            .record_vote_at(&id("A"), VoteType::Downvote, at(1, 0))
            .unwrap();

        let removed = store.purge_before(at(0, 0)).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.record_count().unwrap(), 1);
        assert_eq!(store.get_totals().unwrap().totals, Totals::new(1, 1));
    }

    // --- concurrency ---

    #[test]
    fn concurrent_votes_do_not_lose_updates() {
        let dir = TempDir::new().unwrap();
        let store = VoteStore::open(dir.path().join("votes.db")).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let vote_type = if i % 4 == 0 {
                        VoteType::Downvote
                    } else {
                        VoteType::Upvote
                    };
                    store
                        .record_vote(&VoterIdentity::new(format!("voter-{i}")).unwrap(), vote_type)
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get_totals().unwrap().totals, Totals::new(12, 4));
        assert_eq!(store.record_count().unwrap(), 16);
    }
}
