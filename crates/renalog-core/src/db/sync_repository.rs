//! Sync queue persistence.
//!
//! Every locally-originated mutation lands here until the remote authority
//! confirms it. Record repositories enqueue inside the same transaction as
//! the row write, so a mutation and its queue entry are atomic.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use libsql::params;

use crate::error::Result;
use crate::models::{
    RecordId, SyncOperation, SyncQueueEntry, SyncTable, MAX_SYNC_ATTEMPTS,
};
use crate::util::{now, timestamp_from_sql, timestamp_to_sql};

use super::Database;

/// Storage operations for the sync queue (async)
#[allow(async_fn_in_trait)]
pub trait SyncQueueRepository {
    /// Record a local mutation awaiting remote confirmation
    async fn enqueue(
        &self,
        table: SyncTable,
        record_id: &str,
        operation: SyncOperation,
        payload: Option<&str>,
    ) -> Result<()>;

    /// Pending entries in replay order (oldest first)
    async fn pending(&self, limit: usize) -> Result<Vec<SyncQueueEntry>>;

    /// Pending entries currently eligible for replay: under the attempt cap
    /// and past their backoff window. A backed-off entry also holds back
    /// every later entry for the same record, keeping replay in edit order.
    async fn eligible(&self, limit: usize, at: DateTime<Utc>) -> Result<Vec<SyncQueueEntry>>;

    /// Drop a confirmed (or superseded) entry
    async fn remove(&self, id: &RecordId) -> Result<()>;

    /// Replace a queued entry's stored payload, used when compaction folds
    /// newer edits into a surviving entry
    async fn update_payload(&self, id: &RecordId, payload: Option<&str>) -> Result<()>;

    /// Record a failed replay attempt
    async fn record_failure(&self, id: &RecordId, error: &str) -> Result<()>;

    /// Entries still awaiting replay (under the attempt cap)
    async fn pending_count(&self) -> Result<i64>;

    /// Entries at or over the attempt cap — the "N changes failed to sync"
    /// number surfaced to the user
    async fn failed_count(&self) -> Result<i64>;

    /// Reset failed entries so the next sync pass retries them
    async fn retry_failed(&self) -> Result<()>;

    /// Flip a source row's `synced` flag after remote confirmation
    async fn mark_record_synced(&self, table: SyncTable, record_id: &str) -> Result<()>;
}

/// libSQL implementation of [`SyncQueueRepository`]
pub struct LibSqlSyncQueueRepository<'a> {
    db: &'a Database,
}

impl<'a> LibSqlSyncQueueRepository<'a> {
    /// Create a new repository over the given database
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn parse_entry(row: &libsql::Row) -> Result<SyncQueueEntry> {
        let id: String = row.get(0)?;
        let table: String = row.get(1)?;
        let operation: String = row.get(3)?;
        let last_attempt: Option<String> = row.get(6)?;

        Ok(SyncQueueEntry {
            id: id
                .parse()
                .map_err(|_| crate::Error::MalformedRow(format!("bad queue id '{id}'")))?,
            table: SyncTable::parse(&table)
                .ok_or_else(|| crate::Error::MalformedRow(format!("unknown table '{table}'")))?,
            record_id: row.get(2)?,
            operation: SyncOperation::parse(&operation).ok_or_else(|| {
                crate::Error::MalformedRow(format!("unknown operation '{operation}'"))
            })?,
            payload: row.get(4)?,
            attempts: row.get(5)?,
            last_attempt: last_attempt
                .map(|raw| timestamp_from_sql(&raw))
                .transpose()?,
            last_error: row.get(7)?,
            created_at: timestamp_from_sql(&row.get::<String>(8)?)?,
        })
    }
}

const ENTRY_COLUMNS: &str =
    "id, table_name, record_id, operation, payload, attempts, last_attempt, last_error, created_at";

impl SyncQueueRepository for LibSqlSyncQueueRepository<'_> {
    async fn enqueue(
        &self,
        table: SyncTable,
        record_id: &str,
        operation: SyncOperation,
        payload: Option<&str>,
    ) -> Result<()> {
        self.db
            .execute(
                "INSERT INTO sync_queue (id, table_name, record_id, operation, payload, attempts, created_at)
                 VALUES (?, ?, ?, ?, ?, 0, ?)",
                params![
                    RecordId::new().to_string(),
                    table.as_str(),
                    record_id,
                    operation.as_str(),
                    payload.map(std::string::ToString::to_string),
                    timestamp_to_sql(now()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn pending(&self, limit: usize) -> Result<Vec<SyncQueueEntry>> {
        #[allow(clippy::cast_possible_wrap)]
        let mut rows = self
            .db
            .query(
                &format!(
                    "SELECT {ENTRY_COLUMNS} FROM sync_queue ORDER BY created_at ASC LIMIT ?"
                ),
                params![limit as i64],
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(Self::parse_entry(&row)?);
        }
        Ok(entries)
    }

    async fn eligible(&self, limit: usize, at: DateTime<Utc>) -> Result<Vec<SyncQueueEntry>> {
        let entries = self.pending(limit).await?;

        // An ineligible entry holds back every later entry for the same
        // record, so replay never reorders edits to one record.
        let mut held: HashSet<(SyncTable, String)> = HashSet::new();
        let mut out = Vec::new();
        for entry in entries {
            let key = (entry.table, entry.record_id.clone());
            if held.contains(&key) {
                continue;
            }
            if entry.is_eligible(at) {
                out.push(entry);
            } else {
                held.insert(key);
            }
        }
        Ok(out)
    }

    async fn remove(&self, id: &RecordId) -> Result<()> {
        self.db
            .execute("DELETE FROM sync_queue WHERE id = ?", params![id.to_string()])
            .await?;
        Ok(())
    }

    async fn update_payload(&self, id: &RecordId, payload: Option<&str>) -> Result<()> {
        self.db
            .execute(
                "UPDATE sync_queue SET payload = ? WHERE id = ?",
                params![
                    payload.map(std::string::ToString::to_string),
                    id.to_string()
                ],
            )
            .await?;
        Ok(())
    }

    async fn record_failure(&self, id: &RecordId, error: &str) -> Result<()> {
        self.db
            .execute(
                "UPDATE sync_queue
                 SET attempts = attempts + 1, last_attempt = ?, last_error = ?
                 WHERE id = ?",
                params![timestamp_to_sql(now()), error, id.to_string()],
            )
            .await?;
        Ok(())
    }

    async fn pending_count(&self) -> Result<i64> {
        let mut rows = self
            .db
            .query(
                "SELECT COUNT(*) FROM sync_queue WHERE attempts < ?",
                params![MAX_SYNC_ATTEMPTS],
            )
            .await?;
        let row = rows.next().await?;
        Ok(row.map_or(0, |row| row.get(0).unwrap_or(0)))
    }

    async fn failed_count(&self) -> Result<i64> {
        let mut rows = self
            .db
            .query(
                "SELECT COUNT(*) FROM sync_queue WHERE attempts >= ?",
                params![MAX_SYNC_ATTEMPTS],
            )
            .await?;
        let row = rows.next().await?;
        Ok(row.map_or(0, |row| row.get(0).unwrap_or(0)))
    }

    async fn retry_failed(&self) -> Result<()> {
        self.db
            .execute(
                "UPDATE sync_queue
                 SET attempts = 0, last_attempt = NULL, last_error = NULL
                 WHERE attempts >= ?",
                params![MAX_SYNC_ATTEMPTS],
            )
            .await?;
        Ok(())
    }

    async fn mark_record_synced(&self, table: SyncTable, record_id: &str) -> Result<()> {
        // Table name comes from the closed SyncTable enum, never caller input.
        self.db
            .execute(
                &format!("UPDATE {} SET synced = 1 WHERE id = ?", table.as_str()),
                params![record_id],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_and_replay_order() {
        let db = setup().await;
        let queue = LibSqlSyncQueueRepository::new(&db);

        queue
            .enqueue(SyncTable::Vitals, "a", SyncOperation::Insert, Some("{}"))
            .await
            .unwrap();
        queue
            .enqueue(SyncTable::Vitals, "b", SyncOperation::Update, Some("{}"))
            .await
            .unwrap();
        queue
            .enqueue(SyncTable::FoodEntries, "c", SyncOperation::Delete, None)
            .await
            .unwrap();

        let entries = queue.pending(10).await.unwrap();
        assert_eq!(entries.len(), 3);
        // Oldest first preserves causal ordering.
        assert_eq!(entries[0].record_id, "a");
        assert_eq!(entries[1].record_id, "b");
        assert_eq!(entries[2].record_id, "c");
        assert_eq!(entries[2].payload, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failure_bumps_attempts_and_sets_error() {
        let db = setup().await;
        let queue = LibSqlSyncQueueRepository::new(&db);

        queue
            .enqueue(SyncTable::Vitals, "a", SyncOperation::Insert, Some("{}"))
            .await
            .unwrap();
        let entry = queue.pending(1).await.unwrap().remove(0);

        queue.record_failure(&entry.id, "remote unreachable").await.unwrap();

        let entry = queue.pending(1).await.unwrap().remove(0);
        assert_eq!(entry.attempts, 1);
        assert_eq!(entry.last_error.as_deref(), Some("remote unreachable"));
        assert!(entry.last_attempt.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_entries_are_counted_and_retryable() {
        let db = setup().await;
        let queue = LibSqlSyncQueueRepository::new(&db);

        queue
            .enqueue(SyncTable::Vitals, "a", SyncOperation::Insert, Some("{}"))
            .await
            .unwrap();
        let entry = queue.pending(1).await.unwrap().remove(0);
        for _ in 0..MAX_SYNC_ATTEMPTS {
            queue.record_failure(&entry.id, "nope").await.unwrap();
        }

        assert_eq!(queue.failed_count().await.unwrap(), 1);
        assert_eq!(queue.pending_count().await.unwrap(), 0);
        assert!(queue.eligible(10, now()).await.unwrap().is_empty());

        queue.retry_failed().await.unwrap();
        assert_eq!(queue.failed_count().await.unwrap(), 0);
        assert_eq!(queue.eligible(10, now()).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn backed_off_entry_holds_later_edits_to_the_same_record() {
        let db = setup().await;
        let queue = LibSqlSyncQueueRepository::new(&db);

        queue
            .enqueue(SyncTable::Vitals, "a", SyncOperation::Insert, Some("{}"))
            .await
            .unwrap();
        queue
            .enqueue(SyncTable::Vitals, "a", SyncOperation::Update, Some("{}"))
            .await
            .unwrap();
        queue
            .enqueue(SyncTable::Vitals, "b", SyncOperation::Insert, Some("{}"))
            .await
            .unwrap();

        let oldest = queue.pending(10).await.unwrap().remove(0);
        queue
            .record_failure(&oldest.id, "remote unreachable")
            .await
            .unwrap();

        // The update for "a" must not jump ahead of its backed-off insert.
        let eligible = queue.eligible(10, now()).await.unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].record_id, "b");

        let eligible = queue
            .eligible(10, now() + chrono::Duration::hours(2))
            .await
            .unwrap();
        assert_eq!(eligible.len(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_payload_rewrites_stored_entry() {
        let db = setup().await;
        let queue = LibSqlSyncQueueRepository::new(&db);

        queue
            .enqueue(SyncTable::Vitals, "a", SyncOperation::Insert, Some("{\"v\":1}"))
            .await
            .unwrap();
        let entry = queue.pending(1).await.unwrap().remove(0);

        queue
            .update_payload(&entry.id, Some("{\"v\":2}"))
            .await
            .unwrap();

        let entry = queue.pending(1).await.unwrap().remove(0);
        assert_eq!(entry.payload.as_deref(), Some("{\"v\":2}"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remove_drops_entry() {
        let db = setup().await;
        let queue = LibSqlSyncQueueRepository::new(&db);

        queue
            .enqueue(SyncTable::Vitals, "a", SyncOperation::Insert, Some("{}"))
            .await
            .unwrap();
        let entry = queue.pending(1).await.unwrap().remove(0);
        queue.remove(&entry.id).await.unwrap();
        assert!(queue.pending(10).await.unwrap().is_empty());
    }
}
