//! Sync queue replay.
//!
//! A sync pass drains eligible queue entries oldest-first, compacts redundant
//! entries per record, pushes the survivors through a [`SyncTransport`], and
//! settles each entry on the transport's verdict. Replay is at-least-once;
//! the remote side must treat every operation as idempotent.

use std::collections::HashMap;

use crate::db::{Database, LibSqlSyncQueueRepository, SyncQueueRepository};
use crate::error::Result;
use crate::models::{RecordId, SyncOperation, SyncQueueEntry, SyncTable};
use crate::util::now;

/// Verdict from the remote authority for one pushed entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The mutation was accepted
    Applied,
    /// The remote holds a newer version of the record
    Conflict,
    /// The push failed for this entry; retried next pass
    Failed(String),
}

/// Delivery channel to the remote authority.
///
/// The data layer owns queueing and retry; implementations only move a batch
/// across the wire and report per-entry verdicts, index-aligned with the
/// batch.
#[allow(async_fn_in_trait)]
pub trait SyncTransport {
    /// Push a batch of entries, returning one verdict per entry
    async fn push(&self, batch: &[SyncQueueEntry]) -> Result<Vec<PushOutcome>>;
}

/// What `compact` decided to do with a record's queue entries
#[derive(Debug, Default)]
pub struct CompactionPlan {
    /// Entries to push, oldest first
    pub send: Vec<SyncQueueEntry>,
    /// Queue ids superseded by the surviving entries
    pub superseded: Vec<RecordId>,
    /// Survivors carrying a payload folded in from superseded entries; their
    /// stored payload must be rewritten before the superseded rows go away
    pub folded: Vec<RecordId>,
}

/// Collapse redundant queue entries per record before pushing.
///
/// For each `(table, record)` group, in queue order:
/// - insert followed eventually by delete: the record never existed
///   remotely, everything is dropped
/// - updates followed by delete: only the delete survives
/// - insert followed by updates: a single insert carrying the latest payload
/// - updates only: the latest update
#[must_use]
pub fn compact(entries: Vec<SyncQueueEntry>) -> CompactionPlan {
    let mut order: Vec<(SyncTable, String)> = Vec::new();
    let mut groups: HashMap<(SyncTable, String), Vec<SyncQueueEntry>> = HashMap::new();
    for entry in entries {
        let key = (entry.table, entry.record_id.clone());
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(entry);
    }

    let mut plan = CompactionPlan::default();
    for key in order {
        let Some(group) = groups.remove(&key) else {
            continue;
        };
        compact_group(group, &mut plan);
    }
    plan.send.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    plan
}

fn compact_group(group: Vec<SyncQueueEntry>, plan: &mut CompactionPlan) {
    let starts_with_insert = group
        .first()
        .is_some_and(|entry| entry.operation == SyncOperation::Insert);
    let ends_with_delete = group
        .last()
        .is_some_and(|entry| entry.operation == SyncOperation::Delete);

    if group.len() == 1 {
        plan.send.extend(group);
        return;
    }

    if ends_with_delete {
        let mut group = group;
        let delete = group.pop();
        plan.superseded.extend(group.into_iter().map(|entry| entry.id));
        if starts_with_insert {
            // The remote never saw this record; the delete is moot too.
            plan.superseded.extend(delete.map(|entry| entry.id));
        } else {
            plan.send.extend(delete);
        }
        return;
    }

    // Insert or update followed by updates: the latest payload wins. Keep
    // the oldest entry so the operation (and queue position) is preserved,
    // but carry the newest payload.
    let mut group = group.into_iter();
    let Some(mut survivor) = group.next() else {
        return;
    };
    let mut absorbed = false;
    for entry in group {
        survivor.payload = entry.payload;
        plan.superseded.push(entry.id);
        absorbed = true;
    }
    if absorbed {
        plan.folded.push(survivor.id);
    }
    plan.send.push(survivor);
}

/// Counts from one sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncOutcome {
    /// Entries confirmed by the remote
    pub pushed: usize,
    /// Entries that failed or conflicted this pass
    pub failed: usize,
    /// Entries dropped as superseded before pushing
    pub dropped: usize,
}

/// Drives sync passes over a database's queue through a transport
pub struct SyncEngine<'a, T: SyncTransport> {
    db: &'a Database,
    transport: T,
}

impl<'a, T: SyncTransport> SyncEngine<'a, T> {
    /// Create an engine over the given database and transport
    pub const fn new(db: &'a Database, transport: T) -> Self {
        Self { db, transport }
    }

    /// Run one sync pass over at most `limit` eligible entries.
    ///
    /// A transport that cannot reach the remote fails the whole batch; each
    /// entry's attempt counter advances and the pass reports the failures
    /// instead of erroring, since being offline is the normal case here.
    pub async fn run_once(&self, limit: usize) -> Result<SyncOutcome> {
        let queue = LibSqlSyncQueueRepository::new(self.db);
        let entries = queue.eligible(limit, now()).await?;
        if entries.is_empty() {
            return Ok(SyncOutcome::default());
        }

        let plan = compact(entries);
        if !plan.superseded.is_empty() {
            // The folded payload has to land on the surviving row before its
            // superseded siblings are dropped; otherwise a failed push would
            // leave the queue holding only the record's oldest edit.
            self.db
                .with_transaction(|| async {
                    for entry in plan
                        .send
                        .iter()
                        .filter(|entry| plan.folded.contains(&entry.id))
                    {
                        queue
                            .update_payload(&entry.id, entry.payload.as_deref())
                            .await?;
                    }
                    for id in &plan.superseded {
                        queue.remove(id).await?;
                    }
                    Ok(())
                })
                .await?;
        }
        let mut outcome = SyncOutcome {
            dropped: plan.superseded.len(),
            ..SyncOutcome::default()
        };
        if plan.send.is_empty() {
            return Ok(outcome);
        }

        let verdicts = match self.transport.push(&plan.send).await {
            Ok(verdicts) => verdicts,
            Err(error) => {
                tracing::warn!(%error, entries = plan.send.len(), "Sync push failed");
                for entry in &plan.send {
                    queue.record_failure(&entry.id, &error.to_string()).await?;
                }
                outcome.failed = plan.send.len();
                return Ok(outcome);
            }
        };

        for (entry, verdict) in plan.send.iter().zip(verdicts) {
            match verdict {
                PushOutcome::Applied => {
                    queue.remove(&entry.id).await?;
                    if entry.operation != SyncOperation::Delete {
                        queue
                            .mark_record_synced(entry.table, &entry.record_id)
                            .await?;
                    }
                    outcome.pushed += 1;
                }
                PushOutcome::Conflict => {
                    let error = crate::Error::SyncConflict {
                        table: entry.table.as_str().to_string(),
                        record_id: entry.record_id.clone(),
                    };
                    tracing::warn!(%error, "Remote rejected entry");
                    queue.record_failure(&entry.id, &error.to_string()).await?;
                    outcome.failed += 1;
                }
                PushOutcome::Failed(reason) => {
                    queue.record_failure(&entry.id, &reason).await?;
                    outcome.failed += 1;
                }
            }
        }

        tracing::debug!(
            pushed = outcome.pushed,
            failed = outcome.failed,
            dropped = outcome.dropped,
            "Sync pass complete"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users_repository::{LibSqlUsersRepository, UsersRepository};
    use crate::db::{LibSqlVitalsRepository, VitalsRepository};
    use crate::models::{NewUser, NewVitalRecord, VitalUpdate};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Transport double answering every entry with a scripted verdict
    struct ScriptedTransport {
        verdict: fn() -> PushOutcome,
        pushed: Mutex<Vec<SyncQueueEntry>>,
    }

    impl ScriptedTransport {
        fn applying() -> Self {
            Self {
                verdict: || PushOutcome::Applied,
                pushed: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                verdict: || PushOutcome::Failed("remote 503".to_string()),
                pushed: Mutex::new(Vec::new()),
            }
        }
    }

    impl SyncTransport for ScriptedTransport {
        async fn push(&self, batch: &[SyncQueueEntry]) -> Result<Vec<PushOutcome>> {
            self.pushed.lock().unwrap().extend_from_slice(batch);
            Ok(batch.iter().map(|_| (self.verdict)()).collect())
        }
    }

    async fn setup() -> (Database, RecordId) {
        let db = Database::open_in_memory().await.unwrap();
        let user = LibSqlUsersRepository::new(&db)
            .sign_up(
                NewUser {
                    email: "pat@example.com".to_string(),
                    ..NewUser::default()
                },
                "hunter2hunter2",
            )
            .await
            .unwrap();
        let id = user.id;
        (db, id)
    }

    fn entry(
        table: SyncTable,
        record_id: &str,
        operation: SyncOperation,
        payload: Option<&str>,
    ) -> SyncQueueEntry {
        // Queue order comes from time-sortable ids and creation timestamps.
        std::thread::sleep(std::time::Duration::from_millis(2));
        SyncQueueEntry {
            id: RecordId::new(),
            table,
            record_id: record_id.to_string(),
            operation,
            payload: payload.map(str::to_string),
            attempts: 0,
            last_attempt: None,
            last_error: None,
            created_at: now(),
        }
    }

    #[test]
    fn compact_drops_insert_then_delete() {
        let plan = compact(vec![
            entry(SyncTable::Vitals, "a", SyncOperation::Insert, Some("{}")),
            entry(SyncTable::Vitals, "a", SyncOperation::Update, Some("{}")),
            entry(SyncTable::Vitals, "a", SyncOperation::Delete, None),
        ]);
        assert!(plan.send.is_empty());
        assert_eq!(plan.superseded.len(), 3);
    }

    #[test]
    fn compact_keeps_only_delete_after_updates() {
        let plan = compact(vec![
            entry(SyncTable::Vitals, "a", SyncOperation::Update, Some("{}")),
            entry(SyncTable::Vitals, "a", SyncOperation::Update, Some("{}")),
            entry(SyncTable::Vitals, "a", SyncOperation::Delete, None),
        ]);
        assert_eq!(plan.send.len(), 1);
        assert_eq!(plan.send[0].operation, SyncOperation::Delete);
        assert_eq!(plan.superseded.len(), 2);
    }

    #[test]
    fn compact_folds_updates_into_insert() {
        let plan = compact(vec![
            entry(SyncTable::Vitals, "a", SyncOperation::Insert, Some("{\"v\":1}")),
            entry(SyncTable::Vitals, "a", SyncOperation::Update, Some("{\"v\":2}")),
            entry(SyncTable::Vitals, "a", SyncOperation::Update, Some("{\"v\":3}")),
        ]);
        assert_eq!(plan.send.len(), 1);
        assert_eq!(plan.send[0].operation, SyncOperation::Insert);
        assert_eq!(plan.send[0].payload.as_deref(), Some("{\"v\":3}"));
        assert_eq!(plan.superseded.len(), 2);
        assert_eq!(plan.folded, vec![plan.send[0].id]);
    }

    #[test]
    fn compact_keeps_latest_of_updates_only() {
        let plan = compact(vec![
            entry(SyncTable::Vitals, "a", SyncOperation::Update, Some("{\"v\":1}")),
            entry(SyncTable::Vitals, "a", SyncOperation::Update, Some("{\"v\":2}")),
        ]);
        assert_eq!(plan.send.len(), 1);
        assert_eq!(plan.send[0].payload.as_deref(), Some("{\"v\":2}"));
    }

    #[test]
    fn compact_leaves_unrelated_records_alone() {
        let plan = compact(vec![
            entry(SyncTable::Vitals, "a", SyncOperation::Insert, Some("{}")),
            entry(SyncTable::LabReports, "b", SyncOperation::Insert, Some("{}")),
        ]);
        assert_eq!(plan.send.len(), 2);
        assert!(plan.superseded.is_empty());
        assert!(plan.folded.is_empty());
        // Push order stays oldest-first across records.
        assert_eq!(plan.send[0].record_id, "a");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn applied_entries_clear_the_queue_and_flag_rows() {
        let (db, user) = setup().await;
        let vitals = LibSqlVitalsRepository::new(&db);
        let queue = LibSqlSyncQueueRepository::new(&db);

        let record = vitals
            .create(
                &user,
                NewVitalRecord {
                    date: "2025-06-02".parse().unwrap(),
                    weight_kg: Some(72.5),
                    ..NewVitalRecord::default()
                },
            )
            .await
            .unwrap();
        assert!(!record.synced);

        let engine = SyncEngine::new(&db, ScriptedTransport::applying());
        let outcome = engine.run_once(50).await.unwrap();

        // The signup user insert rides along with the vital insert.
        assert_eq!(outcome.pushed, 2);
        assert_eq!(outcome.failed, 0);
        assert_eq!(queue.pending_count().await.unwrap(), 0);
        assert!(vitals.get(&record.id).await.unwrap().unwrap().synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_then_delete_syncs_nothing_for_that_record() {
        let (db, user) = setup().await;
        let vitals = LibSqlVitalsRepository::new(&db);

        let record = vitals
            .create(
                &user,
                NewVitalRecord {
                    date: "2025-06-02".parse().unwrap(),
                    weight_kg: Some(72.5),
                    ..NewVitalRecord::default()
                },
            )
            .await
            .unwrap();
        vitals.delete(&record.id).await.unwrap();

        let transport = ScriptedTransport::applying();
        let engine = SyncEngine::new(&db, transport);
        engine.run_once(50).await.unwrap();

        let pushed = engine.transport.pushed.lock().unwrap();
        assert!(pushed
            .iter()
            .all(|entry| entry.record_id != record.id.to_string()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_then_update_pushes_latest_payload_once() {
        let (db, user) = setup().await;
        let vitals = LibSqlVitalsRepository::new(&db);

        let record = vitals
            .create(
                &user,
                NewVitalRecord {
                    date: "2025-06-02".parse().unwrap(),
                    weight_kg: Some(72.5),
                    ..NewVitalRecord::default()
                },
            )
            .await
            .unwrap();
        vitals
            .update(
                &record.id,
                VitalUpdate {
                    weight_kg: Some(73.0),
                    ..VitalUpdate::default()
                },
            )
            .await
            .unwrap();
        vitals
            .update(
                &record.id,
                VitalUpdate {
                    weight_kg: Some(73.5),
                    ..VitalUpdate::default()
                },
            )
            .await
            .unwrap();

        let transport = ScriptedTransport::applying();
        let engine = SyncEngine::new(&db, transport);
        engine.run_once(50).await.unwrap();

        let pushed = engine.transport.pushed.lock().unwrap();
        let for_record: Vec<_> = pushed
            .iter()
            .filter(|entry| entry.record_id == record.id.to_string())
            .collect();
        assert_eq!(for_record.len(), 1);
        assert_eq!(for_record[0].operation, SyncOperation::Insert);
        assert!(for_record[0]
            .payload
            .as_deref()
            .unwrap()
            .contains("73.5"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_pushes_leave_entries_queued_with_attempts() {
        let (db, user) = setup().await;
        let vitals = LibSqlVitalsRepository::new(&db);
        let queue = LibSqlSyncQueueRepository::new(&db);

        vitals
            .create(
                &user,
                NewVitalRecord {
                    date: "2025-06-02".parse().unwrap(),
                    weight_kg: Some(72.5),
                    ..NewVitalRecord::default()
                },
            )
            .await
            .unwrap();

        let engine = SyncEngine::new(&db, ScriptedTransport::failing());
        let outcome = engine.run_once(50).await.unwrap();
        assert_eq!(outcome.pushed, 0);
        assert!(outcome.failed > 0);

        let pending = queue.pending(50).await.unwrap();
        assert!(!pending.is_empty());
        assert!(pending.iter().all(|entry| entry.attempts == 1));
        assert!(pending
            .iter()
            .all(|entry| entry.last_error.as_deref() == Some("remote 503")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_push_keeps_the_folded_payload_queued() {
        let (db, user) = setup().await;
        let vitals = LibSqlVitalsRepository::new(&db);
        let queue = LibSqlSyncQueueRepository::new(&db);

        let record = vitals
            .create(
                &user,
                NewVitalRecord {
                    date: "2025-06-02".parse().unwrap(),
                    weight_kg: Some(72.5),
                    ..NewVitalRecord::default()
                },
            )
            .await
            .unwrap();
        vitals
            .update(
                &record.id,
                VitalUpdate {
                    weight_kg: Some(73.5),
                    ..VitalUpdate::default()
                },
            )
            .await
            .unwrap();

        let engine = SyncEngine::new(&db, ScriptedTransport::failing());
        let outcome = engine.run_once(50).await.unwrap();
        assert_eq!(outcome.pushed, 0);

        // The newest edit survives on the queued row itself, so the retry
        // pushes 73.5 rather than the stale insert payload.
        let pending = queue.pending(50).await.unwrap();
        let for_record: Vec<_> = pending
            .iter()
            .filter(|entry| entry.record_id == record.id.to_string())
            .collect();
        assert_eq!(for_record.len(), 1);
        assert_eq!(for_record[0].operation, SyncOperation::Insert);
        assert!(for_record[0]
            .payload
            .as_deref()
            .unwrap()
            .contains("73.5"));
    }
}
