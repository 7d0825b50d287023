//! Dialysis session repository

use libsql::params;

use crate::error::{Error, Result};
use crate::models::{
    DialysisSession, DialysisSessionUpdate, NewDialysisSession, RecordId, SyncOperation, SyncTable,
};
use crate::util::{date_from_sql, date_to_sql, now, timestamp_from_sql, timestamp_to_sql};

use super::sync_repository::{LibSqlSyncQueueRepository, SyncQueueRepository};
use super::update::UpdateBuilder;
use super::{Database, DEFAULT_LIST_LIMIT};

/// Storage operations for dialysis sessions (async)
#[allow(async_fn_in_trait)]
pub trait DialysisRepository {
    /// Insert a new session and enqueue it for sync.
    ///
    /// When `duration_minutes` is absent but both times are present, the
    /// duration is derived at insert so the stored triple starts consistent.
    async fn create(&self, user_id: &RecordId, new: NewDialysisSession) -> Result<DialysisSession>;

    /// Fetch a session by id; absence is `None`
    async fn get(&self, id: &RecordId) -> Result<Option<DialysisSession>>;

    /// Sessions for a user, newest treatment first
    async fn list(&self, user_id: &RecordId, limit: usize) -> Result<Vec<DialysisSession>>;

    /// Merge-update; absent fields keep their stored value
    async fn update(&self, id: &RecordId, update: DialysisSessionUpdate) -> Result<()>;

    /// Hard delete; enqueues a sync `delete`
    async fn delete(&self, id: &RecordId) -> Result<()>;
}

/// libSQL implementation of [`DialysisRepository`]
pub struct LibSqlDialysisRepository<'a> {
    db: &'a Database,
}

const COLUMNS: &str = "id, user_id, date, start_time, end_time, duration_minutes, \
     pre_weight_kg, post_weight_kg, pre_systolic, pre_diastolic, post_systolic, post_diastolic, \
     uf_goal_ml, uf_removed_ml, blood_flow_rate, dialysate_flow_rate, symptoms, notes, \
     created_at, updated_at, synced";

impl<'a> LibSqlDialysisRepository<'a> {
    /// Create a new repository over the given database
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn parse_row(row: &libsql::Row) -> Result<DialysisSession> {
        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        let start_time: Option<String> = row.get(3)?;
        let end_time: Option<String> = row.get(4)?;
        let symptoms: Option<String> = row.get(16)?;

        Ok(DialysisSession {
            id: id
                .parse()
                .map_err(|_| Error::MalformedRow(format!("bad session id '{id}'")))?,
            user_id: user_id
                .parse()
                .map_err(|_| Error::MalformedRow(format!("bad user id '{user_id}'")))?,
            date: date_from_sql(&row.get::<String>(2)?)?,
            start_time: start_time.map(|raw| timestamp_from_sql(&raw)).transpose()?,
            end_time: end_time.map(|raw| timestamp_from_sql(&raw)).transpose()?,
            duration_minutes: row.get(5)?,
            pre_weight_kg: row.get(6)?,
            post_weight_kg: row.get(7)?,
            pre_systolic: row.get(8)?,
            pre_diastolic: row.get(9)?,
            post_systolic: row.get(10)?,
            post_diastolic: row.get(11)?,
            uf_goal_ml: row.get(12)?,
            uf_removed_ml: row.get(13)?,
            blood_flow_rate: row.get(14)?,
            dialysate_flow_rate: row.get(15)?,
            symptoms: symptoms
                .map(|raw| serde_json::from_str(&raw))
                .transpose()?
                .unwrap_or_default(),
            notes: row.get(17)?,
            created_at: timestamp_from_sql(&row.get::<String>(18)?)?,
            updated_at: timestamp_from_sql(&row.get::<String>(19)?)?,
            synced: row.get::<i32>(20)? != 0,
        })
    }
}

impl DialysisRepository for LibSqlDialysisRepository<'_> {
    async fn create(&self, user_id: &RecordId, new: NewDialysisSession) -> Result<DialysisSession> {
        let timestamp = now();
        let duration_minutes = new.duration_minutes.or_else(|| match (new.start_time, new.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_minutes()),
            _ => None,
        });
        let session = DialysisSession {
            id: RecordId::new(),
            user_id: *user_id,
            date: new.date,
            start_time: new.start_time,
            end_time: new.end_time,
            duration_minutes,
            pre_weight_kg: new.pre_weight_kg,
            post_weight_kg: new.post_weight_kg,
            pre_systolic: new.pre_systolic,
            pre_diastolic: new.pre_diastolic,
            post_systolic: new.post_systolic,
            post_diastolic: new.post_diastolic,
            uf_goal_ml: new.uf_goal_ml,
            uf_removed_ml: new.uf_removed_ml,
            blood_flow_rate: new.blood_flow_rate,
            dialysate_flow_rate: new.dialysate_flow_rate,
            symptoms: new.symptoms,
            notes: new.notes,
            created_at: timestamp,
            updated_at: timestamp,
            synced: false,
        };
        let payload = serde_json::to_string(&session)?;
        let symptoms_json = serde_json::to_string(&session.symptoms)?;

        let queue = LibSqlSyncQueueRepository::new(self.db);
        self.db
            .with_transaction(|| async {
                self.db
                    .execute(
                        "INSERT INTO dialysis_sessions (id, user_id, date, start_time, end_time, \
                         duration_minutes, pre_weight_kg, post_weight_kg, pre_systolic, \
                         pre_diastolic, post_systolic, post_diastolic, uf_goal_ml, uf_removed_ml, \
                         blood_flow_rate, dialysate_flow_rate, symptoms, notes, created_at, \
                         updated_at, synced)
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)",
                        params![
                            session.id.to_string(),
                            session.user_id.to_string(),
                            date_to_sql(session.date),
                            session.start_time.map(timestamp_to_sql),
                            session.end_time.map(timestamp_to_sql),
                            session.duration_minutes,
                            session.pre_weight_kg,
                            session.post_weight_kg,
                            session.pre_systolic,
                            session.pre_diastolic,
                            session.post_systolic,
                            session.post_diastolic,
                            session.uf_goal_ml,
                            session.uf_removed_ml,
                            session.blood_flow_rate,
                            session.dialysate_flow_rate,
                            symptoms_json.clone(),
                            session.notes.clone(),
                            timestamp_to_sql(session.created_at),
                            timestamp_to_sql(session.updated_at),
                        ],
                    )
                    .await?;
                queue
                    .enqueue(
                        SyncTable::DialysisSessions,
                        &session.id.to_string(),
                        SyncOperation::Insert,
                        Some(&payload),
                    )
                    .await?;
                Ok(())
            })
            .await?;

        Ok(session)
    }

    async fn get(&self, id: &RecordId) -> Result<Option<DialysisSession>> {
        let mut rows = self
            .db
            .query(
                &format!("SELECT {COLUMNS} FROM dialysis_sessions WHERE id = ?"),
                params![id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, user_id: &RecordId, limit: usize) -> Result<Vec<DialysisSession>> {
        #[allow(clippy::cast_possible_wrap)]
        let limit = (if limit == 0 { DEFAULT_LIST_LIMIT } else { limit }) as i64;
        let mut rows = self
            .db
            .query(
                &format!(
                    "SELECT {COLUMNS} FROM dialysis_sessions WHERE user_id = ?
                     ORDER BY date DESC, created_at DESC LIMIT ?"
                ),
                params![user_id.to_string(), limit],
            )
            .await?;

        let mut sessions = Vec::new();
        while let Some(row) = rows.next().await? {
            sessions.push(Self::parse_row(&row)?);
        }
        Ok(sessions)
    }

    async fn update(&self, id: &RecordId, update: DialysisSessionUpdate) -> Result<()> {
        let symptoms_json = update
            .symptoms
            .as_ref()
            .map(|symptoms| serde_json::to_string(symptoms))
            .transpose()?;

        let mut builder = UpdateBuilder::new("dialysis_sessions");
        builder
            .set_if("end_time", update.end_time.map(timestamp_to_sql))
            .set_if("duration_minutes", update.duration_minutes)
            .set_if("post_weight_kg", update.post_weight_kg)
            .set_if("post_systolic", update.post_systolic)
            .set_if("post_diastolic", update.post_diastolic)
            .set_if("uf_removed_ml", update.uf_removed_ml)
            .set_if("symptoms", symptoms_json)
            .set_if("notes", update.notes);
        if builder.is_empty() {
            return Ok(());
        }
        builder
            .set("updated_at", timestamp_to_sql(now()))
            .set("synced", 0i64);
        let (sql, values) = builder.build(&id.to_string());

        let queue = LibSqlSyncQueueRepository::new(self.db);
        self.db
            .with_transaction(|| async {
                let rows = self.db.execute(&sql, values).await?;
                if rows > 0 {
                    if let Some(session) = self.get(id).await? {
                        let payload = serde_json::to_string(&session)?;
                        queue
                            .enqueue(
                                SyncTable::DialysisSessions,
                                &id.to_string(),
                                SyncOperation::Update,
                                Some(&payload),
                            )
                            .await?;
                    }
                }
                Ok(())
            })
            .await
    }

    async fn delete(&self, id: &RecordId) -> Result<()> {
        let queue = LibSqlSyncQueueRepository::new(self.db);
        self.db
            .with_transaction(|| async {
                let rows = self
                    .db
                    .execute(
                        "DELETE FROM dialysis_sessions WHERE id = ?",
                        params![id.to_string()],
                    )
                    .await?;
                if rows > 0 {
                    queue
                        .enqueue(
                            SyncTable::DialysisSessions,
                            &id.to_string(),
                            SyncOperation::Delete,
                            None,
                        )
                        .await?;
                }
                Ok(())
            })
            .await
    }
}
