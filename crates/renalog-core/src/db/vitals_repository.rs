//! Vital record repository

use chrono::NaiveDate;
use libsql::params;

use crate::error::{Error, Result};
use crate::models::{
    NewVitalRecord, RecordId, SyncOperation, SyncTable, VitalRecord, VitalUpdate,
};
use crate::util::{date_to_sql, now, timestamp_from_sql, timestamp_to_sql};

use super::sync_repository::{LibSqlSyncQueueRepository, SyncQueueRepository};
use super::update::UpdateBuilder;
use super::{Database, DEFAULT_LIST_LIMIT};

/// Storage operations for daily vital observations (async)
#[allow(async_fn_in_trait)]
pub trait VitalsRepository {
    /// Insert a new observation set and enqueue it for sync
    async fn create(&self, user_id: &RecordId, new: NewVitalRecord) -> Result<VitalRecord>;

    /// Fetch a record by id; absence is `None`, not an error
    async fn get(&self, id: &RecordId) -> Result<Option<VitalRecord>>;

    /// Records for a user, newest date first
    async fn list(&self, user_id: &RecordId, limit: usize) -> Result<Vec<VitalRecord>>;

    /// The most recent record for a given day, if any was logged
    async fn for_date(&self, user_id: &RecordId, date: NaiveDate) -> Result<Option<VitalRecord>>;

    /// Records within the trailing `days` window, ascending by date, for
    /// charting by the presentation layer
    async fn trend(&self, user_id: &RecordId, days: i64) -> Result<Vec<VitalRecord>>;

    /// Merge-update: fields absent from `update` keep their stored value.
    /// Updating an absent id is silent success.
    async fn update(&self, id: &RecordId, update: VitalUpdate) -> Result<()>;

    /// Hard delete; enqueues a sync `delete` carrying just the id
    async fn delete(&self, id: &RecordId) -> Result<()>;
}

/// libSQL implementation of [`VitalsRepository`]
pub struct LibSqlVitalsRepository<'a> {
    db: &'a Database,
}

const COLUMNS: &str = "id, user_id, date, weight_kg, systolic, diastolic, heart_rate, spo2, \
     fluid_intake_ml, fluid_output_ml, temperature_c, notes, created_at, updated_at, synced";

impl<'a> LibSqlVitalsRepository<'a> {
    /// Create a new repository over the given database
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn parse_row(row: &libsql::Row) -> Result<VitalRecord> {
        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        Ok(VitalRecord {
            id: id
                .parse()
                .map_err(|_| Error::MalformedRow(format!("bad vitals id '{id}'")))?,
            user_id: user_id
                .parse()
                .map_err(|_| Error::MalformedRow(format!("bad user id '{user_id}'")))?,
            date: crate::util::date_from_sql(&row.get::<String>(2)?)?,
            weight_kg: row.get(3)?,
            systolic: row.get(4)?,
            diastolic: row.get(5)?,
            heart_rate: row.get(6)?,
            spo2: row.get(7)?,
            fluid_intake_ml: row.get(8)?,
            fluid_output_ml: row.get(9)?,
            temperature_c: row.get(10)?,
            notes: row.get(11)?,
            created_at: timestamp_from_sql(&row.get::<String>(12)?)?,
            updated_at: timestamp_from_sql(&row.get::<String>(13)?)?,
            synced: row.get::<i32>(14)? != 0,
        })
    }

    async fn collect(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<Vec<VitalRecord>> {
        let mut rows = self.db.query(sql, params).await?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(Self::parse_row(&row)?);
        }
        Ok(records)
    }
}

impl VitalsRepository for LibSqlVitalsRepository<'_> {
    async fn create(&self, user_id: &RecordId, new: NewVitalRecord) -> Result<VitalRecord> {
        let timestamp = now();
        let record = VitalRecord {
            id: RecordId::new(),
            user_id: *user_id,
            date: new.date,
            weight_kg: new.weight_kg,
            systolic: new.systolic,
            diastolic: new.diastolic,
            heart_rate: new.heart_rate,
            spo2: new.spo2,
            fluid_intake_ml: new.fluid_intake_ml,
            fluid_output_ml: new.fluid_output_ml,
            temperature_c: new.temperature_c,
            notes: new.notes,
            created_at: timestamp,
            updated_at: timestamp,
            synced: false,
        };
        let payload = serde_json::to_string(&record)?;

        let queue = LibSqlSyncQueueRepository::new(self.db);
        self.db
            .with_transaction(|| async {
                self.db
                    .execute(
                        "INSERT INTO vitals (id, user_id, date, weight_kg, systolic, diastolic, \
                         heart_rate, spo2, fluid_intake_ml, fluid_output_ml, temperature_c, \
                         notes, created_at, updated_at, synced)
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)",
                        params![
                            record.id.to_string(),
                            record.user_id.to_string(),
                            date_to_sql(record.date),
                            record.weight_kg,
                            record.systolic,
                            record.diastolic,
                            record.heart_rate,
                            record.spo2,
                            record.fluid_intake_ml,
                            record.fluid_output_ml,
                            record.temperature_c,
                            record.notes.clone(),
                            timestamp_to_sql(record.created_at),
                            timestamp_to_sql(record.updated_at),
                        ],
                    )
                    .await?;
                queue
                    .enqueue(
                        SyncTable::Vitals,
                        &record.id.to_string(),
                        SyncOperation::Insert,
                        Some(&payload),
                    )
                    .await?;
                Ok(())
            })
            .await?;

        Ok(record)
    }

    async fn get(&self, id: &RecordId) -> Result<Option<VitalRecord>> {
        let mut rows = self
            .db
            .query(
                &format!("SELECT {COLUMNS} FROM vitals WHERE id = ?"),
                params![id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, user_id: &RecordId, limit: usize) -> Result<Vec<VitalRecord>> {
        #[allow(clippy::cast_possible_wrap)]
        let limit = (if limit == 0 { DEFAULT_LIST_LIMIT } else { limit }) as i64;
        self.collect(
            &format!(
                "SELECT {COLUMNS} FROM vitals WHERE user_id = ?
                 ORDER BY date DESC, created_at DESC LIMIT ?"
            ),
            params![user_id.to_string(), limit],
        )
        .await
    }

    async fn for_date(&self, user_id: &RecordId, date: NaiveDate) -> Result<Option<VitalRecord>> {
        let mut records = self
            .collect(
                &format!(
                    "SELECT {COLUMNS} FROM vitals WHERE user_id = ? AND date = ?
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![user_id.to_string(), date_to_sql(date)],
            )
            .await?;
        Ok(if records.is_empty() {
            None
        } else {
            Some(records.remove(0))
        })
    }

    async fn trend(&self, user_id: &RecordId, days: i64) -> Result<Vec<VitalRecord>> {
        let since = now().date_naive() - chrono::Duration::days(days);
        self.collect(
            &format!(
                "SELECT {COLUMNS} FROM vitals WHERE user_id = ? AND date > ?
                 ORDER BY date ASC, created_at ASC"
            ),
            params![user_id.to_string(), date_to_sql(since)],
        )
        .await
    }

    async fn update(&self, id: &RecordId, update: VitalUpdate) -> Result<()> {
        let mut builder = UpdateBuilder::new("vitals");
        builder
            .set_if("weight_kg", update.weight_kg)
            .set_if("systolic", update.systolic)
            .set_if("diastolic", update.diastolic)
            .set_if("heart_rate", update.heart_rate)
            .set_if("spo2", update.spo2)
            .set_if("fluid_intake_ml", update.fluid_intake_ml)
            .set_if("fluid_output_ml", update.fluid_output_ml)
            .set_if("temperature_c", update.temperature_c)
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
                    if let Some(record) = self.get(id).await? {
                        let payload = serde_json::to_string(&record)?;
                        queue
                            .enqueue(
                                SyncTable::Vitals,
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
                    .execute("DELETE FROM vitals WHERE id = ?", params![id.to_string()])
                    .await?;
                if rows > 0 {
                    queue
                        .enqueue(SyncTable::Vitals, &id.to_string(), SyncOperation::Delete, None)
                        .await?;
                }
                Ok(())
            })
            .await
    }
}
