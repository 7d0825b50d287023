//! Medication and intake-log repository

use chrono::{Duration, NaiveDate};
use libsql::params;

use crate::error::{Error, Result};
use crate::models::{
    AdherenceSummary, Frequency, IntakeStatus, Medication, MedicationLog, MedicationUpdate,
    NewMedication, NewMedicationLog, RecordId, SyncOperation, SyncTable,
};
use crate::util::{
    date_from_sql, date_to_sql, normalize_text_option, now, timestamp_from_sql, timestamp_to_sql,
};

use super::sync_repository::{LibSqlSyncQueueRepository, SyncQueueRepository};
use super::update::UpdateBuilder;
use super::{Database, DEFAULT_LIST_LIMIT};

/// Storage operations for medications and their intake logs (async)
#[allow(async_fn_in_trait)]
pub trait MedicationsRepository {
    /// Insert a new medication and enqueue it for sync.
    ///
    /// Name and dosage must be non-blank and at least one dose time must be
    /// given, otherwise the call fails with `InvalidInput` and nothing is
    /// written.
    async fn create(&self, user_id: &RecordId, new: NewMedication) -> Result<Medication>;

    /// Fetch a medication by id; absence is `None`
    async fn get(&self, id: &RecordId) -> Result<Option<Medication>>;

    /// All medications for a user, newest first
    async fn list(&self, user_id: &RecordId, limit: usize) -> Result<Vec<Medication>>;

    /// Only the currently active medications for a user
    async fn active(&self, user_id: &RecordId) -> Result<Vec<Medication>>;

    /// Merge-update; absent fields keep their stored value
    async fn update(&self, id: &RecordId, update: MedicationUpdate) -> Result<()>;

    /// Soft-deactivate: set the end date and clear the active flag.
    ///
    /// The row survives so historical intake logs keep their context.
    async fn end(&self, id: &RecordId, end_date: NaiveDate) -> Result<()>;

    /// Replace the stored reminder-scheduler handles.
    ///
    /// Handles are device-local, so this write is not sync-queued.
    async fn set_reminder_handles(&self, id: &RecordId, handles: &[String]) -> Result<()>;

    /// Hard delete. Intake logs cascade away in the same transaction.
    async fn delete(&self, id: &RecordId) -> Result<()>;

    /// Record one intake event against a medication
    async fn log_intake(&self, user_id: &RecordId, new: NewMedicationLog) -> Result<MedicationLog>;

    /// Intake events for a medication, most recent dose first
    async fn logs(&self, medication_id: &RecordId, limit: usize) -> Result<Vec<MedicationLog>>;

    /// Adherence counts over a trailing window of `days`
    async fn adherence(&self, user_id: &RecordId, days: i64) -> Result<AdherenceSummary>;
}

/// libSQL implementation of [`MedicationsRepository`]
pub struct LibSqlMedicationsRepository<'a> {
    db: &'a Database,
}

const COLUMNS: &str = "id, user_id, name, dosage, frequency, times_of_day, start_date, end_date, \
     instructions, reminder_enabled, reminder_handles, active, created_at, updated_at, synced";

const LOG_COLUMNS: &str =
    "id, medication_id, user_id, status, scheduled_time, actual_time, notes, created_at, synced";

impl<'a> LibSqlMedicationsRepository<'a> {
    /// Create a new repository over the given database
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn parse_row(row: &libsql::Row) -> Result<Medication> {
        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        let frequency: String = row.get(4)?;
        let times_of_day: String = row.get(5)?;
        let end_date: Option<String> = row.get(7)?;
        let reminder_handles: Option<String> = row.get(10)?;

        Ok(Medication {
            id: id
                .parse()
                .map_err(|_| Error::MalformedRow(format!("bad medication id '{id}'")))?,
            user_id: user_id
                .parse()
                .map_err(|_| Error::MalformedRow(format!("bad user id '{user_id}'")))?,
            name: row.get(2)?,
            dosage: row.get(3)?,
            frequency: Frequency::parse(&frequency),
            times_of_day: serde_json::from_str(&times_of_day)?,
            start_date: date_from_sql(&row.get::<String>(6)?)?,
            end_date: end_date.map(|raw| date_from_sql(&raw)).transpose()?,
            instructions: row.get(8)?,
            reminder_enabled: row.get::<i32>(9)? != 0,
            reminder_handles: reminder_handles
                .map(|raw| serde_json::from_str(&raw))
                .transpose()?
                .unwrap_or_default(),
            active: row.get::<i32>(11)? != 0,
            created_at: timestamp_from_sql(&row.get::<String>(12)?)?,
            updated_at: timestamp_from_sql(&row.get::<String>(13)?)?,
            synced: row.get::<i32>(14)? != 0,
        })
    }

    fn parse_log_row(row: &libsql::Row) -> Result<MedicationLog> {
        let id: String = row.get(0)?;
        let medication_id: String = row.get(1)?;
        let user_id: String = row.get(2)?;
        let status: String = row.get(3)?;
        let actual_time: Option<String> = row.get(5)?;

        Ok(MedicationLog {
            id: id
                .parse()
                .map_err(|_| Error::MalformedRow(format!("bad log id '{id}'")))?,
            medication_id: medication_id
                .parse()
                .map_err(|_| Error::MalformedRow(format!("bad medication id '{medication_id}'")))?,
            user_id: user_id
                .parse()
                .map_err(|_| Error::MalformedRow(format!("bad user id '{user_id}'")))?,
            status: IntakeStatus::parse(&status)
                .ok_or_else(|| Error::MalformedRow(format!("unknown intake status '{status}'")))?,
            scheduled_time: timestamp_from_sql(&row.get::<String>(4)?)?,
            actual_time: actual_time.map(|raw| timestamp_from_sql(&raw)).transpose()?,
            notes: row.get(6)?,
            created_at: timestamp_from_sql(&row.get::<String>(7)?)?,
            synced: row.get::<i32>(8)? != 0,
        })
    }

    async fn list_where(&self, condition: &str, params: impl libsql::params::IntoParams) -> Result<Vec<Medication>> {
        let mut rows = self
            .db
            .query(
                &format!("SELECT {COLUMNS} FROM medications WHERE {condition}"),
                params,
            )
            .await?;

        let mut medications = Vec::new();
        while let Some(row) = rows.next().await? {
            medications.push(Self::parse_row(&row)?);
        }
        Ok(medications)
    }
}

impl MedicationsRepository for LibSqlMedicationsRepository<'_> {
    async fn create(&self, user_id: &RecordId, new: NewMedication) -> Result<Medication> {
        let Some(name) = normalize_text_option(Some(new.name)) else {
            return Err(Error::InvalidInput("medication name must not be empty".into()));
        };
        let Some(dosage) = normalize_text_option(Some(new.dosage)) else {
            return Err(Error::InvalidInput("dosage must not be empty".into()));
        };
        if new.times_of_day.is_empty() {
            return Err(Error::InvalidInput(
                "at least one dose time is required".into(),
            ));
        }

        let timestamp = now();
        let medication = Medication {
            id: RecordId::new(),
            user_id: *user_id,
            name,
            dosage,
            frequency: new.frequency,
            times_of_day: new.times_of_day,
            start_date: new.start_date,
            end_date: new.end_date,
            instructions: normalize_text_option(new.instructions),
            reminder_enabled: new.reminder_enabled,
            reminder_handles: Vec::new(),
            active: true,
            created_at: timestamp,
            updated_at: timestamp,
            synced: false,
        };
        let payload = serde_json::to_string(&medication)?;
        let times_json = serde_json::to_string(&medication.times_of_day)?;

        let queue = LibSqlSyncQueueRepository::new(self.db);
        self.db
            .with_transaction(|| async {
                self.db
                    .execute(
                        "INSERT INTO medications (id, user_id, name, dosage, frequency, \
                         times_of_day, start_date, end_date, instructions, reminder_enabled, \
                         reminder_handles, active, created_at, updated_at, synced)
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, 1, ?, ?, 0)",
                        params![
                            medication.id.to_string(),
                            medication.user_id.to_string(),
                            medication.name.clone(),
                            medication.dosage.clone(),
                            medication.frequency.as_str(),
                            times_json.clone(),
                            date_to_sql(medication.start_date),
                            medication.end_date.map(date_to_sql),
                            medication.instructions.clone(),
                            i64::from(medication.reminder_enabled),
                            timestamp_to_sql(medication.created_at),
                            timestamp_to_sql(medication.updated_at),
                        ],
                    )
                    .await?;
                queue
                    .enqueue(
                        SyncTable::Medications,
                        &medication.id.to_string(),
                        SyncOperation::Insert,
                        Some(&payload),
                    )
                    .await?;
                Ok(())
            })
            .await?;

        Ok(medication)
    }

    async fn get(&self, id: &RecordId) -> Result<Option<Medication>> {
        let mut rows = self
            .db
            .query(
                &format!("SELECT {COLUMNS} FROM medications WHERE id = ?"),
                params![id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, user_id: &RecordId, limit: usize) -> Result<Vec<Medication>> {
        #[allow(clippy::cast_possible_wrap)]
        let limit = (if limit == 0 { DEFAULT_LIST_LIMIT } else { limit }) as i64;
        self.list_where(
            "user_id = ? ORDER BY created_at DESC LIMIT ?",
            params![user_id.to_string(), limit],
        )
        .await
    }

    async fn active(&self, user_id: &RecordId) -> Result<Vec<Medication>> {
        self.list_where(
            "user_id = ? AND active = 1 ORDER BY name ASC",
            params![user_id.to_string()],
        )
        .await
    }

    async fn update(&self, id: &RecordId, update: MedicationUpdate) -> Result<()> {
        let dosage = match update.dosage {
            Some(dosage) => match normalize_text_option(Some(dosage)) {
                Some(dosage) => Some(dosage),
                None => return Err(Error::InvalidInput("dosage must not be empty".into())),
            },
            None => None,
        };
        if let Some(times) = &update.times_of_day {
            if times.is_empty() {
                return Err(Error::InvalidInput(
                    "at least one dose time is required".into(),
                ));
            }
        }
        let times_json = update
            .times_of_day
            .as_ref()
            .map(|times| serde_json::to_string(times))
            .transpose()?;

        let mut builder = UpdateBuilder::new("medications");
        builder
            .set_if("dosage", dosage)
            .set_if("frequency", update.frequency.map(|f| f.as_str().to_string()))
            .set_if("times_of_day", times_json)
            .set_if("instructions", update.instructions)
            .set_if("reminder_enabled", update.reminder_enabled.map(i64::from));
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
                    if let Some(medication) = self.get(id).await? {
                        let payload = serde_json::to_string(&medication)?;
                        queue
                            .enqueue(
                                SyncTable::Medications,
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

    async fn end(&self, id: &RecordId, end_date: NaiveDate) -> Result<()> {
        let queue = LibSqlSyncQueueRepository::new(self.db);
        self.db
            .with_transaction(|| async {
                let rows = self
                    .db
                    .execute(
                        "UPDATE medications
                         SET end_date = ?, active = 0, updated_at = ?, synced = 0
                         WHERE id = ?",
                        params![
                            date_to_sql(end_date),
                            timestamp_to_sql(now()),
                            id.to_string()
                        ],
                    )
                    .await?;
                if rows > 0 {
                    if let Some(medication) = self.get(id).await? {
                        let payload = serde_json::to_string(&medication)?;
                        queue
                            .enqueue(
                                SyncTable::Medications,
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

    async fn set_reminder_handles(&self, id: &RecordId, handles: &[String]) -> Result<()> {
        let handles_json = serde_json::to_string(handles)?;
        self.db
            .execute(
                "UPDATE medications SET reminder_handles = ? WHERE id = ?",
                params![handles_json, id.to_string()],
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &RecordId) -> Result<()> {
        let queue = LibSqlSyncQueueRepository::new(self.db);
        self.db
            .with_transaction(|| async {
                // FK cascade removes the intake logs with the medication.
                let rows = self
                    .db
                    .execute("DELETE FROM medications WHERE id = ?", params![id.to_string()])
                    .await?;
                if rows > 0 {
                    queue
                        .enqueue(
                            SyncTable::Medications,
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

    async fn log_intake(&self, user_id: &RecordId, new: NewMedicationLog) -> Result<MedicationLog> {
        if self.get(&new.medication_id).await?.is_none() {
            return Err(Error::NotFound(format!(
                "medication {}",
                new.medication_id
            )));
        }

        let log = MedicationLog {
            id: RecordId::new(),
            medication_id: new.medication_id,
            user_id: *user_id,
            status: new.status,
            scheduled_time: new.scheduled_time,
            actual_time: new.actual_time,
            notes: normalize_text_option(new.notes),
            created_at: now(),
            synced: false,
        };
        let payload = serde_json::to_string(&log)?;

        let queue = LibSqlSyncQueueRepository::new(self.db);
        self.db
            .with_transaction(|| async {
                self.db
                    .execute(
                        "INSERT INTO medication_logs (id, medication_id, user_id, status, \
                         scheduled_time, actual_time, notes, created_at, synced)
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0)",
                        params![
                            log.id.to_string(),
                            log.medication_id.to_string(),
                            log.user_id.to_string(),
                            log.status.as_str(),
                            timestamp_to_sql(log.scheduled_time),
                            log.actual_time.map(timestamp_to_sql),
                            log.notes.clone(),
                            timestamp_to_sql(log.created_at),
                        ],
                    )
                    .await?;
                queue
                    .enqueue(
                        SyncTable::MedicationLogs,
                        &log.id.to_string(),
                        SyncOperation::Insert,
                        Some(&payload),
                    )
                    .await?;
                Ok(())
            })
            .await?;

        Ok(log)
    }

    async fn logs(&self, medication_id: &RecordId, limit: usize) -> Result<Vec<MedicationLog>> {
        #[allow(clippy::cast_possible_wrap)]
        let limit = (if limit == 0 { DEFAULT_LIST_LIMIT } else { limit }) as i64;
        let mut rows = self
            .db
            .query(
                &format!(
                    "SELECT {LOG_COLUMNS} FROM medication_logs WHERE medication_id = ?
                     ORDER BY scheduled_time DESC LIMIT ?"
                ),
                params![medication_id.to_string(), limit],
            )
            .await?;

        let mut logs = Vec::new();
        while let Some(row) = rows.next().await? {
            logs.push(Self::parse_log_row(&row)?);
        }
        Ok(logs)
    }

    async fn adherence(&self, user_id: &RecordId, days: i64) -> Result<AdherenceSummary> {
        let since = now() - Duration::days(days.max(0));
        let mut rows = self
            .db
            .query(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN status = 'taken' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN status = 'missed' THEN 1 ELSE 0 END), 0)
                 FROM medication_logs
                 WHERE user_id = ? AND scheduled_time >= ?",
                params![user_id.to_string(), timestamp_to_sql(since)],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(AdherenceSummary::default());
        };
        Ok(AdherenceSummary::from_counts(
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users_repository::{LibSqlUsersRepository, UsersRepository};
    use crate::models::NewUser;
    use chrono::NaiveTime;
    use pretty_assertions::assert_eq;

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

    fn lisinopril() -> NewMedication {
        NewMedication {
            name: "Lisinopril".to_string(),
            dosage: "10mg".to_string(),
            frequency: Frequency::OnceDaily,
            times_of_day: vec![NaiveTime::from_hms_opt(8, 0, 0).unwrap()],
            start_date: "2025-06-01".parse().unwrap(),
            end_date: None,
            instructions: Some("with water".to_string()),
            reminder_enabled: true,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_validates_required_fields() {
        let (db, user) = setup().await;
        let repo = LibSqlMedicationsRepository::new(&db);

        let mut blank_name = lisinopril();
        blank_name.name = " ".to_string();
        assert!(matches!(
            repo.create(&user, blank_name).await.unwrap_err(),
            Error::InvalidInput(_)
        ));

        let mut no_times = lisinopril();
        no_times.times_of_day.clear();
        assert!(matches!(
            repo.create(&user, no_times).await.unwrap_err(),
            Error::InvalidInput(_)
        ));

        assert!(repo.list(&user, 0).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_roundtrips_times_of_day() {
        let (db, user) = setup().await;
        let repo = LibSqlMedicationsRepository::new(&db);

        let medication = repo.create(&user, lisinopril()).await.unwrap();
        assert!(medication.active);

        let fetched = repo.get(&medication.id).await.unwrap().unwrap();
        assert_eq!(fetched, medication);
        assert_eq!(
            fetched.times_of_day,
            vec![NaiveTime::from_hms_opt(8, 0, 0).unwrap()]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn end_deactivates_without_deleting() {
        let (db, user) = setup().await;
        let repo = LibSqlMedicationsRepository::new(&db);

        let medication = repo.create(&user, lisinopril()).await.unwrap();
        repo.end(&medication.id, "2025-07-01".parse().unwrap())
            .await
            .unwrap();

        let ended = repo.get(&medication.id).await.unwrap().unwrap();
        assert!(!ended.active);
        assert_eq!(ended.end_date, Some("2025-07-01".parse().unwrap()));
        assert!(repo.active(&user).await.unwrap().is_empty());
        assert_eq!(repo.list(&user, 0).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_cascades_intake_logs() {
        let (db, user) = setup().await;
        let repo = LibSqlMedicationsRepository::new(&db);

        let medication = repo.create(&user, lisinopril()).await.unwrap();
        repo.log_intake(
            &user,
            NewMedicationLog {
                medication_id: medication.id,
                status: IntakeStatus::Taken,
                scheduled_time: now(),
                actual_time: Some(now()),
                notes: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(repo.logs(&medication.id, 0).await.unwrap().len(), 1);

        repo.delete(&medication.id).await.unwrap();
        assert!(repo.get(&medication.id).await.unwrap().is_none());
        assert!(repo.logs(&medication.id, 0).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn log_intake_requires_existing_medication() {
        let (db, user) = setup().await;
        let repo = LibSqlMedicationsRepository::new(&db);

        let err = repo
            .log_intake(
                &user,
                NewMedicationLog {
                    medication_id: RecordId::new(),
                    status: IntakeStatus::Taken,
                    scheduled_time: now(),
                    actual_time: None,
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn adherence_counts_trailing_window() {
        let (db, user) = setup().await;
        let repo = LibSqlMedicationsRepository::new(&db);
        let medication = repo.create(&user, lisinopril()).await.unwrap();

        for (status, days_ago) in [
            (IntakeStatus::Taken, 1),
            (IntakeStatus::Taken, 2),
            (IntakeStatus::Missed, 3),
            // Outside the 7-day window, must not count.
            (IntakeStatus::Missed, 30),
        ] {
            repo.log_intake(
                &user,
                NewMedicationLog {
                    medication_id: medication.id,
                    status,
                    scheduled_time: now() - Duration::days(days_ago),
                    actual_time: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        }

        let summary = repo.adherence(&user, 7).await.unwrap();
        assert_eq!(summary.total_doses, 3);
        assert_eq!(summary.taken_doses, 2);
        assert_eq!(summary.missed_doses, 1);
        assert!((summary.adherence_rate - 66.666_666_666_666_67).abs() < 1e-9);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reminder_handles_persist_without_touching_sync_state() {
        let (db, user) = setup().await;
        let repo = LibSqlMedicationsRepository::new(&db);

        let medication = repo.create(&user, lisinopril()).await.unwrap();
        repo.set_reminder_handles(&medication.id, &["os-reminder-17".to_string()])
            .await
            .unwrap();

        let fetched = repo.get(&medication.id).await.unwrap().unwrap();
        assert_eq!(fetched.reminder_handles, vec!["os-reminder-17".to_string()]);
    }
}
