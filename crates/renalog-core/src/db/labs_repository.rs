//! Lab report repository

use libsql::params;

use crate::error::{Error, Result};
use crate::models::{LabReport, LabReportUpdate, NewLabReport, RecordId, SyncOperation, SyncTable};
use crate::util::{date_from_sql, date_to_sql, now, timestamp_from_sql, timestamp_to_sql};

use super::sync_repository::{LibSqlSyncQueueRepository, SyncQueueRepository};
use super::update::UpdateBuilder;
use super::{Database, DEFAULT_LIST_LIMIT};

/// Storage operations for lab reports (async)
#[allow(async_fn_in_trait)]
pub trait LabsRepository {
    /// Insert a new report and enqueue it for sync
    async fn create(&self, user_id: &RecordId, new: NewLabReport) -> Result<LabReport>;

    /// Fetch a report by id; absence is `None`
    async fn get(&self, id: &RecordId) -> Result<Option<LabReport>>;

    /// Reports for a user, newest draw first
    async fn list(&self, user_id: &RecordId, limit: usize) -> Result<Vec<LabReport>>;

    /// Merge-update; absent fields keep their stored value
    async fn update(&self, id: &RecordId, update: LabReportUpdate) -> Result<()>;

    /// Hard delete; enqueues a sync `delete`
    async fn delete(&self, id: &RecordId) -> Result<()>;
}

/// libSQL implementation of [`LabsRepository`]
pub struct LibSqlLabsRepository<'a> {
    db: &'a Database,
}

const COLUMNS: &str = "id, user_id, date, creatinine, egfr, bun, potassium, phosphorus, \
     calcium, albumin, hemoglobin, document_ref, notes, created_at, updated_at, synced";

impl<'a> LibSqlLabsRepository<'a> {
    /// Create a new repository over the given database
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn parse_row(row: &libsql::Row) -> Result<LabReport> {
        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        Ok(LabReport {
            id: id
                .parse()
                .map_err(|_| Error::MalformedRow(format!("bad lab report id '{id}'")))?,
            user_id: user_id
                .parse()
                .map_err(|_| Error::MalformedRow(format!("bad user id '{user_id}'")))?,
            date: date_from_sql(&row.get::<String>(2)?)?,
            creatinine: row.get(3)?,
            egfr: row.get(4)?,
            bun: row.get(5)?,
            potassium: row.get(6)?,
            phosphorus: row.get(7)?,
            calcium: row.get(8)?,
            albumin: row.get(9)?,
            hemoglobin: row.get(10)?,
            document_ref: row.get(11)?,
            notes: row.get(12)?,
            created_at: timestamp_from_sql(&row.get::<String>(13)?)?,
            updated_at: timestamp_from_sql(&row.get::<String>(14)?)?,
            synced: row.get::<i32>(15)? != 0,
        })
    }
}

impl LabsRepository for LibSqlLabsRepository<'_> {
    async fn create(&self, user_id: &RecordId, new: NewLabReport) -> Result<LabReport> {
        let timestamp = now();
        let report = LabReport {
            id: RecordId::new(),
            user_id: *user_id,
            date: new.date,
            creatinine: new.creatinine,
            egfr: new.egfr,
            bun: new.bun,
            potassium: new.potassium,
            phosphorus: new.phosphorus,
            calcium: new.calcium,
            albumin: new.albumin,
            hemoglobin: new.hemoglobin,
            document_ref: new.document_ref,
            notes: new.notes,
            created_at: timestamp,
            updated_at: timestamp,
            synced: false,
        };
        let payload = serde_json::to_string(&report)?;

        let queue = LibSqlSyncQueueRepository::new(self.db);
        self.db
            .with_transaction(|| async {
                self.db
                    .execute(
                        "INSERT INTO lab_reports (id, user_id, date, creatinine, egfr, bun, \
                         potassium, phosphorus, calcium, albumin, hemoglobin, document_ref, \
                         notes, created_at, updated_at, synced)
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)",
                        params![
                            report.id.to_string(),
                            report.user_id.to_string(),
                            date_to_sql(report.date),
                            report.creatinine,
                            report.egfr,
                            report.bun,
                            report.potassium,
                            report.phosphorus,
                            report.calcium,
                            report.albumin,
                            report.hemoglobin,
                            report.document_ref.clone(),
                            report.notes.clone(),
                            timestamp_to_sql(report.created_at),
                            timestamp_to_sql(report.updated_at),
                        ],
                    )
                    .await?;
                queue
                    .enqueue(
                        SyncTable::LabReports,
                        &report.id.to_string(),
                        SyncOperation::Insert,
                        Some(&payload),
                    )
                    .await?;
                Ok(())
            })
            .await?;

        Ok(report)
    }

    async fn get(&self, id: &RecordId) -> Result<Option<LabReport>> {
        let mut rows = self
            .db
            .query(
                &format!("SELECT {COLUMNS} FROM lab_reports WHERE id = ?"),
                params![id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, user_id: &RecordId, limit: usize) -> Result<Vec<LabReport>> {
        #[allow(clippy::cast_possible_wrap)]
        let limit = (if limit == 0 { DEFAULT_LIST_LIMIT } else { limit }) as i64;
        let mut rows = self
            .db
            .query(
                &format!(
                    "SELECT {COLUMNS} FROM lab_reports WHERE user_id = ?
                     ORDER BY date DESC, created_at DESC LIMIT ?"
                ),
                params![user_id.to_string(), limit],
            )
            .await?;

        let mut reports = Vec::new();
        while let Some(row) = rows.next().await? {
            reports.push(Self::parse_row(&row)?);
        }
        Ok(reports)
    }

    async fn update(&self, id: &RecordId, update: LabReportUpdate) -> Result<()> {
        let mut builder = UpdateBuilder::new("lab_reports");
        builder
            .set_if("creatinine", update.creatinine)
            .set_if("egfr", update.egfr)
            .set_if("bun", update.bun)
            .set_if("potassium", update.potassium)
            .set_if("phosphorus", update.phosphorus)
            .set_if("calcium", update.calcium)
            .set_if("albumin", update.albumin)
            .set_if("hemoglobin", update.hemoglobin)
            .set_if("document_ref", update.document_ref)
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
                    if let Some(report) = self.get(id).await? {
                        let payload = serde_json::to_string(&report)?;
                        queue
                            .enqueue(
                                SyncTable::LabReports,
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
                    .execute("DELETE FROM lab_reports WHERE id = ?", params![id.to_string()])
                    .await?;
                if rows > 0 {
                    queue
                        .enqueue(
                            SyncTable::LabReports,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users_repository::{LibSqlUsersRepository, UsersRepository};
    use crate::models::NewUser;
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

    #[tokio::test(flavor = "multi_thread")]
    async fn create_then_get_roundtrip() {
        let (db, user) = setup().await;
        let repo = LibSqlLabsRepository::new(&db);

        let report = repo
            .create(
                &user,
                NewLabReport {
                    date: "2025-05-20".parse().unwrap(),
                    creatinine: Some(6.1),
                    potassium: Some(5.2),
                    ..NewLabReport::default()
                },
            )
            .await
            .unwrap();

        let fetched = repo.get(&report.id).await.unwrap().unwrap();
        assert_eq!(fetched, report);
        assert_eq!(fetched.creatinine, Some(6.1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn merge_update_keeps_absent_fields() {
        let (db, user) = setup().await;
        let repo = LibSqlLabsRepository::new(&db);

        let report = repo
            .create(
                &user,
                NewLabReport {
                    date: "2025-05-20".parse().unwrap(),
                    creatinine: Some(6.1),
                    potassium: Some(5.2),
                    ..NewLabReport::default()
                },
            )
            .await
            .unwrap();

        repo.update(
            &report.id,
            LabReportUpdate {
                document_ref: Some("scan-042.pdf".to_string()),
                ..LabReportUpdate::default()
            },
        )
        .await
        .unwrap();

        let updated = repo.get(&report.id).await.unwrap().unwrap();
        assert_eq!(updated.document_ref.as_deref(), Some("scan-042.pdf"));
        assert_eq!(updated.creatinine, Some(6.1));
        assert_eq!(updated.potassium, Some(5.2));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn list_is_newest_draw_first() {
        let (db, user) = setup().await;
        let repo = LibSqlLabsRepository::new(&db);

        for date in ["2025-03-01", "2025-05-01", "2025-04-01"] {
            repo.create(
                &user,
                NewLabReport {
                    date: date.parse().unwrap(),
                    ..NewLabReport::default()
                },
            )
            .await
            .unwrap();
        }

        let reports = repo.list(&user, 10).await.unwrap();
        assert_eq!(reports.len(), 3);
        assert!(reports[0].date > reports[1].date);
        assert!(reports[1].date > reports[2].date);
    }
}
