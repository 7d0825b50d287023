//! Alert repository.
//!
//! Alerts are raised locally (threshold checks, missed doses) and kept
//! read/unread per user. They sync like any other record.

use libsql::params;

use crate::error::{Error, Result};
use crate::models::{
    Alert, AlertCategory, AlertSeverity, NewAlert, RecordId, SyncOperation, SyncTable,
};
use crate::util::{normalize_text_option, now, timestamp_from_sql, timestamp_to_sql};

use super::sync_repository::{LibSqlSyncQueueRepository, SyncQueueRepository};
use super::{Database, DEFAULT_LIST_LIMIT};

/// Storage operations for alerts (async)
#[allow(async_fn_in_trait)]
pub trait AlertsRepository {
    /// Raise a new alert for a user
    async fn create(&self, user_id: &RecordId, new: NewAlert) -> Result<Alert>;

    /// Fetch an alert by id; absence is `None`
    async fn get(&self, id: &RecordId) -> Result<Option<Alert>>;

    /// Unread alerts for a user, newest first
    async fn unread(&self, user_id: &RecordId) -> Result<Vec<Alert>>;

    /// All alerts for a user, newest first
    async fn list(&self, user_id: &RecordId, limit: usize) -> Result<Vec<Alert>>;

    /// Mark one alert as read
    async fn mark_read(&self, id: &RecordId) -> Result<()>;
}

/// libSQL implementation of [`AlertsRepository`]
pub struct LibSqlAlertsRepository<'a> {
    db: &'a Database,
}

const COLUMNS: &str =
    "id, user_id, category, severity, title, body, read, created_at, updated_at, synced";

impl<'a> LibSqlAlertsRepository<'a> {
    /// Create a new repository over the given database
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn parse_row(row: &libsql::Row) -> Result<Alert> {
        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        let category: String = row.get(2)?;
        let severity: String = row.get(3)?;

        Ok(Alert {
            id: id
                .parse()
                .map_err(|_| Error::MalformedRow(format!("bad alert id '{id}'")))?,
            user_id: user_id
                .parse()
                .map_err(|_| Error::MalformedRow(format!("bad user id '{user_id}'")))?,
            category: AlertCategory::parse(&category).ok_or_else(|| {
                Error::MalformedRow(format!("unknown alert category '{category}'"))
            })?,
            severity: AlertSeverity::parse(&severity).ok_or_else(|| {
                Error::MalformedRow(format!("unknown alert severity '{severity}'"))
            })?,
            title: row.get(4)?,
            body: row.get(5)?,
            read: row.get::<i32>(6)? != 0,
            created_at: timestamp_from_sql(&row.get::<String>(7)?)?,
            updated_at: timestamp_from_sql(&row.get::<String>(8)?)?,
            synced: row.get::<i32>(9)? != 0,
        })
    }

    async fn list_where(
        &self,
        condition: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Alert>> {
        let mut rows = self
            .db
            .query(
                &format!("SELECT {COLUMNS} FROM alerts WHERE {condition}"),
                params,
            )
            .await?;

        let mut alerts = Vec::new();
        while let Some(row) = rows.next().await? {
            alerts.push(Self::parse_row(&row)?);
        }
        Ok(alerts)
    }
}

impl AlertsRepository for LibSqlAlertsRepository<'_> {
    async fn create(&self, user_id: &RecordId, new: NewAlert) -> Result<Alert> {
        let Some(title) = normalize_text_option(Some(new.title)) else {
            return Err(Error::InvalidInput("alert title must not be empty".into()));
        };

        let timestamp = now();
        let alert = Alert {
            id: RecordId::new(),
            user_id: *user_id,
            category: new.category,
            severity: new.severity,
            title,
            body: normalize_text_option(new.body),
            read: false,
            created_at: timestamp,
            updated_at: timestamp,
            synced: false,
        };
        let payload = serde_json::to_string(&alert)?;

        let queue = LibSqlSyncQueueRepository::new(self.db);
        self.db
            .with_transaction(|| async {
                self.db
                    .execute(
                        "INSERT INTO alerts (id, user_id, category, severity, title, body, read, \
                         created_at, updated_at, synced)
                         VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?, 0)",
                        params![
                            alert.id.to_string(),
                            alert.user_id.to_string(),
                            alert.category.as_str(),
                            alert.severity.as_str(),
                            alert.title.clone(),
                            alert.body.clone(),
                            timestamp_to_sql(alert.created_at),
                            timestamp_to_sql(alert.updated_at),
                        ],
                    )
                    .await?;
                queue
                    .enqueue(
                        SyncTable::Alerts,
                        &alert.id.to_string(),
                        SyncOperation::Insert,
                        Some(&payload),
                    )
                    .await?;
                Ok(())
            })
            .await?;

        Ok(alert)
    }

    async fn get(&self, id: &RecordId) -> Result<Option<Alert>> {
        let mut rows = self
            .db
            .query(
                &format!("SELECT {COLUMNS} FROM alerts WHERE id = ?"),
                params![id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn unread(&self, user_id: &RecordId) -> Result<Vec<Alert>> {
        self.list_where(
            "user_id = ? AND read = 0 ORDER BY created_at DESC",
            params![user_id.to_string()],
        )
        .await
    }

    async fn list(&self, user_id: &RecordId, limit: usize) -> Result<Vec<Alert>> {
        #[allow(clippy::cast_possible_wrap)]
        let limit = (if limit == 0 { DEFAULT_LIST_LIMIT } else { limit }) as i64;
        self.list_where(
            "user_id = ? ORDER BY created_at DESC LIMIT ?",
            params![user_id.to_string(), limit],
        )
        .await
    }

    async fn mark_read(&self, id: &RecordId) -> Result<()> {
        let queue = LibSqlSyncQueueRepository::new(self.db);
        self.db
            .with_transaction(|| async {
                let rows = self
                    .db
                    .execute(
                        "UPDATE alerts SET read = 1, updated_at = ?, synced = 0
                         WHERE id = ? AND read = 0",
                        params![timestamp_to_sql(now()), id.to_string()],
                    )
                    .await?;
                if rows > 0 {
                    if let Some(alert) = self.get(id).await? {
                        let payload = serde_json::to_string(&alert)?;
                        queue
                            .enqueue(
                                SyncTable::Alerts,
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
}
