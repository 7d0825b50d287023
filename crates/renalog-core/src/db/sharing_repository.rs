//! Shared-access grant repository.
//!
//! Grant lifecycle is `pending -> active -> revoked` with revocation
//! terminal. State transitions that run backwards fail with `InvalidInput`.

use libsql::params;

use crate::error::{Error, Result};
use crate::models::{
    RecordId, SharedAccess, SharedAccessStatus, SharedPermissions, SyncOperation, SyncTable,
    UserRole,
};
use crate::util::{normalize_text_option, now, timestamp_from_sql, timestamp_to_sql};

use super::sync_repository::{LibSqlSyncQueueRepository, SyncQueueRepository};
use super::Database;

/// Storage operations for shared-access grants (async)
#[allow(async_fn_in_trait)]
pub trait SharingRepository {
    /// Create a pending grant from a patient to a grantee email
    async fn grant(
        &self,
        patient_id: &RecordId,
        grantee_email: &str,
        grantee_role: UserRole,
        permissions: SharedPermissions,
    ) -> Result<SharedAccess>;

    /// Fetch a grant by id; absence is `None`
    async fn get(&self, id: &RecordId) -> Result<Option<SharedAccess>>;

    /// All grants issued by a patient, newest first
    async fn for_patient(&self, patient_id: &RecordId) -> Result<Vec<SharedAccess>>;

    /// Accept a pending grant
    async fn activate(&self, id: &RecordId) -> Result<()>;

    /// Withdraw a grant. Terminal; a revoked grant cannot be re-activated.
    async fn revoke(&self, id: &RecordId) -> Result<()>;
}

/// libSQL implementation of [`SharingRepository`]
pub struct LibSqlSharingRepository<'a> {
    db: &'a Database,
}

const COLUMNS: &str = "id, patient_id, grantee_email, grantee_role, permissions, status, \
     created_at, updated_at, synced";

impl<'a> LibSqlSharingRepository<'a> {
    /// Create a new repository over the given database
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn parse_row(row: &libsql::Row) -> Result<SharedAccess> {
        let id: String = row.get(0)?;
        let patient_id: String = row.get(1)?;
        let grantee_role: String = row.get(3)?;
        let permissions: String = row.get(4)?;
        let status: String = row.get(5)?;

        Ok(SharedAccess {
            id: id
                .parse()
                .map_err(|_| Error::MalformedRow(format!("bad grant id '{id}'")))?,
            patient_id: patient_id
                .parse()
                .map_err(|_| Error::MalformedRow(format!("bad patient id '{patient_id}'")))?,
            grantee_email: row.get(2)?,
            grantee_role: UserRole::parse(&grantee_role)
                .ok_or_else(|| Error::MalformedRow(format!("unknown role '{grantee_role}'")))?,
            permissions: serde_json::from_str(&permissions)?,
            status: SharedAccessStatus::parse(&status)
                .ok_or_else(|| Error::MalformedRow(format!("unknown grant status '{status}'")))?,
            created_at: timestamp_from_sql(&row.get::<String>(6)?)?,
            updated_at: timestamp_from_sql(&row.get::<String>(7)?)?,
            synced: row.get::<i32>(8)? != 0,
        })
    }

    async fn transition(
        &self,
        id: &RecordId,
        from: SharedAccessStatus,
        to: SharedAccessStatus,
    ) -> Result<()> {
        let grant = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("shared access grant {id}")))?;
        if grant.status == to {
            return Ok(());
        }
        if grant.status != from {
            return Err(Error::InvalidInput(format!(
                "cannot move a {} grant to {}",
                grant.status.as_str(),
                to.as_str()
            )));
        }

        let queue = LibSqlSyncQueueRepository::new(self.db);
        self.db
            .with_transaction(|| async {
                self.db
                    .execute(
                        "UPDATE shared_access SET status = ?, updated_at = ?, synced = 0
                         WHERE id = ?",
                        params![to.as_str(), timestamp_to_sql(now()), id.to_string()],
                    )
                    .await?;
                if let Some(grant) = self.get(id).await? {
                    let payload = serde_json::to_string(&grant)?;
                    queue
                        .enqueue(
                            SyncTable::SharedAccess,
                            &id.to_string(),
                            SyncOperation::Update,
                            Some(&payload),
                        )
                        .await?;
                }
                Ok(())
            })
            .await
    }
}

impl SharingRepository for LibSqlSharingRepository<'_> {
    async fn grant(
        &self,
        patient_id: &RecordId,
        grantee_email: &str,
        grantee_role: UserRole,
        permissions: SharedPermissions,
    ) -> Result<SharedAccess> {
        let Some(grantee_email) = normalize_text_option(Some(grantee_email.to_string())) else {
            return Err(Error::InvalidInput("grantee email must not be empty".into()));
        };

        let timestamp = now();
        let grant = SharedAccess {
            id: RecordId::new(),
            patient_id: *patient_id,
            grantee_email: grantee_email.to_lowercase(),
            grantee_role,
            permissions,
            status: SharedAccessStatus::Pending,
            created_at: timestamp,
            updated_at: timestamp,
            synced: false,
        };
        let payload = serde_json::to_string(&grant)?;
        let permissions_json = serde_json::to_string(&grant.permissions)?;

        let queue = LibSqlSyncQueueRepository::new(self.db);
        self.db
            .with_transaction(|| async {
                self.db
                    .execute(
                        "INSERT INTO shared_access (id, patient_id, grantee_email, grantee_role, \
                         permissions, status, created_at, updated_at, synced)
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0)",
                        params![
                            grant.id.to_string(),
                            grant.patient_id.to_string(),
                            grant.grantee_email.clone(),
                            grant.grantee_role.as_str(),
                            permissions_json.clone(),
                            grant.status.as_str(),
                            timestamp_to_sql(grant.created_at),
                            timestamp_to_sql(grant.updated_at),
                        ],
                    )
                    .await?;
                queue
                    .enqueue(
                        SyncTable::SharedAccess,
                        &grant.id.to_string(),
                        SyncOperation::Insert,
                        Some(&payload),
                    )
                    .await?;
                Ok(())
            })
            .await?;

        Ok(grant)
    }

    async fn get(&self, id: &RecordId) -> Result<Option<SharedAccess>> {
        let mut rows = self
            .db
            .query(
                &format!("SELECT {COLUMNS} FROM shared_access WHERE id = ?"),
                params![id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn for_patient(&self, patient_id: &RecordId) -> Result<Vec<SharedAccess>> {
        let mut rows = self
            .db
            .query(
                &format!(
                    "SELECT {COLUMNS} FROM shared_access WHERE patient_id = ?
                     ORDER BY created_at DESC"
                ),
                params![patient_id.to_string()],
            )
            .await?;

        let mut grants = Vec::new();
        while let Some(row) = rows.next().await? {
            grants.push(Self::parse_row(&row)?);
        }
        Ok(grants)
    }

    async fn activate(&self, id: &RecordId) -> Result<()> {
        self.transition(id, SharedAccessStatus::Pending, SharedAccessStatus::Active)
            .await
    }

    async fn revoke(&self, id: &RecordId) -> Result<()> {
        let grant = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("shared access grant {id}")))?;
        if grant.status == SharedAccessStatus::Revoked {
            return Ok(());
        }
        self.transition(id, grant.status, SharedAccessStatus::Revoked)
            .await
    }
}
