//! Subscription repository. One row per user, upsert semantics.

use libsql::params;

use crate::error::{Error, Result};
use crate::models::{RecordId, Subscription, SyncOperation, SyncTable};
use crate::util::{now, timestamp_from_sql, timestamp_to_sql};

use super::sync_repository::{LibSqlSyncQueueRepository, SyncQueueRepository};
use super::Database;

/// Storage operations for subscriptions (async)
#[allow(async_fn_in_trait)]
pub trait SubscriptionsRepository {
    /// Fetch a user's subscription; absence is `None`
    async fn get(&self, user_id: &RecordId) -> Result<Option<Subscription>>;

    /// Insert or replace a user's subscription state
    async fn upsert(
        &self,
        user_id: &RecordId,
        plan: &str,
        status: &str,
        platform: Option<&str>,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Subscription>;
}

/// libSQL implementation of [`SubscriptionsRepository`]
pub struct LibSqlSubscriptionsRepository<'a> {
    db: &'a Database,
}

impl<'a> LibSqlSubscriptionsRepository<'a> {
    /// Create a new repository over the given database
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn parse_row(row: &libsql::Row) -> Result<Subscription> {
        let user_id: String = row.get(0)?;
        let expires_at: Option<String> = row.get(4)?;

        Ok(Subscription {
            user_id: user_id
                .parse()
                .map_err(|_| Error::MalformedRow(format!("bad user id '{user_id}'")))?,
            plan: row.get(1)?,
            status: row.get(2)?,
            platform: row.get(3)?,
            expires_at: expires_at.map(|raw| timestamp_from_sql(&raw)).transpose()?,
            created_at: timestamp_from_sql(&row.get::<String>(5)?)?,
            updated_at: timestamp_from_sql(&row.get::<String>(6)?)?,
            synced: row.get::<i32>(7)? != 0,
        })
    }
}

impl SubscriptionsRepository for LibSqlSubscriptionsRepository<'_> {
    async fn get(&self, user_id: &RecordId) -> Result<Option<Subscription>> {
        let mut rows = self
            .db
            .query(
                "SELECT user_id, plan, status, platform, expires_at, created_at, updated_at, synced
                 FROM subscriptions WHERE user_id = ?",
                params![user_id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert(
        &self,
        user_id: &RecordId,
        plan: &str,
        status: &str,
        platform: Option<&str>,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Subscription> {
        let timestamp = now();
        let created_at = self
            .get(user_id)
            .await?
            .map_or(timestamp, |existing| existing.created_at);

        let subscription = Subscription {
            user_id: *user_id,
            plan: plan.to_string(),
            status: status.to_string(),
            platform: platform.map(str::to_string),
            expires_at,
            created_at,
            updated_at: timestamp,
            synced: false,
        };
        let payload = serde_json::to_string(&subscription)?;

        let queue = LibSqlSyncQueueRepository::new(self.db);
        self.db
            .with_transaction(|| async {
                self.db
                    .execute(
                        "INSERT INTO subscriptions (user_id, plan, status, platform, expires_at, \
                         created_at, updated_at, synced)
                         VALUES (?, ?, ?, ?, ?, ?, ?, 0)
                         ON CONFLICT(user_id) DO UPDATE SET
                             plan = excluded.plan,
                             status = excluded.status,
                             platform = excluded.platform,
                             expires_at = excluded.expires_at,
                             updated_at = excluded.updated_at,
                             synced = 0",
                        params![
                            subscription.user_id.to_string(),
                            subscription.plan.clone(),
                            subscription.status.clone(),
                            subscription.platform.clone(),
                            subscription.expires_at.map(timestamp_to_sql),
                            timestamp_to_sql(subscription.created_at),
                            timestamp_to_sql(subscription.updated_at),
                        ],
                    )
                    .await?;
                queue
                    .enqueue(
                        SyncTable::Subscriptions,
                        &subscription.user_id.to_string(),
                        SyncOperation::Update,
                        Some(&payload),
                    )
                    .await?;
                Ok(())
            })
            .await?;

        Ok(subscription)
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
    async fn upsert_replaces_without_losing_created_at() {
        let (db, user) = setup().await;
        let repo = LibSqlSubscriptionsRepository::new(&db);

        let first = repo
            .upsert(&user, "free", "active", None, None)
            .await
            .unwrap();
        let second = repo
            .upsert(&user, "premium", "active", Some("app-store"), None)
            .await
            .unwrap();

        assert_eq!(second.created_at, first.created_at);
        let stored = repo.get(&user).await.unwrap().unwrap();
        assert_eq!(stored.plan, "premium");
        assert_eq!(stored.platform.as_deref(), Some("app-store"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_subscription_is_none() {
        let (db, user) = setup().await;
        let repo = LibSqlSubscriptionsRepository::new(&db);
        assert!(repo.get(&user).await.unwrap().is_none());
    }
}
