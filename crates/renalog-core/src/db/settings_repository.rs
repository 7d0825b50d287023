//! Per-user settings repository.
//!
//! Settings are device-local preferences, one serialized blob per user.
//! They never enter the sync queue.

use libsql::params;

use crate::error::Result;
use crate::models::{AppSettings, RecordId};
use crate::util::{now, timestamp_to_sql};

use super::Database;

/// Storage operations for per-user settings (async)
#[allow(async_fn_in_trait)]
pub trait SettingsRepository {
    /// Load a user's settings, falling back to defaults when none are stored
    async fn load(&self, user_id: &RecordId) -> Result<AppSettings>;

    /// Persist a user's settings, replacing any stored value
    async fn save(&self, user_id: &RecordId, settings: &AppSettings) -> Result<()>;
}

/// libSQL implementation of [`SettingsRepository`]
pub struct LibSqlSettingsRepository<'a> {
    db: &'a Database,
}

impl<'a> LibSqlSettingsRepository<'a> {
    /// Create a new repository over the given database
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }
}

impl SettingsRepository for LibSqlSettingsRepository<'_> {
    async fn load(&self, user_id: &RecordId) -> Result<AppSettings> {
        let mut rows = self
            .db
            .query(
                "SELECT settings FROM app_settings WHERE user_id = ?",
                params![user_id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let raw: String = row.get(0)?;
                Ok(serde_json::from_str(&raw)?)
            }
            None => Ok(AppSettings::default()),
        }
    }

    async fn save(&self, user_id: &RecordId, settings: &AppSettings) -> Result<()> {
        let raw = serde_json::to_string(settings)?;
        self.db
            .execute(
                "INSERT INTO app_settings (user_id, settings, updated_at)
                 VALUES (?, ?, ?)
                 ON CONFLICT(user_id) DO UPDATE SET
                     settings = excluded.settings,
                     updated_at = excluded.updated_at",
                params![user_id.to_string(), raw, timestamp_to_sql(now())],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sync_repository::{LibSqlSyncQueueRepository, SyncQueueRepository};
    use crate::db::users_repository::{LibSqlUsersRepository, UsersRepository};
    use crate::models::{NewUser, WeightUnit};
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
    async fn missing_settings_fall_back_to_defaults() {
        let (db, user) = setup().await;
        let repo = LibSqlSettingsRepository::new(&db);

        assert_eq!(repo.load(&user).await.unwrap(), AppSettings::default());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn save_then_load_roundtrips_and_upserts() {
        let (db, user) = setup().await;
        let repo = LibSqlSettingsRepository::new(&db);

        let mut settings = AppSettings::default();
        settings.weight_unit = WeightUnit::Lb;
        settings.daily_fluid_limit_ml = Some(1500.0);
        repo.save(&user, &settings).await.unwrap();
        assert_eq!(repo.load(&user).await.unwrap(), settings);

        settings.daily_prompt_hour = 21;
        repo.save(&user, &settings).await.unwrap();
        assert_eq!(repo.load(&user).await.unwrap(), settings);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn settings_never_enter_the_sync_queue() {
        let (db, user) = setup().await;
        let repo = LibSqlSettingsRepository::new(&db);
        let queue = LibSqlSyncQueueRepository::new(&db);

        let baseline = queue.pending_count().await.unwrap();
        repo.save(&user, &AppSettings::default()).await.unwrap();
        assert_eq!(queue.pending_count().await.unwrap(), baseline);
    }
}
