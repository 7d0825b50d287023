//! User account repository.
//!
//! Sign-in failures never say whether the email or the password was wrong;
//! both collapse into [`Error::InvalidCredentials`].

use libsql::params;

use crate::auth;
use crate::error::{Error, Result};
use crate::models::{NewUser, RecordId, SyncOperation, SyncTable, User, UserRole};
use crate::util::{date_from_sql, date_to_sql, normalize_text_option, now, timestamp_from_sql, timestamp_to_sql};

use super::sync_repository::{LibSqlSyncQueueRepository, SyncQueueRepository};
use super::update::UpdateBuilder;
use super::Database;

/// Storage operations for user accounts (async)
#[allow(async_fn_in_trait)]
pub trait UsersRepository {
    /// Create a password account.
    ///
    /// The email is lower-cased before storage and must not already be
    /// taken. The password is hashed before it touches the database.
    async fn sign_up(&self, new: NewUser, password: &str) -> Result<User>;

    /// Authenticate a password account
    async fn sign_in(&self, email: &str, password: &str) -> Result<User>;

    /// Find a provider account by its stable subject id, creating it on
    /// first sign-in.
    async fn find_or_create_oauth(
        &self,
        provider: &str,
        subject: &str,
        email: &str,
        role: UserRole,
    ) -> Result<User>;

    /// Fetch a user by id; absence is `None`
    async fn get(&self, id: &RecordId) -> Result<Option<User>>;

    /// Fetch a user by email; absence is `None`
    async fn by_email(&self, email: &str) -> Result<Option<User>>;

    /// Merge-update the profile fields
    async fn update_profile(&self, id: &RecordId, update: ProfileUpdate) -> Result<()>;

    /// Replace the password after verifying the current one
    async fn change_password(&self, id: &RecordId, current: &str, new: &str) -> Result<()>;
}

/// Partial profile update; `None` fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    /// New display name
    pub full_name: Option<String>,
    /// New date of birth
    pub date_of_birth: Option<chrono::NaiveDate>,
    /// New dialysis modality note
    pub dialysis_modality: Option<String>,
}

/// libSQL implementation of [`UsersRepository`]
pub struct LibSqlUsersRepository<'a> {
    db: &'a Database,
}

const COLUMNS: &str = "id, email, role, password_hash, auth_provider, provider_subject, \
     full_name, date_of_birth, dialysis_modality, created_at, updated_at, synced";

impl<'a> LibSqlUsersRepository<'a> {
    /// Create a new repository over the given database
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn parse_row(row: &libsql::Row) -> Result<User> {
        let id: String = row.get(0)?;
        let role: String = row.get(2)?;
        let date_of_birth: Option<String> = row.get(7)?;

        Ok(User {
            id: id
                .parse()
                .map_err(|_| Error::MalformedRow(format!("bad user id '{id}'")))?,
            email: row.get(1)?,
            role: UserRole::parse(&role)
                .ok_or_else(|| Error::MalformedRow(format!("unknown role '{role}'")))?,
            password_hash: row.get(3)?,
            auth_provider: row.get(4)?,
            provider_subject: row.get(5)?,
            full_name: row.get(6)?,
            date_of_birth: date_of_birth.map(|raw| date_from_sql(&raw)).transpose()?,
            dialysis_modality: row.get(8)?,
            created_at: timestamp_from_sql(&row.get::<String>(9)?)?,
            updated_at: timestamp_from_sql(&row.get::<String>(10)?)?,
            synced: row.get::<i32>(11)? != 0,
        })
    }

    async fn insert(&self, user: &User) -> Result<()> {
        let payload = serde_json::to_string(user)?;
        let queue = LibSqlSyncQueueRepository::new(self.db);
        self.db
            .with_transaction(|| async {
                self.db
                    .execute(
                        "INSERT INTO users (id, email, role, password_hash, auth_provider, \
                         provider_subject, full_name, date_of_birth, dialysis_modality, \
                         created_at, updated_at, synced)
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)",
                        params![
                            user.id.to_string(),
                            user.email.clone(),
                            user.role.as_str(),
                            user.password_hash.clone(),
                            user.auth_provider.clone(),
                            user.provider_subject.clone(),
                            user.full_name.clone(),
                            user.date_of_birth.map(date_to_sql),
                            user.dialysis_modality.clone(),
                            timestamp_to_sql(user.created_at),
                            timestamp_to_sql(user.updated_at),
                        ],
                    )
                    .await?;
                queue
                    .enqueue(
                        SyncTable::Users,
                        &user.id.to_string(),
                        SyncOperation::Insert,
                        Some(&payload),
                    )
                    .await?;
                Ok(())
            })
            .await
    }
}

impl UsersRepository for LibSqlUsersRepository<'_> {
    async fn sign_up(&self, new: NewUser, password: &str) -> Result<User> {
        let Some(email) = normalize_text_option(Some(new.email)) else {
            return Err(Error::InvalidInput("email must not be empty".into()));
        };
        let email = email.to_lowercase();
        if !email.contains('@') {
            return Err(Error::InvalidInput(format!("'{email}' is not an email address")));
        }
        if self.by_email(&email).await?.is_some() {
            return Err(Error::EmailTaken);
        }

        let password_hash = auth::hash_password(password)?;
        let timestamp = now();
        let user = User {
            id: RecordId::new(),
            email,
            role: new.role,
            password_hash: Some(password_hash),
            auth_provider: None,
            provider_subject: None,
            full_name: normalize_text_option(new.full_name),
            date_of_birth: new.date_of_birth,
            dialysis_modality: normalize_text_option(new.dialysis_modality),
            created_at: timestamp,
            updated_at: timestamp,
            synced: false,
        };
        self.insert(&user).await?;
        tracing::info!(user = %user.id, "Created account");
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        let user = self
            .by_email(&email.trim().to_lowercase())
            .await?
            .ok_or(Error::InvalidCredentials)?;
        let hash = user.password_hash.as_deref().ok_or(Error::InvalidCredentials)?;
        if !auth::verify_password(password, hash) {
            return Err(Error::InvalidCredentials);
        }
        Ok(user)
    }

    async fn find_or_create_oauth(
        &self,
        provider: &str,
        subject: &str,
        email: &str,
        role: UserRole,
    ) -> Result<User> {
        let mut rows = self
            .db
            .query(
                &format!(
                    "SELECT {COLUMNS} FROM users
                     WHERE auth_provider = ? AND provider_subject = ?"
                ),
                params![provider, subject],
            )
            .await?;
        if let Some(row) = rows.next().await? {
            return Self::parse_row(&row);
        }

        let email = email.trim().to_lowercase();
        if self.by_email(&email).await?.is_some() {
            return Err(Error::EmailTaken);
        }

        let timestamp = now();
        let user = User {
            id: RecordId::new(),
            email,
            role,
            password_hash: None,
            auth_provider: Some(provider.to_string()),
            provider_subject: Some(subject.to_string()),
            full_name: None,
            date_of_birth: None,
            dialysis_modality: None,
            created_at: timestamp,
            updated_at: timestamp,
            synced: false,
        };
        self.insert(&user).await?;
        tracing::info!(user = %user.id, provider, "Created provider account");
        Ok(user)
    }

    async fn get(&self, id: &RecordId) -> Result<Option<User>> {
        let mut rows = self
            .db
            .query(
                &format!("SELECT {COLUMNS} FROM users WHERE id = ?"),
                params![id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn by_email(&self, email: &str) -> Result<Option<User>> {
        let mut rows = self
            .db
            .query(
                &format!("SELECT {COLUMNS} FROM users WHERE email = ?"),
                params![email],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_profile(&self, id: &RecordId, update: ProfileUpdate) -> Result<()> {
        let mut builder = UpdateBuilder::new("users");
        builder
            .set_if("full_name", normalize_text_option(update.full_name))
            .set_if("date_of_birth", update.date_of_birth.map(date_to_sql))
            .set_if(
                "dialysis_modality",
                normalize_text_option(update.dialysis_modality),
            );
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
                    if let Some(user) = self.get(id).await? {
                        let payload = serde_json::to_string(&user)?;
                        queue
                            .enqueue(
                                SyncTable::Users,
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

    async fn change_password(&self, id: &RecordId, current: &str, new: &str) -> Result<()> {
        let user = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {id}")))?;
        let hash = user.password_hash.as_deref().ok_or(Error::InvalidCredentials)?;
        if !auth::verify_password(current, hash) {
            return Err(Error::InvalidCredentials);
        }

        let new_hash = auth::hash_password(new)?;
        // Hashes stay device-local; a password change is not sync-queued.
        self.db
            .execute(
                "UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?",
                params![new_hash, timestamp_to_sql(now()), id.to_string()],
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

    fn pat() -> NewUser {
        NewUser {
            email: "Pat@Example.com".to_string(),
            role: UserRole::Patient,
            full_name: Some("Pat Doe".to_string()),
            date_of_birth: None,
            dialysis_modality: Some("in-center HD, MWF".to_string()),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sign_up_lowercases_email_and_hashes_password() {
        let db = setup().await;
        let repo = LibSqlUsersRepository::new(&db);

        let user = repo.sign_up(pat(), "hunter2hunter2").await.unwrap();
        assert_eq!(user.email, "pat@example.com");
        assert!(user.has_password());
        assert_ne!(user.password_hash.as_deref(), Some("hunter2hunter2"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn duplicate_email_is_rejected() {
        let db = setup().await;
        let repo = LibSqlUsersRepository::new(&db);

        repo.sign_up(pat(), "hunter2hunter2").await.unwrap();
        let err = repo.sign_up(pat(), "otherpassword").await.unwrap_err();
        assert!(matches!(err, Error::EmailTaken));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sign_in_never_distinguishes_failures() {
        let db = setup().await;
        let repo = LibSqlUsersRepository::new(&db);
        repo.sign_up(pat(), "hunter2hunter2").await.unwrap();

        let wrong_password = repo
            .sign_in("pat@example.com", "wrong-password")
            .await
            .unwrap_err();
        let unknown_email = repo
            .sign_in("nobody@example.com", "hunter2hunter2")
            .await
            .unwrap_err();

        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert!(matches!(wrong_password, Error::InvalidCredentials));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sign_in_ignores_email_case() {
        let db = setup().await;
        let repo = LibSqlUsersRepository::new(&db);
        let user = repo.sign_up(pat(), "hunter2hunter2").await.unwrap();

        let signed_in = repo
            .sign_in("PAT@EXAMPLE.COM", "hunter2hunter2")
            .await
            .unwrap();
        assert_eq!(signed_in.id, user.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn oauth_account_is_stable_across_sign_ins() {
        let db = setup().await;
        let repo = LibSqlUsersRepository::new(&db);

        let first = repo
            .find_or_create_oauth("google", "sub-123", "pat@example.com", UserRole::Patient)
            .await
            .unwrap();
        assert!(!first.has_password());

        let second = repo
            .find_or_create_oauth("google", "sub-123", "pat@example.com", UserRole::Patient)
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn change_password_requires_current() {
        let db = setup().await;
        let repo = LibSqlUsersRepository::new(&db);
        let user = repo.sign_up(pat(), "hunter2hunter2").await.unwrap();

        let err = repo
            .change_password(&user.id, "wrong-password", "newpassword1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));

        repo.change_password(&user.id, "hunter2hunter2", "newpassword1")
            .await
            .unwrap();
        repo.sign_in("pat@example.com", "newpassword1").await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn profile_update_merges_fields() {
        let db = setup().await;
        let repo = LibSqlUsersRepository::new(&db);
        let user = repo.sign_up(pat(), "hunter2hunter2").await.unwrap();

        repo.update_profile(
            &user.id,
            ProfileUpdate {
                full_name: Some("Pat Q. Doe".to_string()),
                ..ProfileUpdate::default()
            },
        )
        .await
        .unwrap();

        let updated = repo.get(&user.id).await.unwrap().unwrap();
        assert_eq!(updated.full_name.as_deref(), Some("Pat Q. Doe"));
        assert_eq!(updated.dialysis_modality.as_deref(), Some("in-center HD, MWF"));
    }
}
