//! Food log repository and daily nutrition summary

use chrono::NaiveDate;
use libsql::params;

use crate::error::{Error, Result};
use crate::models::{
    DailyNutritionSummary, FoodEntry, FoodEntryUpdate, MealType, NewFoodEntry, RecordId,
    SyncOperation, SyncTable,
};
use crate::util::{date_from_sql, date_to_sql, normalize_text_option, now, timestamp_from_sql, timestamp_to_sql};

use super::sync_repository::{LibSqlSyncQueueRepository, SyncQueueRepository};
use super::update::UpdateBuilder;
use super::{Database, DEFAULT_LIST_LIMIT};

/// Storage operations for the food log (async)
#[allow(async_fn_in_trait)]
pub trait FoodRepository {
    /// Insert a new entry and enqueue it for sync
    async fn create(&self, user_id: &RecordId, new: NewFoodEntry) -> Result<FoodEntry>;

    /// Fetch an entry by id; absence is `None`
    async fn get(&self, id: &RecordId) -> Result<Option<FoodEntry>>;

    /// Entries for a user, newest day first
    async fn list(&self, user_id: &RecordId, limit: usize) -> Result<Vec<FoodEntry>>;

    /// All entries logged on a single day, in creation order
    async fn list_for_date(&self, user_id: &RecordId, date: NaiveDate) -> Result<Vec<FoodEntry>>;

    /// Zero-filled nutrient totals for one day
    async fn daily_summary(
        &self,
        user_id: &RecordId,
        date: NaiveDate,
    ) -> Result<DailyNutritionSummary>;

    /// Merge-update; absent fields keep their stored value
    async fn update(&self, id: &RecordId, update: FoodEntryUpdate) -> Result<()>;

    /// Hard delete; enqueues a sync `delete`
    async fn delete(&self, id: &RecordId) -> Result<()>;
}

/// libSQL implementation of [`FoodRepository`]
pub struct LibSqlFoodRepository<'a> {
    db: &'a Database,
}

const COLUMNS: &str = "id, user_id, name, meal_type, date, calories, protein_g, carbs_g, fat_g, \
     sodium_mg, potassium_mg, phosphorus_mg, fluid_ml, created_at, updated_at, synced";

impl<'a> LibSqlFoodRepository<'a> {
    /// Create a new repository over the given database
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn parse_row(row: &libsql::Row) -> Result<FoodEntry> {
        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        let meal_type: String = row.get(3)?;

        Ok(FoodEntry {
            id: id
                .parse()
                .map_err(|_| Error::MalformedRow(format!("bad food entry id '{id}'")))?,
            user_id: user_id
                .parse()
                .map_err(|_| Error::MalformedRow(format!("bad user id '{user_id}'")))?,
            name: row.get(2)?,
            meal_type: MealType::parse(&meal_type)
                .ok_or_else(|| Error::MalformedRow(format!("unknown meal type '{meal_type}'")))?,
            date: date_from_sql(&row.get::<String>(4)?)?,
            calories: row.get(5)?,
            protein_g: row.get(6)?,
            carbs_g: row.get(7)?,
            fat_g: row.get(8)?,
            sodium_mg: row.get(9)?,
            potassium_mg: row.get(10)?,
            phosphorus_mg: row.get(11)?,
            fluid_ml: row.get(12)?,
            created_at: timestamp_from_sql(&row.get::<String>(13)?)?,
            updated_at: timestamp_from_sql(&row.get::<String>(14)?)?,
            synced: row.get::<i32>(15)? != 0,
        })
    }
}

impl FoodRepository for LibSqlFoodRepository<'_> {
    async fn create(&self, user_id: &RecordId, new: NewFoodEntry) -> Result<FoodEntry> {
        let Some(name) = normalize_text_option(Some(new.name)) else {
            return Err(Error::InvalidInput("food name must not be empty".into()));
        };

        let timestamp = now();
        let entry = FoodEntry {
            id: RecordId::new(),
            user_id: *user_id,
            name,
            meal_type: new.meal_type,
            date: new.date,
            calories: new.calories,
            protein_g: new.protein_g,
            carbs_g: new.carbs_g,
            fat_g: new.fat_g,
            sodium_mg: new.sodium_mg,
            potassium_mg: new.potassium_mg,
            phosphorus_mg: new.phosphorus_mg,
            fluid_ml: new.fluid_ml,
            created_at: timestamp,
            updated_at: timestamp,
            synced: false,
        };
        let payload = serde_json::to_string(&entry)?;

        let queue = LibSqlSyncQueueRepository::new(self.db);
        self.db
            .with_transaction(|| async {
                self.db
                    .execute(
                        "INSERT INTO food_entries (id, user_id, name, meal_type, date, calories, \
                         protein_g, carbs_g, fat_g, sodium_mg, potassium_mg, phosphorus_mg, \
                         fluid_ml, created_at, updated_at, synced)
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)",
                        params![
                            entry.id.to_string(),
                            entry.user_id.to_string(),
                            entry.name.clone(),
                            entry.meal_type.as_str(),
                            date_to_sql(entry.date),
                            entry.calories,
                            entry.protein_g,
                            entry.carbs_g,
                            entry.fat_g,
                            entry.sodium_mg,
                            entry.potassium_mg,
                            entry.phosphorus_mg,
                            entry.fluid_ml,
                            timestamp_to_sql(entry.created_at),
                            timestamp_to_sql(entry.updated_at),
                        ],
                    )
                    .await?;
                queue
                    .enqueue(
                        SyncTable::FoodEntries,
                        &entry.id.to_string(),
                        SyncOperation::Insert,
                        Some(&payload),
                    )
                    .await?;
                Ok(())
            })
            .await?;

        Ok(entry)
    }

    async fn get(&self, id: &RecordId) -> Result<Option<FoodEntry>> {
        let mut rows = self
            .db
            .query(
                &format!("SELECT {COLUMNS} FROM food_entries WHERE id = ?"),
                params![id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, user_id: &RecordId, limit: usize) -> Result<Vec<FoodEntry>> {
        #[allow(clippy::cast_possible_wrap)]
        let limit = (if limit == 0 { DEFAULT_LIST_LIMIT } else { limit }) as i64;
        let mut rows = self
            .db
            .query(
                &format!(
                    "SELECT {COLUMNS} FROM food_entries WHERE user_id = ?
                     ORDER BY date DESC, created_at DESC LIMIT ?"
                ),
                params![user_id.to_string(), limit],
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(Self::parse_row(&row)?);
        }
        Ok(entries)
    }

    async fn list_for_date(&self, user_id: &RecordId, date: NaiveDate) -> Result<Vec<FoodEntry>> {
        let mut rows = self
            .db
            .query(
                &format!(
                    "SELECT {COLUMNS} FROM food_entries WHERE user_id = ? AND date = ?
                     ORDER BY created_at ASC"
                ),
                params![user_id.to_string(), date_to_sql(date)],
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(Self::parse_row(&row)?);
        }
        Ok(entries)
    }

    async fn daily_summary(
        &self,
        user_id: &RecordId,
        date: NaiveDate,
    ) -> Result<DailyNutritionSummary> {
        // NULL nutrient fields contribute zero to the totals.
        let mut rows = self
            .db
            .query(
                "SELECT COUNT(*),
                        COALESCE(SUM(calories), 0.0),
                        COALESCE(SUM(protein_g), 0.0),
                        COALESCE(SUM(carbs_g), 0.0),
                        COALESCE(SUM(fat_g), 0.0),
                        COALESCE(SUM(sodium_mg), 0.0),
                        COALESCE(SUM(potassium_mg), 0.0),
                        COALESCE(SUM(phosphorus_mg), 0.0),
                        COALESCE(SUM(fluid_ml), 0.0)
                 FROM food_entries WHERE user_id = ? AND date = ?",
                params![user_id.to_string(), date_to_sql(date)],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(DailyNutritionSummary {
                date,
                ..DailyNutritionSummary::default()
            });
        };

        Ok(DailyNutritionSummary {
            date,
            entry_count: row.get(0)?,
            calories: row.get(1)?,
            protein_g: row.get(2)?,
            carbs_g: row.get(3)?,
            fat_g: row.get(4)?,
            sodium_mg: row.get(5)?,
            potassium_mg: row.get(6)?,
            phosphorus_mg: row.get(7)?,
            fluid_ml: row.get(8)?,
        })
    }

    async fn update(&self, id: &RecordId, update: FoodEntryUpdate) -> Result<()> {
        let name = match update.name {
            Some(name) => match normalize_text_option(Some(name)) {
                Some(name) => Some(name),
                None => {
                    return Err(Error::InvalidInput("food name must not be empty".into()));
                }
            },
            None => None,
        };

        let mut builder = UpdateBuilder::new("food_entries");
        builder
            .set_if("name", name)
            .set_if("meal_type", update.meal_type.map(MealType::as_str))
            .set_if("calories", update.calories)
            .set_if("protein_g", update.protein_g)
            .set_if("carbs_g", update.carbs_g)
            .set_if("fat_g", update.fat_g)
            .set_if("sodium_mg", update.sodium_mg)
            .set_if("potassium_mg", update.potassium_mg)
            .set_if("phosphorus_mg", update.phosphorus_mg)
            .set_if("fluid_ml", update.fluid_ml);
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
                    if let Some(entry) = self.get(id).await? {
                        let payload = serde_json::to_string(&entry)?;
                        queue
                            .enqueue(
                                SyncTable::FoodEntries,
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
                        "DELETE FROM food_entries WHERE id = ?",
                        params![id.to_string()],
                    )
                    .await?;
                if rows > 0 {
                    queue
                        .enqueue(
                            SyncTable::FoodEntries,
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

    fn banana(date: &str) -> NewFoodEntry {
        NewFoodEntry {
            name: "Banana".to_string(),
            meal_type: MealType::Snack,
            date: date.parse().unwrap(),
            calories: Some(105.0),
            protein_g: Some(1.3),
            carbs_g: Some(27.0),
            fat_g: None,
            sodium_mg: Some(1.0),
            potassium_mg: Some(422.0),
            phosphorus_mg: Some(26.0),
            fluid_ml: None,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_rejects_blank_name() {
        let (db, user) = setup().await;
        let repo = LibSqlFoodRepository::new(&db);

        let mut entry = banana("2025-06-02");
        entry.name = "   ".to_string();
        let err = repo.create(&user, entry).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn daily_summary_zero_fills_missing_nutrients() {
        let (db, user) = setup().await;
        let repo = LibSqlFoodRepository::new(&db);
        let date: NaiveDate = "2025-06-02".parse().unwrap();

        repo.create(&user, banana("2025-06-02")).await.unwrap();
        repo.create(
            &user,
            NewFoodEntry {
                name: "Rice".to_string(),
                meal_type: MealType::Dinner,
                calories: Some(200.0),
                potassium_mg: None,
                ..banana("2025-06-02")
            },
        )
        .await
        .unwrap();

        let summary = repo.daily_summary(&user, date).await.unwrap();
        assert_eq!(summary.entry_count, 2);
        assert_eq!(summary.calories, 305.0);
        // Only the banana contributes potassium; the rice row is NULL there.
        assert_eq!(summary.potassium_mg, 422.0);
        assert_eq!(summary.fluid_ml, 0.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn daily_summary_for_empty_day_is_all_zero() {
        let (db, user) = setup().await;
        let repo = LibSqlFoodRepository::new(&db);

        let summary = repo
            .daily_summary(&user, "2025-06-03".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(summary.entry_count, 0);
        assert_eq!(summary.calories, 0.0);
        assert_eq!(summary.sodium_mg, 0.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn list_for_date_returns_only_that_day_in_order() {
        let (db, user) = setup().await;
        let repo = LibSqlFoodRepository::new(&db);

        let first = repo.create(&user, banana("2025-06-02")).await.unwrap();
        let second = repo
            .create(
                &user,
                NewFoodEntry {
                    name: "Oatmeal".to_string(),
                    meal_type: MealType::Breakfast,
                    ..banana("2025-06-02")
                },
            )
            .await
            .unwrap();
        repo.create(&user, banana("2025-06-03")).await.unwrap();

        let entries = repo
            .list_for_date(&user, "2025-06-02".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, first.id);
        assert_eq!(entries[1].id, second.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_changes_meal_type_and_keeps_nutrients() {
        let (db, user) = setup().await;
        let repo = LibSqlFoodRepository::new(&db);

        let entry = repo.create(&user, banana("2025-06-02")).await.unwrap();
        repo.update(
            &entry.id,
            FoodEntryUpdate {
                meal_type: Some(MealType::Breakfast),
                ..FoodEntryUpdate::default()
            },
        )
        .await
        .unwrap();

        let updated = repo.get(&entry.id).await.unwrap().unwrap();
        assert_eq!(updated.meal_type, MealType::Breakfast);
        assert_eq!(updated.potassium_mg, Some(422.0));
    }
}
