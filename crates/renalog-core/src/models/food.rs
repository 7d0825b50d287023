//! Food log model and daily nutrition aggregation

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::RecordId;

/// Which meal a food entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    /// Breakfast
    Breakfast,
    /// Lunch
    Lunch,
    /// Dinner
    Dinner,
    /// Snack
    Snack,
}

impl MealType {
    /// Storage form of the meal type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
        }
    }

    /// Parse the storage form back into a meal type
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "breakfast" => Some(Self::Breakfast),
            "lunch" => Some(Self::Lunch),
            "dinner" => Some(Self::Dinner),
            "snack" => Some(Self::Snack),
            _ => None,
        }
    }
}

/// One logged food item.
///
/// Carries generic macros plus the micronutrients that matter for kidney
/// patients (sodium, potassium, phosphorus, fluid).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodEntry {
    /// Unique identifier
    pub id: RecordId,
    /// Owning user
    pub user_id: RecordId,
    /// Food name
    pub name: String,
    /// Meal this entry belongs to
    pub meal_type: MealType,
    /// Day the food was eaten
    pub date: NaiveDate,
    /// Calories (kcal)
    pub calories: Option<f64>,
    /// Protein (g)
    pub protein_g: Option<f64>,
    /// Carbohydrates (g)
    pub carbs_g: Option<f64>,
    /// Fat (g)
    pub fat_g: Option<f64>,
    /// Sodium (mg)
    pub sodium_mg: Option<f64>,
    /// Potassium (mg)
    pub potassium_mg: Option<f64>,
    /// Phosphorus (mg)
    pub phosphorus_mg: Option<f64>,
    /// Fluid content (ml)
    pub fluid_ml: Option<f64>,
    /// Creation timestamp (UTC)
    pub created_at: DateTime<Utc>,
    /// Last update timestamp (UTC)
    pub updated_at: DateTime<Utc>,
    /// Whether this row has been confirmed by the remote authority
    pub synced: bool,
}

/// Fields supplied when logging food
#[derive(Debug, Clone)]
pub struct NewFoodEntry {
    /// Food name (required)
    pub name: String,
    /// Meal this entry belongs to
    pub meal_type: MealType,
    /// Day the food was eaten
    pub date: NaiveDate,
    /// Calories (kcal)
    pub calories: Option<f64>,
    /// Protein (g)
    pub protein_g: Option<f64>,
    /// Carbohydrates (g)
    pub carbs_g: Option<f64>,
    /// Fat (g)
    pub fat_g: Option<f64>,
    /// Sodium (mg)
    pub sodium_mg: Option<f64>,
    /// Potassium (mg)
    pub potassium_mg: Option<f64>,
    /// Phosphorus (mg)
    pub phosphorus_mg: Option<f64>,
    /// Fluid content (ml)
    pub fluid_ml: Option<f64>,
}

/// Partial update for a food entry; `None` fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct FoodEntryUpdate {
    /// New name
    pub name: Option<String>,
    /// New meal type
    pub meal_type: Option<MealType>,
    /// New calories
    pub calories: Option<f64>,
    /// New protein
    pub protein_g: Option<f64>,
    /// New carbohydrates
    pub carbs_g: Option<f64>,
    /// New fat
    pub fat_g: Option<f64>,
    /// New sodium
    pub sodium_mg: Option<f64>,
    /// New potassium
    pub potassium_mg: Option<f64>,
    /// New phosphorus
    pub phosphorus_mg: Option<f64>,
    /// New fluid content
    pub fluid_ml: Option<f64>,
}

/// Zero-filled sums of every nutrient across a day's entries.
///
/// Missing fields contribute zero; a day with no entries sums to all zeros.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DailyNutritionSummary {
    /// Day the summary covers
    pub date: NaiveDate,
    /// Number of entries logged that day
    pub entry_count: i64,
    /// Total calories (kcal)
    pub calories: f64,
    /// Total protein (g)
    pub protein_g: f64,
    /// Total carbohydrates (g)
    pub carbs_g: f64,
    /// Total fat (g)
    pub fat_g: f64,
    /// Total sodium (mg)
    pub sodium_mg: f64,
    /// Total potassium (mg)
    pub potassium_mg: f64,
    /// Total phosphorus (mg)
    pub phosphorus_mg: f64,
    /// Total fluid (ml)
    pub fluid_ml: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meal_type_storage_roundtrip() {
        for meal in [
            MealType::Breakfast,
            MealType::Lunch,
            MealType::Dinner,
            MealType::Snack,
        ] {
            assert_eq!(MealType::parse(meal.as_str()), Some(meal));
        }
        assert_eq!(MealType::parse("brunch"), None);
    }
}
