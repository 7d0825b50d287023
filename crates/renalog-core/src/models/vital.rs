//! Daily vital sign observations

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::RecordId;

/// One observation set for a user on a given day.
///
/// Every measurement is optional; the UI records whatever the patient
/// measured. The schema does not enforce one row per day — readers take the
/// most recent row for a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalRecord {
    /// Unique identifier
    pub id: RecordId,
    /// Owning user
    pub user_id: RecordId,
    /// Observation date
    pub date: NaiveDate,
    /// Weight in kilograms
    pub weight_kg: Option<f64>,
    /// Systolic blood pressure (mmHg)
    pub systolic: Option<i64>,
    /// Diastolic blood pressure (mmHg)
    pub diastolic: Option<i64>,
    /// Heart rate (bpm)
    pub heart_rate: Option<i64>,
    /// Oxygen saturation (%)
    pub spo2: Option<i64>,
    /// Fluid intake (ml)
    pub fluid_intake_ml: Option<f64>,
    /// Fluid output (ml)
    pub fluid_output_ml: Option<f64>,
    /// Body temperature (°C)
    pub temperature_c: Option<f64>,
    /// Free-text notes
    pub notes: Option<String>,
    /// Creation timestamp (UTC)
    pub created_at: DateTime<Utc>,
    /// Last update timestamp (UTC)
    pub updated_at: DateTime<Utc>,
    /// Whether this row has been confirmed by the remote authority
    pub synced: bool,
}

/// Fields supplied when logging vitals
#[derive(Debug, Clone, Default)]
pub struct NewVitalRecord {
    /// Observation date
    pub date: NaiveDate,
    /// Weight in kilograms
    pub weight_kg: Option<f64>,
    /// Systolic blood pressure (mmHg)
    pub systolic: Option<i64>,
    /// Diastolic blood pressure (mmHg)
    pub diastolic: Option<i64>,
    /// Heart rate (bpm)
    pub heart_rate: Option<i64>,
    /// Oxygen saturation (%)
    pub spo2: Option<i64>,
    /// Fluid intake (ml)
    pub fluid_intake_ml: Option<f64>,
    /// Fluid output (ml)
    pub fluid_output_ml: Option<f64>,
    /// Body temperature (°C)
    pub temperature_c: Option<f64>,
    /// Free-text notes
    pub notes: Option<String>,
}

/// Partial update for a vital record.
///
/// `None` fields keep their stored value (merge semantics); a partial form
/// submission never nulls out unrelated columns.
#[derive(Debug, Clone, Default)]
pub struct VitalUpdate {
    /// New weight in kilograms
    pub weight_kg: Option<f64>,
    /// New systolic blood pressure (mmHg)
    pub systolic: Option<i64>,
    /// New diastolic blood pressure (mmHg)
    pub diastolic: Option<i64>,
    /// New heart rate (bpm)
    pub heart_rate: Option<i64>,
    /// New oxygen saturation (%)
    pub spo2: Option<i64>,
    /// New fluid intake (ml)
    pub fluid_intake_ml: Option<f64>,
    /// New fluid output (ml)
    pub fluid_output_ml: Option<f64>,
    /// New body temperature (°C)
    pub temperature_c: Option<f64>,
    /// New notes
    pub notes: Option<String>,
}
