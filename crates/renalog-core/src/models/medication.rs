//! Medication, intake log, and adherence models

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::RecordId;

/// How often a medication is taken
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    /// Once per day
    OnceDaily,
    /// Twice per day
    TwiceDaily,
    /// Three times per day
    ThreeTimesDaily,
    /// Every other day
    EveryOtherDay,
    /// Once per week
    Weekly,
    /// Taken as needed, no fixed schedule
    AsNeeded,
    /// Free-form schedule description
    Custom(String),
}

impl Frequency {
    /// Storage form of the frequency
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::OnceDaily => "once_daily",
            Self::TwiceDaily => "twice_daily",
            Self::ThreeTimesDaily => "three_times_daily",
            Self::EveryOtherDay => "every_other_day",
            Self::Weekly => "weekly",
            Self::AsNeeded => "as_needed",
            Self::Custom(raw) => raw,
        }
    }

    /// Parse the storage form; unknown strings become [`Frequency::Custom`]
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "once_daily" => Self::OnceDaily,
            "twice_daily" => Self::TwiceDaily,
            "three_times_daily" => Self::ThreeTimesDaily,
            "every_other_day" => Self::EveryOtherDay,
            "weekly" => Self::Weekly,
            "as_needed" => Self::AsNeeded,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// A standing prescription.
///
/// An end date soft-deactivates the medication; hard deletion cascades to
/// its intake logs. Reminder scheduling is owned by an external scheduler;
/// this record keeps the scheduler's opaque handles so that exactly this
/// medication's reminders can be cancelled on update or delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    /// Unique identifier
    pub id: RecordId,
    /// Owning user
    pub user_id: RecordId,
    /// Medication name
    pub name: String,
    /// Dose description (e.g., "10mg")
    pub dosage: String,
    /// Intake frequency
    pub frequency: Frequency,
    /// Times of day doses are due
    pub times_of_day: Vec<NaiveTime>,
    /// First day of the prescription
    pub start_date: NaiveDate,
    /// Last day of the prescription; set on soft-deactivation
    pub end_date: Option<NaiveDate>,
    /// Intake instructions (e.g., "with food")
    pub instructions: Option<String>,
    /// Whether daily reminders are wanted
    pub reminder_enabled: bool,
    /// Opaque handles returned by the reminder scheduler for this medication
    pub reminder_handles: Vec<String>,
    /// Whether the prescription is currently active
    pub active: bool,
    /// Creation timestamp (UTC)
    pub created_at: DateTime<Utc>,
    /// Last update timestamp (UTC)
    pub updated_at: DateTime<Utc>,
    /// Whether this row has been confirmed by the remote authority
    pub synced: bool,
}

/// Fields supplied when adding a medication
#[derive(Debug, Clone)]
pub struct NewMedication {
    /// Medication name (required)
    pub name: String,
    /// Dose description (required)
    pub dosage: String,
    /// Intake frequency
    pub frequency: Frequency,
    /// Times of day doses are due (at least one)
    pub times_of_day: Vec<NaiveTime>,
    /// First day of the prescription
    pub start_date: NaiveDate,
    /// Optional fixed end of the prescription
    pub end_date: Option<NaiveDate>,
    /// Intake instructions
    pub instructions: Option<String>,
    /// Whether daily reminders are wanted
    pub reminder_enabled: bool,
}

/// Partial update for a medication; `None` fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct MedicationUpdate {
    /// New dose description
    pub dosage: Option<String>,
    /// New intake frequency
    pub frequency: Option<Frequency>,
    /// New dose times (replaces the stored list when supplied)
    pub times_of_day: Option<Vec<NaiveTime>>,
    /// New instructions
    pub instructions: Option<String>,
    /// New reminder preference
    pub reminder_enabled: Option<bool>,
}

/// Outcome of one scheduled dose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntakeStatus {
    /// Dose was taken
    Taken,
    /// Dose was missed
    Missed,
    /// Dose was deliberately skipped (e.g., per doctor's instruction)
    Skipped,
}

impl IntakeStatus {
    /// Storage form of the status
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Taken => "taken",
            Self::Missed => "missed",
            Self::Skipped => "skipped",
        }
    }

    /// Parse the storage form back into a status
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "taken" => Some(Self::Taken),
            "missed" => Some(Self::Missed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

/// One intake event. Insert-only; cascade-deleted with its medication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationLog {
    /// Unique identifier
    pub id: RecordId,
    /// Medication this dose belongs to
    pub medication_id: RecordId,
    /// Owning user
    pub user_id: RecordId,
    /// Outcome of the dose
    pub status: IntakeStatus,
    /// When the dose was scheduled (UTC)
    pub scheduled_time: DateTime<Utc>,
    /// When the dose was actually taken, if it was
    pub actual_time: Option<DateTime<Utc>>,
    /// Free-text notes
    pub notes: Option<String>,
    /// Creation timestamp (UTC)
    pub created_at: DateTime<Utc>,
    /// Whether this row has been confirmed by the remote authority
    pub synced: bool,
}

/// Fields supplied when logging an intake event
#[derive(Debug, Clone)]
pub struct NewMedicationLog {
    /// Medication this dose belongs to
    pub medication_id: RecordId,
    /// Outcome of the dose
    pub status: IntakeStatus,
    /// When the dose was scheduled (UTC)
    pub scheduled_time: DateTime<Utc>,
    /// When the dose was actually taken
    pub actual_time: Option<DateTime<Utc>>,
    /// Free-text notes
    pub notes: Option<String>,
}

/// Adherence over a trailing window: `taken / total * 100`, never a
/// division error — zero doses yields a rate of zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct AdherenceSummary {
    /// Doses scheduled in the window
    pub total_doses: i64,
    /// Doses logged as taken
    pub taken_doses: i64,
    /// Doses logged as missed
    pub missed_doses: i64,
    /// Percentage of doses taken
    pub adherence_rate: f64,
}

impl AdherenceSummary {
    /// Build a summary from dose counts, guarding the zero-dose case.
    #[must_use]
    pub fn from_counts(total: i64, taken: i64, missed: i64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let adherence_rate = if total == 0 {
            0.0
        } else {
            taken as f64 / total as f64 * 100.0
        };
        Self {
            total_doses: total,
            taken_doses: taken,
            missed_doses: missed,
            adherence_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_storage_roundtrip() {
        for frequency in [
            Frequency::OnceDaily,
            Frequency::TwiceDaily,
            Frequency::ThreeTimesDaily,
            Frequency::EveryOtherDay,
            Frequency::Weekly,
            Frequency::AsNeeded,
        ] {
            assert_eq!(Frequency::parse(frequency.as_str()), frequency);
        }
    }

    #[test]
    fn unknown_frequency_becomes_custom() {
        assert_eq!(
            Frequency::parse("every full moon"),
            Frequency::Custom("every full moon".to_string())
        );
    }

    #[test]
    fn adherence_with_zero_doses_is_zero() {
        let summary = AdherenceSummary::from_counts(0, 0, 0);
        assert!((summary.adherence_rate - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn adherence_seven_of_ten_is_seventy() {
        let summary = AdherenceSummary::from_counts(10, 7, 3);
        assert!((summary.adherence_rate - 70.0).abs() < f64::EPSILON);
    }
}
