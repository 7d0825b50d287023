//! Data models for Renalog

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod alert;
mod dialysis;
mod food;
mod lab;
mod medication;
mod settings;
mod sharing;
mod subscription;
mod sync_entry;
mod user;
mod vital;

pub use alert::{Alert, AlertCategory, AlertSeverity, NewAlert};
pub use dialysis::{DialysisSession, DialysisSessionUpdate, NewDialysisSession};
pub use food::{DailyNutritionSummary, FoodEntry, FoodEntryUpdate, MealType, NewFoodEntry};
pub use lab::{LabReport, LabReportUpdate, NewLabReport};
pub use medication::{
    AdherenceSummary, Frequency, IntakeStatus, Medication, MedicationLog, MedicationUpdate,
    NewMedication, NewMedicationLog,
};
pub use settings::{AppSettings, VolumeUnit, WeightUnit};
pub use sharing::{SharedAccess, SharedAccessStatus, SharedPermissions};
pub use subscription::Subscription;
pub use sync_entry::{
    SyncOperation, SyncQueueEntry, SyncTable, MAX_SYNC_ATTEMPTS, SYNC_BACKOFF_BASE,
    SYNC_BACKOFF_CAP,
};
pub use user::{NewUser, User, UserRole};
pub use vital::{NewVitalRecord, VitalRecord, VitalUpdate};

/// An opaque, globally-unique record identifier.
///
/// UUID v7, so ids are time-sortable and can be generated on-device without
/// a server round-trip. Every entity in the store uses this id type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generate a new unique id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_ids_are_unique() {
        assert_ne!(RecordId::new(), RecordId::new());
    }

    #[test]
    fn record_id_roundtrips_through_string() {
        let id = RecordId::new();
        let parsed: RecordId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn record_ids_sort_by_creation_time() {
        let first = RecordId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = RecordId::new();
        assert!(first.to_string() < second.to_string());
    }
}
