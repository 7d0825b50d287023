//! Sync queue entry model

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RecordId;

/// Retry attempts after which an entry counts as failed and is skipped
/// until the user asks for a retry.
pub const MAX_SYNC_ATTEMPTS: i64 = 8;

/// Base delay for exponential backoff between replay attempts.
pub const SYNC_BACKOFF_BASE: Duration = Duration::from_secs(30);

/// Longest backoff delay between replay attempts.
pub const SYNC_BACKOFF_CAP: Duration = Duration::from_secs(60 * 60);

/// The closed set of tables replicated through the sync queue.
///
/// Table names reach SQL only through this enum, never as raw strings.
/// `app_settings` is deliberately absent: settings are device-local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTable {
    /// User accounts
    Users,
    /// Daily vital observations
    Vitals,
    /// Lab reports
    LabReports,
    /// Dialysis sessions
    DialysisSessions,
    /// Food log entries
    FoodEntries,
    /// Medications
    Medications,
    /// Medication intake logs
    MedicationLogs,
    /// Alerts
    Alerts,
    /// Shared-access grants
    SharedAccess,
    /// Subscriptions
    Subscriptions,
}

impl SyncTable {
    /// The SQL table name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Vitals => "vitals",
            Self::LabReports => "lab_reports",
            Self::DialysisSessions => "dialysis_sessions",
            Self::FoodEntries => "food_entries",
            Self::Medications => "medications",
            Self::MedicationLogs => "medication_logs",
            Self::Alerts => "alerts",
            Self::SharedAccess => "shared_access",
            Self::Subscriptions => "subscriptions",
        }
    }

    /// Parse a stored table name back into the enum
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "users" => Some(Self::Users),
            "vitals" => Some(Self::Vitals),
            "lab_reports" => Some(Self::LabReports),
            "dialysis_sessions" => Some(Self::DialysisSessions),
            "food_entries" => Some(Self::FoodEntries),
            "medications" => Some(Self::Medications),
            "medication_logs" => Some(Self::MedicationLogs),
            "alerts" => Some(Self::Alerts),
            "shared_access" => Some(Self::SharedAccess),
            "subscriptions" => Some(Self::Subscriptions),
            _ => None,
        }
    }
}

/// Which local mutation a queue entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperation {
    /// Row was created locally
    Insert,
    /// Row was modified locally
    Update,
    /// Row was deleted locally (payload is just the id)
    Delete,
}

impl SyncOperation {
    /// Storage form of the operation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Parse the storage form back into an operation
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// One pending local mutation awaiting confirmation by the remote.
///
/// Replay order is creation order (oldest first), which preserves causal
/// ordering of edits to the same record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncQueueEntry {
    /// Unique identifier of the queue entry itself
    pub id: RecordId,
    /// Table the mutated row lives in
    pub table: SyncTable,
    /// Id of the mutated row
    pub record_id: String,
    /// Which mutation happened
    pub operation: SyncOperation,
    /// Serialized row for insert/update; `None` for delete
    pub payload: Option<String>,
    /// Replay attempts so far
    pub attempts: i64,
    /// When the last replay attempt happened
    pub last_attempt: Option<DateTime<Utc>>,
    /// Error message from the last failed attempt
    pub last_error: Option<String>,
    /// When the mutation happened locally
    pub created_at: DateTime<Utc>,
}

impl SyncQueueEntry {
    /// Whether this entry has hit the attempt cap
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.attempts >= MAX_SYNC_ATTEMPTS
    }

    /// Backoff delay before the next replay attempt, exponential in the
    /// attempt count and capped at [`SYNC_BACKOFF_CAP`].
    #[must_use]
    pub fn backoff(&self) -> Duration {
        let shift = u32::try_from(self.attempts).unwrap_or(u32::MAX).min(16);
        SYNC_BACKOFF_BASE
            .saturating_mul(2u32.saturating_pow(shift))
            .min(SYNC_BACKOFF_CAP)
    }

    /// Whether this entry may be replayed at `now`: not failed, and past
    /// the backoff window since the last attempt.
    #[must_use]
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        if self.is_failed() {
            return false;
        }
        match self.last_attempt {
            None => true,
            Some(last) => {
                let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
                elapsed >= self.backoff()
            }
        }
    }
}
