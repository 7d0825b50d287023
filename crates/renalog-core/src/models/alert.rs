//! User-facing alert model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RecordId;

/// What an alert is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCategory {
    /// A lab value crossed a threshold
    Lab,
    /// A vital sign crossed a threshold
    Vital,
    /// A medication event (missed dose, refill due)
    Medication,
    /// Fluid intake over limit
    Fluid,
    /// Upcoming appointment
    Appointment,
}

impl AlertCategory {
    /// Storage form of the category
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lab => "lab",
            Self::Vital => "vital",
            Self::Medication => "medication",
            Self::Fluid => "fluid",
            Self::Appointment => "appointment",
        }
    }

    /// Parse the storage form back into a category
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "lab" => Some(Self::Lab),
            "vital" => Some(Self::Vital),
            "medication" => Some(Self::Medication),
            "fluid" => Some(Self::Fluid),
            "appointment" => Some(Self::Appointment),
            _ => None,
        }
    }
}

/// How urgent an alert is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Informational
    Info,
    /// Needs attention soon
    Warning,
    /// Needs attention now
    Critical,
}

impl AlertSeverity {
    /// Storage form of the severity
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    /// Parse the storage form back into a severity
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// A notice surfaced to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique identifier
    pub id: RecordId,
    /// Owning user
    pub user_id: RecordId,
    /// What the alert is about
    pub category: AlertCategory,
    /// How urgent it is
    pub severity: AlertSeverity,
    /// Short headline
    pub title: String,
    /// Longer body text
    pub body: Option<String>,
    /// Whether the user has seen it
    pub read: bool,
    /// Creation timestamp (UTC)
    pub created_at: DateTime<Utc>,
    /// Last update timestamp (UTC)
    pub updated_at: DateTime<Utc>,
    /// Whether this row has been confirmed by the remote authority
    pub synced: bool,
}

/// Fields supplied when raising an alert
#[derive(Debug, Clone)]
pub struct NewAlert {
    /// What the alert is about
    pub category: AlertCategory,
    /// How urgent it is
    pub severity: AlertSeverity,
    /// Short headline (required)
    pub title: String,
    /// Longer body text
    pub body: Option<String>,
}
