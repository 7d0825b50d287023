//! Shared-access grants from a patient to a caregiver or doctor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RecordId, UserRole};

/// Per-domain view permissions carried by a grant.
///
/// Stored as a serialized JSON structure in the `permissions` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct SharedPermissions {
    /// May view vital records
    pub view_vitals: bool,
    /// May view lab reports
    pub view_labs: bool,
    /// May view dialysis sessions
    pub view_dialysis: bool,
    /// May view medications and intake logs
    pub view_medications: bool,
    /// May view food entries and nutrition summaries
    pub view_food: bool,
}

impl SharedPermissions {
    /// Grant every view permission
    #[must_use]
    pub const fn all() -> Self {
        Self {
            view_vitals: true,
            view_labs: true,
            view_dialysis: true,
            view_medications: true,
            view_food: true,
        }
    }
}

/// Lifecycle of a grant: `Pending -> Active -> Revoked`, revocation terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharedAccessStatus {
    /// Created, not yet accepted by the grantee
    Pending,
    /// Accepted and in effect
    Active,
    /// Withdrawn by the patient; cannot be re-activated
    Revoked,
}

impl SharedAccessStatus {
    /// Storage form of the status
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Revoked => "revoked",
        }
    }

    /// Parse the storage form back into a status
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }
}

/// A capability grant from a patient to a caregiver/doctor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedAccess {
    /// Unique identifier
    pub id: RecordId,
    /// Granting patient
    pub patient_id: RecordId,
    /// Email of the person receiving access
    pub grantee_email: String,
    /// Role of the person receiving access
    pub grantee_role: UserRole,
    /// Per-domain view permissions
    pub permissions: SharedPermissions,
    /// Grant lifecycle state
    pub status: SharedAccessStatus,
    /// Creation timestamp (UTC)
    pub created_at: DateTime<Utc>,
    /// Last update timestamp (UTC)
    pub updated_at: DateTime<Utc>,
    /// Whether this row has been confirmed by the remote authority
    pub synced: bool,
}
