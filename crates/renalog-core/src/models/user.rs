//! User account model

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::RecordId;

/// Role a user plays in the care relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Dialysis/kidney-care patient tracking their own data
    #[default]
    Patient,
    /// Family member or caregiver with shared access
    Caregiver,
    /// Treating physician with shared access
    Doctor,
}

impl UserRole {
    /// Storage form of the role
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Caregiver => "caregiver",
            Self::Doctor => "doctor",
        }
    }

    /// Parse the storage form back into a role
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "patient" => Some(Self::Patient),
            "caregiver" => Some(Self::Caregiver),
            "doctor" => Some(Self::Doctor),
            _ => None,
        }
    }
}

/// A user account.
///
/// Authentication is either a local password hash or an external identity
/// provider's stable subject id, never both. The hash is excluded from
/// serialization so it never rides along in sync payloads.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: RecordId,
    /// Email, stored lower-cased; unique per account
    pub email: String,
    /// Role in the care relationship
    pub role: UserRole,
    /// Salted one-way password digest (`None` for provider accounts)
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    /// External identity provider name (`None` for password accounts)
    pub auth_provider: Option<String>,
    /// Provider's stable subject identifier
    pub provider_subject: Option<String>,
    /// Display name
    pub full_name: Option<String>,
    /// Date of birth
    pub date_of_birth: Option<NaiveDate>,
    /// Free-text dialysis modality note (e.g., "in-center HD, MWF")
    pub dialysis_modality: Option<String>,
    /// Creation timestamp (UTC)
    pub created_at: DateTime<Utc>,
    /// Last update timestamp (UTC)
    pub updated_at: DateTime<Utc>,
    /// Whether this row has been confirmed by the remote authority
    pub synced: bool,
}

impl User {
    /// Whether this account authenticates with a local password
    #[must_use]
    pub const fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

impl fmt::Debug for User {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "[REDACTED]"))
            .field("auth_provider", &self.auth_provider)
            .field("provider_subject", &self.provider_subject)
            .field("full_name", &self.full_name)
            .field("synced", &self.synced)
            .finish_non_exhaustive()
    }
}

/// Profile fields supplied at signup
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    /// Email address (normalized to lower case before storage)
    pub email: String,
    /// Role in the care relationship
    pub role: UserRole,
    /// Display name
    pub full_name: Option<String>,
    /// Date of birth
    pub date_of_birth: Option<NaiveDate>,
    /// Free-text dialysis modality note
    pub dialysis_modality: Option<String>,
}
