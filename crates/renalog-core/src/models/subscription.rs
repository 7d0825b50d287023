//! Subscription state model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RecordId;

/// A user's subscription: plan, status, and purchase platform.
///
/// One row per user; shallow scope, shares the persistence pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Owning user (primary key)
    pub user_id: RecordId,
    /// Plan identifier (e.g., "free", "premium")
    pub plan: String,
    /// Status (e.g., "active", "expired", "cancelled")
    pub status: String,
    /// Store the purchase was made through
    pub platform: Option<String>,
    /// When the current period ends
    pub expires_at: Option<DateTime<Utc>>,
    /// Creation timestamp (UTC)
    pub created_at: DateTime<Utc>,
    /// Last update timestamp (UTC)
    pub updated_at: DateTime<Utc>,
    /// Whether this row has been confirmed by the remote authority
    pub synced: bool,
}
