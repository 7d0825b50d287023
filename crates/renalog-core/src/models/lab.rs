//! Lab report model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::RecordId;

/// One lab draw: kidney-function and electrolyte panel values.
///
/// Append-mostly; reports are rarely touched after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabReport {
    /// Unique identifier
    pub id: RecordId,
    /// Owning user
    pub user_id: RecordId,
    /// Draw date
    pub date: NaiveDate,
    /// Serum creatinine (mg/dL)
    pub creatinine: Option<f64>,
    /// Estimated glomerular filtration rate (mL/min/1.73m²)
    pub egfr: Option<f64>,
    /// Blood urea nitrogen (mg/dL)
    pub bun: Option<f64>,
    /// Serum potassium (mEq/L)
    pub potassium: Option<f64>,
    /// Serum phosphorus (mg/dL)
    pub phosphorus: Option<f64>,
    /// Serum calcium (mg/dL)
    pub calcium: Option<f64>,
    /// Serum albumin (g/dL)
    pub albumin: Option<f64>,
    /// Hemoglobin (g/dL)
    pub hemoglobin: Option<f64>,
    /// Reference to an attached lab document (opaque to this layer)
    pub document_ref: Option<String>,
    /// Free-text notes
    pub notes: Option<String>,
    /// Creation timestamp (UTC)
    pub created_at: DateTime<Utc>,
    /// Last update timestamp (UTC)
    pub updated_at: DateTime<Utc>,
    /// Whether this row has been confirmed by the remote authority
    pub synced: bool,
}

/// Fields supplied when recording a lab draw
#[derive(Debug, Clone, Default)]
pub struct NewLabReport {
    /// Draw date
    pub date: NaiveDate,
    /// Serum creatinine (mg/dL)
    pub creatinine: Option<f64>,
    /// Estimated glomerular filtration rate
    pub egfr: Option<f64>,
    /// Blood urea nitrogen (mg/dL)
    pub bun: Option<f64>,
    /// Serum potassium (mEq/L)
    pub potassium: Option<f64>,
    /// Serum phosphorus (mg/dL)
    pub phosphorus: Option<f64>,
    /// Serum calcium (mg/dL)
    pub calcium: Option<f64>,
    /// Serum albumin (g/dL)
    pub albumin: Option<f64>,
    /// Hemoglobin (g/dL)
    pub hemoglobin: Option<f64>,
    /// Reference to an attached lab document
    pub document_ref: Option<String>,
    /// Free-text notes
    pub notes: Option<String>,
}

/// Partial update for a lab report; `None` fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct LabReportUpdate {
    /// New creatinine value
    pub creatinine: Option<f64>,
    /// New eGFR value
    pub egfr: Option<f64>,
    /// New BUN value
    pub bun: Option<f64>,
    /// New potassium value
    pub potassium: Option<f64>,
    /// New phosphorus value
    pub phosphorus: Option<f64>,
    /// New calcium value
    pub calcium: Option<f64>,
    /// New albumin value
    pub albumin: Option<f64>,
    /// New hemoglobin value
    pub hemoglobin: Option<f64>,
    /// New document reference
    pub document_ref: Option<String>,
    /// New notes
    pub notes: Option<String>,
}
