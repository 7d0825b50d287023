//! Dialysis treatment session model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::RecordId;

/// One dialysis treatment session.
///
/// `duration_minutes` is derived from start/end but stored redundantly; a
/// mismatch is a data-quality concern surfaced via
/// [`DialysisSession::duration_matches_times`], not an enforced constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialysisSession {
    /// Unique identifier
    pub id: RecordId,
    /// Owning user
    pub user_id: RecordId,
    /// Treatment date
    pub date: NaiveDate,
    /// Session start time (UTC)
    pub start_time: Option<DateTime<Utc>>,
    /// Session end time (UTC)
    pub end_time: Option<DateTime<Utc>>,
    /// Stored session duration in minutes
    pub duration_minutes: Option<i64>,
    /// Weight before treatment (kg)
    pub pre_weight_kg: Option<f64>,
    /// Weight after treatment (kg)
    pub post_weight_kg: Option<f64>,
    /// Blood pressure before treatment
    pub pre_systolic: Option<i64>,
    /// Diastolic before treatment
    pub pre_diastolic: Option<i64>,
    /// Systolic after treatment
    pub post_systolic: Option<i64>,
    /// Diastolic after treatment
    pub post_diastolic: Option<i64>,
    /// Ultrafiltration goal (ml)
    pub uf_goal_ml: Option<f64>,
    /// Ultrafiltration volume actually removed (ml)
    pub uf_removed_ml: Option<f64>,
    /// Blood flow rate (ml/min)
    pub blood_flow_rate: Option<i64>,
    /// Dialysate flow rate (ml/min)
    pub dialysate_flow_rate: Option<i64>,
    /// Symptoms experienced during treatment
    pub symptoms: Vec<String>,
    /// Free-text notes
    pub notes: Option<String>,
    /// Creation timestamp (UTC)
    pub created_at: DateTime<Utc>,
    /// Last update timestamp (UTC)
    pub updated_at: DateTime<Utc>,
    /// Whether this row has been confirmed by the remote authority
    pub synced: bool,
}

impl DialysisSession {
    /// Whether the stored duration agrees with the start/end pair.
    ///
    /// Returns `true` when either side of the comparison is missing — only
    /// a present-but-contradictory triple is a quality problem.
    #[must_use]
    pub fn duration_matches_times(&self) -> bool {
        let (Some(start), Some(end), Some(duration)) =
            (self.start_time, self.end_time, self.duration_minutes)
        else {
            return true;
        };
        (end - start).num_minutes() == duration
    }
}

/// Fields supplied when recording a session
#[derive(Debug, Clone, Default)]
pub struct NewDialysisSession {
    /// Treatment date
    pub date: NaiveDate,
    /// Session start time (UTC)
    pub start_time: Option<DateTime<Utc>>,
    /// Session end time (UTC)
    pub end_time: Option<DateTime<Utc>>,
    /// Session duration in minutes; derived from start/end when absent
    pub duration_minutes: Option<i64>,
    /// Weight before treatment (kg)
    pub pre_weight_kg: Option<f64>,
    /// Weight after treatment (kg)
    pub post_weight_kg: Option<f64>,
    /// Systolic before treatment
    pub pre_systolic: Option<i64>,
    /// Diastolic before treatment
    pub pre_diastolic: Option<i64>,
    /// Systolic after treatment
    pub post_systolic: Option<i64>,
    /// Diastolic after treatment
    pub post_diastolic: Option<i64>,
    /// Ultrafiltration goal (ml)
    pub uf_goal_ml: Option<f64>,
    /// Ultrafiltration volume removed (ml)
    pub uf_removed_ml: Option<f64>,
    /// Blood flow rate (ml/min)
    pub blood_flow_rate: Option<i64>,
    /// Dialysate flow rate (ml/min)
    pub dialysate_flow_rate: Option<i64>,
    /// Symptoms experienced during treatment
    pub symptoms: Vec<String>,
    /// Free-text notes
    pub notes: Option<String>,
}

/// Partial update for a session; `None` fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct DialysisSessionUpdate {
    /// New end time
    pub end_time: Option<DateTime<Utc>>,
    /// New duration in minutes
    pub duration_minutes: Option<i64>,
    /// New post-treatment weight (kg)
    pub post_weight_kg: Option<f64>,
    /// New post-treatment systolic
    pub post_systolic: Option<i64>,
    /// New post-treatment diastolic
    pub post_diastolic: Option<i64>,
    /// New removed ultrafiltration volume (ml)
    pub uf_removed_ml: Option<f64>,
    /// New symptom list (replaces the stored list when supplied)
    pub symptoms: Option<Vec<String>>,
    /// New notes
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>, duration: Option<i64>) -> DialysisSession {
        DialysisSession {
            id: RecordId::new(),
            user_id: RecordId::new(),
            date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            start_time: start,
            end_time: end,
            duration_minutes: duration,
            pre_weight_kg: None,
            post_weight_kg: None,
            pre_systolic: None,
            pre_diastolic: None,
            post_systolic: None,
            post_diastolic: None,
            uf_goal_ml: None,
            uf_removed_ml: None,
            blood_flow_rate: None,
            dialysate_flow_rate: None,
            symptoms: Vec::new(),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            synced: false,
        }
    }

    #[test]
    fn duration_check_accepts_consistent_triple() {
        let start = Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
        assert!(session(Some(start), Some(end), Some(240)).duration_matches_times());
    }

    #[test]
    fn duration_check_flags_contradiction() {
        let start = Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
        assert!(!session(Some(start), Some(end), Some(180)).duration_matches_times());
    }

    #[test]
    fn duration_check_ignores_missing_fields() {
        assert!(session(None, None, Some(240)).duration_matches_times());
    }
}
