//! Per-user application settings

use serde::{Deserialize, Serialize};

/// Weight display unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    /// Kilograms
    #[default]
    Kg,
    /// Pounds
    Lb,
}

/// Fluid volume display unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VolumeUnit {
    /// Milliliters
    #[default]
    Ml,
    /// Fluid ounces
    Oz,
}

/// Per-user settings, one row per user, stored as a serialized structure.
///
/// Device-local preferences; not replicated through the sync queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Weight display unit
    pub weight_unit: WeightUnit,
    /// Fluid volume display unit
    pub volume_unit: VolumeUnit,
    /// Daily fluid limit in ml, when the care team has set one
    pub daily_fluid_limit_ml: Option<f64>,
    /// Whether medication reminders default to on for new medications
    pub reminders_default_enabled: bool,
    /// Hour of day (0-23) for the daily log prompt
    pub daily_prompt_hour: u8,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            weight_unit: WeightUnit::Kg,
            volume_unit: VolumeUnit::Ml,
            daily_fluid_limit_ml: None,
            reminders_default_enabled: true,
            daily_prompt_hour: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_metric() {
        let settings = AppSettings::default();
        assert_eq!(settings.weight_unit, WeightUnit::Kg);
        assert_eq!(settings.volume_unit, VolumeUnit::Ml);
        assert!(settings.reminders_default_enabled);
    }

    #[test]
    fn unknown_fields_fall_back_to_defaults() {
        let settings: AppSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, AppSettings::default());
    }
}
