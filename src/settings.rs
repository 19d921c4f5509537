//! TOML settings for the simulator: menu service, gesture and face tunables.
//!
//! Every field has a default, so an empty file (or none at all) is valid.

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::gesture::{
    GestureConfig, GESTURE_COUNT_RESET_TIME_MS, GESTURE_SLOP_TIME_MS, GESTURE_THRESHOLD, OVERLAY_DURATION_MS,
};
use crate::menu::{FetchPolicy, MAX_DAYS};
use crate::style::{
    Configuration, SettingChange, SettingValue, COLOR_STYLE_SETTING, DRAW_HOUR_PIPS_STYLE_SETTING,
    WATCH_HAND_LENGTH_STYLE_SETTING,
};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub menu: MenuSettings,
    pub gesture: GestureSettings,
    pub face: FaceSettings,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(raw)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuSettings {
    /// JSON menu document read by the file source
    pub locator: PathBuf,
    /// Durable store; no store when absent
    pub store_path: Option<PathBuf>,
    pub schedule_hours: Vec<u32>,
    pub days_to_fetch: usize,
    pub retry_cooldown_secs: u64,
    pub max_attempts: Option<u32>,
}

impl Default for MenuSettings {
    fn default() -> Self {
        let (days_to_fetch, schedule_hours) = if cfg!(feature = "minimal") {
            (1, vec![8])
        } else {
            (MAX_DAYS, vec![0, 8])
        };
        Self {
            locator: PathBuf::from("menus.json"),
            store_path: None,
            schedule_hours,
            days_to_fetch,
            retry_cooldown_secs: 3600,
            max_attempts: None,
        }
    }
}

impl MenuSettings {
    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            days: self.days_to_fetch,
            cooldown: Duration::from_secs(self.retry_cooldown_secs),
            max_attempts: self.max_attempts.and_then(NonZeroU32::new),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureSettings {
    pub threshold: f32,
    pub debounce_ms: u64,
    pub reset_ms: u64,
    pub overlay_ms: u64,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            threshold: GESTURE_THRESHOLD,
            debounce_ms: GESTURE_SLOP_TIME_MS,
            reset_ms: GESTURE_COUNT_RESET_TIME_MS,
            overlay_ms: OVERLAY_DURATION_MS,
        }
    }
}

impl From<&GestureSettings> for GestureConfig {
    fn from(s: &GestureSettings) -> Self {
        GestureConfig {
            threshold: s.threshold,
            debounce_ms: s.debounce_ms,
            reset_ms: s.reset_ms,
            overlay_ms: s.overlay_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceSettings {
    /// Two institution lines above the center
    pub labels: Vec<String>,
    /// Square surface edge in pixels
    pub width: u32,
    pub frame_period_ms: u64,
    pub color_style: String,
    pub draw_hour_pips: bool,
    pub hand_length: f64,
}

impl Default for FaceSettings {
    fn default() -> Self {
        let defaults = Configuration::default();
        Self {
            labels: vec!["Campus".to_string(), "Dining Hall".to_string()],
            width: 454,
            frame_period_ms: 16,
            color_style: defaults.active_color_style.id().to_string(),
            draw_hour_pips: defaults.draw_hour_pips,
            hand_length: f64::from(defaults.minute_hand.length_fraction),
        }
    }
}

impl FaceSettings {
    pub fn frame_period(&self) -> Duration {
        Duration::from_millis(self.frame_period_ms.max(1))
    }

    // Initial style batch, as a host settings screen would publish it
    pub fn style_batch(&self) -> Vec<SettingChange> {
        vec![
            (COLOR_STYLE_SETTING.to_string(), SettingValue::Text(self.color_style.clone())),
            (DRAW_HOUR_PIPS_STYLE_SETTING.to_string(), SettingValue::Bool(self.draw_hour_pips)),
            (WATCH_HAND_LENGTH_STYLE_SETTING.to_string(), SettingValue::Double(self.hand_length)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_takes_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.menu.retry_cooldown_secs, 3600);
        assert_eq!(settings.face.frame_period(), Duration::from_millis(16));
        assert_eq!(crate::style::ColorStyleId::from_id(&settings.face.color_style), Some(crate::style::ColorStyleId::Red));
    }

    #[cfg(not(feature = "minimal"))]
    #[test]
    fn default_schedule_is_midnight_and_eight() {
        let menu = MenuSettings::default();
        assert_eq!(menu.schedule_hours, vec![0, 8]);
        assert_eq!(menu.fetch_policy().days, 7);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let raw = r#"
            [menu]
            locator = "/srv/menus.json"
            schedule_hours = [6]
            max_attempts = 3

            [gesture]
            overlay_ms = 5000
        "#;
        let settings = Settings::from_toml_str(raw).unwrap();
        assert_eq!(settings.menu.locator, PathBuf::from("/srv/menus.json"));
        assert_eq!(settings.menu.schedule_hours, vec![6]);
        assert_eq!(settings.menu.fetch_policy().max_attempts, NonZeroU32::new(3));
        assert_eq!(settings.menu.store_path, None);

        let gesture = GestureConfig::from(&settings.gesture);
        assert_eq!(gesture.overlay_ms, 5000);
        assert_eq!(gesture.debounce_ms, 500);
        assert_eq!(settings.face, FaceSettings::default());
    }

    #[test]
    fn zero_max_attempts_means_unbounded() {
        let settings = Settings::from_toml_str("[menu]\nmax_attempts = 0\n").unwrap();
        assert_eq!(settings.menu.fetch_policy().max_attempts, None);
    }

    #[test]
    fn bad_types_are_rejected() {
        let err = Settings::from_toml_str("[face]\nwidth = \"wide\"\n").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Settings::load(Path::new("/nonexistent/mealclock.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/mealclock.toml"));
    }

    #[test]
    fn style_batch_carries_face_values() {
        let face = FaceSettings {
            color_style: "blue_style_id".into(),
            draw_hour_pips: false,
            ..FaceSettings::default()
        };
        let batch = face.style_batch();
        assert_eq!(batch[0].1, SettingValue::Text("blue_style_id".into()));
        assert_eq!(batch[1].1, SettingValue::Bool(false));
    }
}
