//! The persisted settings document, versioned JSON with camelCase keys.

use chrono::{DateTime, Utc};
use roiview_core::{Rect, Result, RoiModel, RoiViewError};
use roiview_effects::{EffectConfig, EffectKind};
use serde::{Deserialize, Serialize};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoiSettings {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub is_defined: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectSettings {
    pub kind: EffectKind,
    pub binary_threshold: f64,
    pub blur_strength: f64,
    pub sharpen_strength: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentSettings {
    pub brightness: f64,
    pub contrast: f64,
    pub target_fps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorDetectionSettings {
    pub hue_lower: f64,
    pub hue_upper: f64,
    pub saturation_lower: f64,
    pub saturation_upper: f64,
    pub value_lower: f64,
    pub value_upper: f64,
}

/// Everything the user can tune, as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub roi: RoiSettings,
    pub effect: EffectSettings,
    pub adjustment: AdjustmentSettings,
    pub color_detection: ColorDetectionSettings,
    pub saved_at: DateTime<Utc>,
    pub version: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self::capture(&RoiModel::default(), &EffectConfig::default())
    }
}

impl AppSettings {
    /// Snapshot the live state into a document, stamped now.
    pub fn capture(roi: &RoiModel, config: &EffectConfig) -> Self {
        let hsv = config.hsv();
        Self {
            roi: RoiSettings {
                x: roi.x,
                y: roi.y,
                width: roi.width,
                height: roi.height,
                is_defined: roi.is_defined(),
            },
            effect: EffectSettings {
                kind: config.kind(),
                binary_threshold: config.binary_threshold(),
                blur_strength: config.blur_strength(),
                sharpen_strength: config.sharpen_strength(),
            },
            adjustment: AdjustmentSettings {
                brightness: config.brightness(),
                contrast: config.contrast(),
                target_fps: config.target_fps(),
            },
            color_detection: ColorDetectionSettings {
                hue_lower: hsv.hue_lower,
                hue_upper: hsv.hue_upper,
                saturation_lower: hsv.saturation_lower,
                saturation_upper: hsv.saturation_upper,
                value_lower: hsv.value_lower,
                value_upper: hsv.value_upper,
            },
            saved_at: Utc::now(),
            version: CURRENT_VERSION,
        }
    }

    /// Push the document back into the live state. Every numeric value
    /// goes through the clamping setters, so an edited or stale file
    /// cannot introduce out-of-range parameters.
    pub fn apply_to(&self, roi: &mut RoiModel, config: &mut EffectConfig) {
        if self.roi.is_defined {
            roi.set_rect(Rect::new(
                self.roi.x,
                self.roi.y,
                self.roi.width,
                self.roi.height,
            ));
        } else {
            roi.reset();
        }

        config.set_kind(self.effect.kind);
        config.set_binary_threshold(self.effect.binary_threshold);
        config.set_blur_strength(self.effect.blur_strength);
        config.set_sharpen_strength(self.effect.sharpen_strength);
        config.set_brightness(self.adjustment.brightness);
        config.set_contrast(self.adjustment.contrast);
        config.set_target_fps(self.adjustment.target_fps);
        config.set_hue_lower(self.color_detection.hue_lower);
        config.set_hue_upper(self.color_detection.hue_upper);
        config.set_saturation_lower(self.color_detection.saturation_lower);
        config.set_saturation_upper(self.color_detection.saturation_upper);
        config.set_value_lower(self.color_detection.value_lower);
        config.set_value_upper(self.color_detection.value_upper);
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| RoiViewError::Settings(format!("failed to serialize settings: {e}")))
    }

    /// Parse a document, rejecting files written by a newer schema.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| RoiViewError::Settings(format!("invalid settings JSON: {e}")))?;

        let version = raw.get("version").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
        if version > CURRENT_VERSION {
            return Err(RoiViewError::Settings(format!(
                "settings version {version} is newer than supported version {CURRENT_VERSION}"
            )));
        }

        serde_json::from_value(raw)
            .map_err(|e| RoiViewError::Settings(format!("failed to parse settings: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_modulo_saved_at() {
        let mut roi = RoiModel::default();
        roi.set_rect(Rect::new(10.0, 20.0, 100.0, 80.0));
        let mut config = EffectConfig::default();
        config.set_kind(EffectKind::GaussianBlur);
        config.set_blur_strength(21.0);
        config.set_brightness(-30.0);

        let doc = AppSettings::capture(&roi, &config);
        let json = doc.to_json().unwrap();
        let loaded = AppSettings::from_json(&json).unwrap();

        let mut roi2 = RoiModel::default();
        let mut config2 = EffectConfig::default();
        loaded.apply_to(&mut roi2, &mut config2);

        assert_eq!(roi2, roi);
        assert_eq!(config2, config);
    }

    #[test]
    fn test_keys_are_camel_case() {
        let json = AppSettings::default().to_json().unwrap();
        let text = String::from_utf8(json).unwrap();
        assert!(text.contains("\"colorDetection\""));
        assert!(text.contains("\"binaryThreshold\""));
        assert!(text.contains("\"savedAt\""));
        assert!(text.contains("\"isDefined\""));
        assert!(!text.contains("\"binary_threshold\""));
    }

    #[test]
    fn test_future_version_rejected() {
        let mut value = serde_json::to_value(AppSettings::default()).unwrap();
        value["version"] = serde_json::json!(99);
        let data = serde_json::to_vec(&value).unwrap();
        let err = AppSettings::from_json(&data).unwrap_err();
        assert!(matches!(err, RoiViewError::Settings(_)));
    }

    #[test]
    fn test_load_clamps_out_of_range_values() {
        let mut doc = AppSettings::default();
        doc.adjustment.brightness = 500.0;
        doc.color_detection.hue_lower = -10.0;
        doc.effect.blur_strength = 2.0;

        let mut roi = RoiModel::default();
        let mut config = EffectConfig::default();
        doc.apply_to(&mut roi, &mut config);

        assert_eq!(config.brightness(), 100.0);
        assert_eq!(config.hsv().hue_lower, 0.0);
        assert!(config.blur_kernel_size() >= 3);
        assert_eq!(config.blur_kernel_size() % 2, 1);
    }

    #[test]
    fn test_undefined_roi_resets_on_apply() {
        let doc = AppSettings::default();
        let mut roi = RoiModel::default();
        roi.set_rect(Rect::new(5.0, 5.0, 50.0, 50.0));
        let mut config = EffectConfig::default();
        doc.apply_to(&mut roi, &mut config);
        assert!(!roi.is_defined());
    }
}
