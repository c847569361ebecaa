//! Effect selection and range-clamped parameters.

use serde::{Deserialize, Serialize};

/// The fixed set of pixel effects. Dispatch is a closed match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EffectKind {
    #[default]
    None,
    Binary,
    Grayscale,
    GaussianBlur,
    Sharpen,
    ColorDetection,
}

/// Inclusive HSV detection bounds, OpenCV convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HsvBounds {
    pub hue_lower: f64,
    pub hue_upper: f64,
    pub saturation_lower: f64,
    pub saturation_upper: f64,
    pub value_lower: f64,
    pub value_upper: f64,
}

impl Default for HsvBounds {
    fn default() -> Self {
        Self {
            hue_lower: 0.0,
            hue_upper: 179.0,
            saturation_lower: 50.0,
            saturation_upper: 255.0,
            value_lower: 50.0,
            value_upper: 255.0,
        }
    }
}

/// Named effect parameter, used by the command surface to push single
/// value updates into the running loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectParam {
    BinaryThreshold(f64),
    BlurStrength(f64),
    SharpenStrength(f64),
    Brightness(f64),
    Contrast(f64),
    HueLower(f64),
    HueUpper(f64),
    SaturationLower(f64),
    SaturationUpper(f64),
    ValueLower(f64),
    ValueUpper(f64),
    TargetFps(u32),
}

/// Current effect kind plus its numeric parameters.
///
/// Every setter clamps independently, so any value accepted from a UI
/// slider or a loaded settings file ends up in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectConfig {
    kind: EffectKind,
    binary_threshold: f64,
    blur_strength: f64,
    sharpen_strength: f64,
    brightness: f64,
    contrast: f64,
    hsv: HsvBounds,
    target_fps: u32,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            kind: EffectKind::None,
            binary_threshold: 128.0,
            blur_strength: 15.0,
            sharpen_strength: 3.0,
            brightness: 0.0,
            contrast: 1.0,
            hsv: HsvBounds::default(),
            target_fps: 30,
        }
    }
}

impl EffectConfig {
    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: EffectKind) {
        self.kind = kind;
    }

    pub fn binary_threshold(&self) -> f64 {
        self.binary_threshold
    }

    pub fn set_binary_threshold(&mut self, value: f64) {
        self.binary_threshold = value.clamp(0.0, 255.0);
    }

    pub fn blur_strength(&self) -> f64 {
        self.blur_strength
    }

    pub fn set_blur_strength(&mut self, value: f64) {
        self.blur_strength = value.clamp(3.0, 31.0);
    }

    /// Gaussian kernel size derived from the blur strength, forced odd.
    pub fn blur_kernel_size(&self) -> usize {
        (self.blur_strength as usize / 2) * 2 + 1
    }

    pub fn sharpen_strength(&self) -> f64 {
        self.sharpen_strength
    }

    pub fn set_sharpen_strength(&mut self, value: f64) {
        self.sharpen_strength = value.clamp(0.0, 5.0);
    }

    pub fn brightness(&self) -> f64 {
        self.brightness
    }

    pub fn set_brightness(&mut self, value: f64) {
        self.brightness = value.clamp(-100.0, 100.0);
    }

    pub fn contrast(&self) -> f64 {
        self.contrast
    }

    pub fn set_contrast(&mut self, value: f64) {
        self.contrast = value.clamp(0.0, 2.0);
    }

    pub fn reset_brightness_contrast(&mut self) {
        self.brightness = 0.0;
        self.contrast = 1.0;
    }

    pub fn hsv(&self) -> HsvBounds {
        self.hsv
    }

    pub fn set_hue_lower(&mut self, value: f64) {
        self.hsv.hue_lower = value.clamp(0.0, 179.0);
    }

    pub fn set_hue_upper(&mut self, value: f64) {
        self.hsv.hue_upper = value.clamp(0.0, 179.0);
    }

    pub fn set_saturation_lower(&mut self, value: f64) {
        self.hsv.saturation_lower = value.clamp(0.0, 255.0);
    }

    pub fn set_saturation_upper(&mut self, value: f64) {
        self.hsv.saturation_upper = value.clamp(0.0, 255.0);
    }

    pub fn set_value_lower(&mut self, value: f64) {
        self.hsv.value_lower = value.clamp(0.0, 255.0);
    }

    pub fn set_value_upper(&mut self, value: f64) {
        self.hsv.value_upper = value.clamp(0.0, 255.0);
    }

    pub fn target_fps(&self) -> u32 {
        self.target_fps
    }

    pub fn set_target_fps(&mut self, value: u32) {
        self.target_fps = value.clamp(1, 60);
    }

    /// Apply a single named parameter update.
    pub fn set_param(&mut self, param: EffectParam) {
        match param {
            EffectParam::BinaryThreshold(v) => self.set_binary_threshold(v),
            EffectParam::BlurStrength(v) => self.set_blur_strength(v),
            EffectParam::SharpenStrength(v) => self.set_sharpen_strength(v),
            EffectParam::Brightness(v) => self.set_brightness(v),
            EffectParam::Contrast(v) => self.set_contrast(v),
            EffectParam::HueLower(v) => self.set_hue_lower(v),
            EffectParam::HueUpper(v) => self.set_hue_upper(v),
            EffectParam::SaturationLower(v) => self.set_saturation_lower(v),
            EffectParam::SaturationUpper(v) => self.set_saturation_upper(v),
            EffectParam::ValueLower(v) => self.set_value_lower(v),
            EffectParam::ValueUpper(v) => self.set_value_upper(v),
            EffectParam::TargetFps(v) => self.set_target_fps(v),
        }
    }
}
