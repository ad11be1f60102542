//! DMS configuration

use serde::{Deserialize, Serialize};
use crate::DmsError;

/// DMS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Run a fresh classification every N frames
    pub sample_interval: u64,

    /// Consecutive positive sampled ticks before drowsiness is confirmed
    pub drowsy_streak_threshold: u32,

    /// Per-region probability threshold (exclusive)
    pub classification_threshold: f32,

    /// Side length of the square classifier input
    pub image_size: u32,

    /// Side length of the square face detector input
    pub face_input_size: u32,

    /// Face detection confidence threshold
    pub face_confidence: f32,

    /// Retry classification on the next frame after a missed subject
    pub resample_after_miss: bool,

    /// Model paths
    pub face_model_path: Option<String>,
    pub yawn_model_path: Option<String>,
    pub eye_model_path: Option<String>,

    /// Overlay settings
    pub annotation: AnnotationConfig,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            sample_interval: 10,
            drowsy_streak_threshold: 5,
            classification_threshold: 0.5,
            image_size: 145,
            face_input_size: 128,
            face_confidence: 0.7,
            resample_after_miss: false,
            face_model_path: None,
            yawn_model_path: None,
            eye_model_path: None,
            annotation: AnnotationConfig::default(),
        }
    }
}

impl DmsConfig {
    /// Create strict config (confirms drowsiness sooner)
    pub fn strict() -> Self {
        Self {
            sample_interval: 5,
            drowsy_streak_threshold: 3,
            ..Default::default()
        }
    }

    /// Create lenient config (needs a longer streak)
    pub fn lenient() -> Self {
        Self {
            sample_interval: 15,
            drowsy_streak_threshold: 8,
            ..Default::default()
        }
    }

    /// Reject settings the state machine cannot run with
    pub fn validate(&self) -> Result<(), DmsError> {
        if self.sample_interval == 0 {
            return Err(DmsError::Config("sample_interval must be at least 1".into()));
        }
        if self.drowsy_streak_threshold == 0 {
            return Err(DmsError::Config(
                "drowsy_streak_threshold must be at least 1".into(),
            ));
        }
        if !(self.classification_threshold > 0.0 && self.classification_threshold < 1.0) {
            return Err(DmsError::Config(format!(
                "classification_threshold {} outside (0, 1)",
                self.classification_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.face_confidence) {
            return Err(DmsError::Config(format!(
                "face_confidence {} outside [0, 1]",
                self.face_confidence
            )));
        }
        if self.image_size == 0 || self.face_input_size == 0 {
            return Err(DmsError::Config("model input sizes must be non-zero".into()));
        }
        Ok(())
    }
}

/// Overlay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// Label anchor (pixels from the left edge)
    pub label_x: i32,
    /// Label anchor (pixels from the top edge)
    pub label_y: i32,
    /// TrueType/OpenType font for the label; the bundled DejaVu Sans when unset
    pub font_path: Option<String>,
    /// Label height in pixels
    pub font_scale: f32,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            label_x: 40,
            label_y: 40,
            font_path: None,
            font_scale: 24.0,
        }
    }
}
