//! Combines per-region probabilities into a frame state

use serde::{Deserialize, Serialize};
use std::fmt;
use crate::DmsError;

/// Classifier output for one sampled frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionProbabilities {
    pub yawn: f32,
    pub left_eye: f32,
    pub right_eye: f32,
}

impl RegionProbabilities {
    pub fn new(yawn: f32, left_eye: f32, right_eye: f32) -> Result<Self, DmsError> {
        let probs = Self { yawn, left_eye, right_eye };
        probs.validate()?;
        Ok(probs)
    }

    /// Every probability must be finite and inside `[0, 1]`
    pub fn validate(&self) -> Result<(), DmsError> {
        for (name, value) in [
            ("yawn", self.yawn),
            ("left_eye", self.left_eye),
            ("right_eye", self.right_eye),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(DmsError::InvalidInput(format!(
                    "{} probability {} outside [0, 1]",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Coarse category of a frame state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameStateKind {
    Alert,
    EyesClosed,
    Yawning,
    EyesClosedAndYawning,
}

/// Thresholded classification of one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FrameState {
    pub yawning: bool,
    pub left_eye_closed: bool,
    pub right_eye_closed: bool,
}

impl FrameState {
    pub const ALERT: FrameState = FrameState {
        yawning: false,
        left_eye_closed: false,
        right_eye_closed: false,
    };

    pub const EYES_CLOSED: FrameState = FrameState {
        yawning: false,
        left_eye_closed: true,
        right_eye_closed: true,
    };

    pub const YAWNING: FrameState = FrameState {
        yawning: true,
        left_eye_closed: false,
        right_eye_closed: false,
    };

    /// Either eye counts
    pub fn eyes_closed(&self) -> bool {
        self.left_eye_closed || self.right_eye_closed
    }

    /// Closed eyes and yawning are each sufficient on their own
    pub fn is_positive(&self) -> bool {
        self.eyes_closed() || self.yawning
    }

    pub fn kind(&self) -> FrameStateKind {
        match (self.eyes_closed(), self.yawning) {
            (false, false) => FrameStateKind::Alert,
            (true, false) => FrameStateKind::EyesClosed,
            (false, true) => FrameStateKind::Yawning,
            (true, true) => FrameStateKind::EyesClosedAndYawning,
        }
    }
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self.kind() {
            FrameStateKind::Alert => "alert",
            FrameStateKind::EyesClosed => "eyes closed",
            FrameStateKind::Yawning => "yawning",
            FrameStateKind::EyesClosedAndYawning => "eyes closed, yawning",
        };
        f.write_str(text)
    }
}

/// Fixed-threshold aggregator
#[derive(Debug, Clone, Copy)]
pub struct PredictionAggregator {
    threshold: f32,
}

impl Default for PredictionAggregator {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl PredictionAggregator {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Threshold each region independently; a probability equal to the threshold is negative
    pub fn classify(&self, probs: RegionProbabilities) -> Result<FrameState, DmsError> {
        probs.validate()?;
        Ok(FrameState {
            yawning: probs.yawn > self.threshold,
            left_eye_closed: probs.left_eye > self.threshold,
            right_eye_closed: probs.right_eye > self.threshold,
        })
    }
}
