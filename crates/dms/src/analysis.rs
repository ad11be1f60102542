//! Per-frame decisions emitted by the drowsiness state machine

use serde::{Deserialize, Serialize};
use std::fmt;
use crate::aggregator::FrameState;
use crate::region::RegionSet;
use crate::state::DrowsinessPhase;

/// Label shown on the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DecisionLabel {
    #[default]
    Alert,
    Drowsy,
    /// Face or eyes could not be located on the last sampled tick
    SubjectNotFound,
}

impl fmt::Display for DecisionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DecisionLabel::Alert => "Alert",
            DecisionLabel::Drowsy => "Drowsy",
            DecisionLabel::SubjectNotFound => "Subject not found",
        })
    }
}

/// Debounced decision for one frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Decision {
    pub label: DecisionLabel,

    /// Boxes to draw (absent when the subject was not found)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boxes: Option<RegionSet>,

    /// Set on the single decision that enters confirmed drowsiness
    pub should_trigger_alert: bool,

    /// Classification behind this decision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_state: Option<FrameState>,

    pub phase: DrowsinessPhase,
    pub positive_streak: u32,

    /// Sample counter of the tick that produced this decision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluated_at: Option<u64>,
}

impl Decision {
    pub fn is_drowsy(&self) -> bool {
        self.label == DecisionLabel::Drowsy
    }

    /// Copy with the trigger edge cleared, as replayed on held ticks
    pub fn without_trigger(&self) -> Decision {
        Decision {
            should_trigger_alert: false,
            ..self.clone()
        }
    }
}
