//! Drowsiness state machine
//!
//! Consumes one tick per incoming frame. Only ticks whose sample counter is
//! a multiple of the sample interval carry a fresh classification; every
//! other tick replays the previous decision unchanged. A streak of positive
//! (eyes closed or yawning) sampled ticks confirms drowsiness, and entering
//! that state raises a single alert trigger.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use crate::aggregator::FrameState;
use crate::analysis::{Decision, DecisionLabel};
use crate::region::RegionSet;
use crate::DmsConfig;

/// Drowsiness phase derived from the positive streak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DrowsinessPhase {
    #[default]
    Alert,
    /// Streak in `[1, threshold - 1]`
    SuspectedDrowsy,
    /// Streak at or above the threshold
    ConfirmedDrowsy,
}

/// Input for a sampled tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Classified { state: FrameState, regions: RegionSet },
    /// Extraction found no face or eyes
    NoSubject,
}

/// Per-stream drowsiness state (one per video session, never shared)
#[derive(Debug, Clone)]
pub struct DrowsinessSession {
    sample_interval: u64,
    streak_threshold: u32,

    /// Frames seen so far
    sample_counter: u64,

    /// Consecutive positive sampled ticks
    positive_streak: u32,

    /// Alert trigger raised and not yet acknowledged
    armed: bool,

    phase: DrowsinessPhase,
    last_decision: Decision,
}

impl DrowsinessSession {
    pub fn new(config: &DmsConfig) -> Self {
        Self::with_params(config.sample_interval, config.drowsy_streak_threshold)
    }

    pub fn with_params(sample_interval: u64, streak_threshold: u32) -> Self {
        Self {
            sample_interval: sample_interval.max(1),
            streak_threshold: streak_threshold.max(1),
            sample_counter: 0,
            positive_streak: 0,
            armed: false,
            phase: DrowsinessPhase::Alert,
            last_decision: Decision::default(),
        }
    }

    pub fn is_sampled(&self, sample_counter: u64) -> bool {
        sample_counter % self.sample_interval == 0
    }

    pub fn sample_counter(&self) -> u64 {
        self.sample_counter
    }

    pub fn positive_streak(&self) -> u32 {
        self.positive_streak
    }

    pub fn armed(&self) -> bool {
        self.armed
    }

    pub fn phase(&self) -> DrowsinessPhase {
        self.phase
    }

    pub fn last_decision(&self) -> &Decision {
        &self.last_decision
    }

    /// Move to the next frame
    pub fn advance(&mut self) {
        self.sample_counter = self.sample_counter.wrapping_add(1);
    }

    /// Clear a pending trigger once the alert has been dispatched (or lost)
    pub fn acknowledge_alert(&mut self) {
        if self.armed {
            debug!("Alert trigger acknowledged");
        }
        self.armed = false;
    }

    /// Evaluate one frame.
    ///
    /// `observation` must be present only on sampled ticks; anything else
    /// holds the previous decision without touching the streak.
    pub fn tick(&mut self, sample_counter: u64, observation: Option<Observation>) -> Decision {
        if !self.is_sampled(sample_counter) {
            if observation.is_some() {
                debug!("Ignoring observation on unsampled tick {}", sample_counter);
            }
            return self.last_decision.clone();
        }
        let Some(observation) = observation else {
            return self.last_decision.clone();
        };

        // The trigger was already emitted once; never re-emit it.
        if self.armed {
            warn!("Unacknowledged alert trigger dropped at tick {}", sample_counter);
            self.armed = false;
        }

        let decision = match observation {
            Observation::NoSubject => {
                debug!("Tick {}: subject not found, streak held at {}", sample_counter, self.positive_streak);
                Decision {
                    label: DecisionLabel::SubjectNotFound,
                    boxes: None,
                    should_trigger_alert: false,
                    frame_state: None,
                    phase: self.phase,
                    positive_streak: self.positive_streak,
                    evaluated_at: Some(sample_counter),
                }
            }
            Observation::Classified { state, regions } => {
                let trigger = self.apply(state);
                debug!(
                    "Tick {}: {} -> {:?} (streak {})",
                    sample_counter, state, self.phase, self.positive_streak
                );
                Decision {
                    label: if self.phase == DrowsinessPhase::ConfirmedDrowsy {
                        DecisionLabel::Drowsy
                    } else {
                        DecisionLabel::Alert
                    },
                    boxes: Some(regions),
                    should_trigger_alert: trigger,
                    frame_state: Some(state),
                    phase: self.phase,
                    positive_streak: self.positive_streak,
                    evaluated_at: Some(sample_counter),
                }
            }
        };

        self.last_decision = decision.without_trigger();
        decision
    }

    /// Update streak and phase; returns true on entry into confirmed drowsiness
    fn apply(&mut self, state: FrameState) -> bool {
        if !state.is_positive() {
            self.positive_streak = 0;
            self.phase = DrowsinessPhase::Alert;
            return false;
        }

        self.positive_streak = self.positive_streak.saturating_add(1);
        if self.positive_streak < self.streak_threshold {
            self.phase = DrowsinessPhase::SuspectedDrowsy;
            return false;
        }

        let entered = self.phase != DrowsinessPhase::ConfirmedDrowsy;
        self.phase = DrowsinessPhase::ConfirmedDrowsy;
        if entered {
            info!("Drowsiness confirmed after {} positive samples", self.positive_streak);
            self.armed = true;
        }
        entered
    }

    /// Reset to a fresh session
    pub fn reset(&mut self) {
        *self = Self::with_params(self.sample_interval, self.streak_threshold);
    }
}
