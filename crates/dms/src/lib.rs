//! Driver Monitoring System (DMS)
//!
//! Streaming drowsiness detection on top of per-frame classifiers:
//! - Face and eye region extraction
//! - Yawn and eye-closure classification
//! - Fixed-threshold aggregation into a frame state
//! - Debounced, edge-triggered drowsiness decisions
//! - Frame annotation

pub mod aggregator;
pub mod analysis;
pub mod annotate;
pub mod classifier;
pub mod config;
mod model;
pub mod region;
pub mod state;

pub use aggregator::{FrameState, FrameStateKind, PredictionAggregator, RegionProbabilities};
pub use analysis::{Decision, DecisionLabel};
pub use annotate::{Annotation, Annotator};
pub use classifier::{ClassifierAdapter, FixedClassifier, OnnxClassifier, RegionClassifier};
pub use config::{AnnotationConfig, DmsConfig};
pub use region::{
    CenteredFaceExtractor, FaceModelExtractor, Region, RegionCrops, RegionExtractor, RegionSet,
};
pub use state::{DrowsinessPhase, DrowsinessSession, Observation};

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use video_frame::{FrameError, VideoFrame};

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("No subject found")]
    NoSubjectFound,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
}

impl DmsError {
    /// Transient miss that only downgrades the current tick's overlay
    pub fn is_no_subject(&self) -> bool {
        matches!(self, DmsError::NoSubjectFound)
    }
}

/// Read-only models shared by every session
#[derive(Clone)]
pub struct SharedModels {
    pub extractor: Arc<dyn RegionExtractor>,
    pub classifier: Arc<ClassifierAdapter>,
    pub annotator: Arc<Annotator>,
}

impl SharedModels {
    /// Load everything named in the configuration
    pub fn load(config: &DmsConfig) -> Result<Self, DmsError> {
        config.validate()?;
        Ok(Self {
            extractor: Arc::from(region::extractor_from_config(config)?),
            classifier: Arc::new(ClassifierAdapter::from_config(config)?),
            annotator: Arc::new(Annotator::new(&config.annotation)?),
        })
    }
}

/// Result of processing one frame
#[derive(Debug)]
pub struct FrameOutcome {
    pub decision: Decision,
    /// Annotated frame, or the input unchanged when the tick failed
    pub frame: VideoFrame,
    /// A fresh classification was attempted on this frame
    pub sampled: bool,
    /// Per-tick failure, already contained
    pub fault: Option<DmsError>,
}

/// One stream's processing path: models plus its own session state
pub struct DrowsinessPipeline {
    models: SharedModels,
    aggregator: PredictionAggregator,
    session: DrowsinessSession,
    resample_after_miss: bool,
}

impl DrowsinessPipeline {
    pub fn new(models: SharedModels, config: &DmsConfig) -> Self {
        Self {
            models,
            aggregator: PredictionAggregator::new(config.classification_threshold),
            session: DrowsinessSession::new(config),
            resample_after_miss: config.resample_after_miss,
        }
    }

    pub fn session(&self) -> &DrowsinessSession {
        &self.session
    }

    /// Clear the pending trigger after the alert was dispatched
    pub fn acknowledge_alert(&mut self) {
        self.session.acknowledge_alert();
    }

    /// Process one frame; per-tick failures never escape
    pub fn process(&mut self, frame: &VideoFrame) -> FrameOutcome {
        let counter = self.session.sample_counter();
        let sampled = self.session.is_sampled(counter);

        let mut fault = None;
        let observation = if sampled {
            match self.observe(frame) {
                Ok(observation) => Some(observation),
                Err(DmsError::NoSubjectFound) => {
                    debug!("Frame {}: no subject found", frame.sequence);
                    fault = Some(DmsError::NoSubjectFound);
                    Some(Observation::NoSubject)
                }
                Err(e) => {
                    warn!("Frame {}: classification skipped: {}", frame.sequence, e);
                    fault = Some(e);
                    None
                }
            }
        } else {
            None
        };

        let missed = fault.is_some();
        let decision = self.session.tick(counter, observation);
        if !(missed && self.resample_after_miss) {
            self.session.advance();
        }

        let skip_overlay = fault.as_ref().is_some_and(|e| !e.is_no_subject());
        let frame = if skip_overlay {
            frame.clone()
        } else {
            match self.models.annotator.annotate_frame(frame, &decision) {
                Ok(annotated) => annotated,
                Err(e) => {
                    warn!("Frame {}: annotation failed: {}", frame.sequence, e);
                    frame.clone()
                }
            }
        };

        FrameOutcome {
            decision,
            frame,
            sampled,
            fault,
        }
    }

    fn observe(&self, frame: &VideoFrame) -> Result<Observation, DmsError> {
        let crops = self.models.extractor.extract(frame)?;
        let probs = self.models.classifier.classify(&crops)?;
        let state = self.aggregator.classify(probs)?;
        Ok(Observation::Classified {
            state,
            regions: crops.regions,
        })
    }
}
