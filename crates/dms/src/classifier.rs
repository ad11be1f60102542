//! Region classifiers (yawn, eye closure)

use crate::aggregator::RegionProbabilities;
use crate::model::{load_session, run_first_output};
use crate::region::RegionCrops;
use crate::{DmsConfig, DmsError};
use ndarray::Array4;
use ort::session::Session;
use tracing::{debug, warn};
use video_frame::VideoFrame;

/// Maps a cropped region to a probability in `[0, 1]`
pub trait RegionClassifier: Send + Sync {
    fn predict(&self, crop: &VideoFrame) -> Result<f32, DmsError>;
}

/// Binary sigmoid classifier backed by an ONNX model (NHWC, `[0, 1]` input)
pub struct OnnxClassifier {
    session: Session,
    input_size: u32,
}

impl OnnxClassifier {
    pub fn load(path: &str, what: &str, input_size: u32) -> Result<Self, DmsError> {
        Ok(Self {
            session: load_session(path, what)?,
            input_size,
        })
    }

    fn preprocess(&self, crop: &VideoFrame) -> Array4<f32> {
        let size = self.input_size as usize;
        let resized = crop.resize(self.input_size, self.input_size);
        let mut input = Array4::<f32>::zeros((1, size, size, 3));
        for (i, pixel) in resized.data.chunks_exact(3).enumerate() {
            let (y, x) = (i / size, i % size);
            for c in 0..3 {
                input[[0, y, x, c]] = pixel[c] as f32 / 255.0;
            }
        }
        input
    }
}

impl RegionClassifier for OnnxClassifier {
    fn predict(&self, crop: &VideoFrame) -> Result<f32, DmsError> {
        if crop.is_empty() {
            return Err(DmsError::InvalidInput("empty crop".into()));
        }
        let output = run_first_output(&self.session, self.preprocess(crop))?;
        output
            .first()
            .copied()
            .ok_or_else(|| DmsError::Inference("model produced no output".into()))
    }
}

/// Classifier returning a constant probability
#[derive(Debug, Clone, Copy)]
pub struct FixedClassifier(pub f32);

impl RegionClassifier for FixedClassifier {
    fn predict(&self, _crop: &VideoFrame) -> Result<f32, DmsError> {
        Ok(self.0)
    }
}

/// Runs the yawn model on the face crop and the eye model on each eye crop
pub struct ClassifierAdapter {
    yawn: Box<dyn RegionClassifier>,
    eye: Box<dyn RegionClassifier>,
}

impl ClassifierAdapter {
    pub fn new(yawn: Box<dyn RegionClassifier>, eye: Box<dyn RegionClassifier>) -> Self {
        Self { yawn, eye }
    }

    /// Load the configured models, falling back to an always-alert classifier
    pub fn from_config(config: &DmsConfig) -> Result<Self, DmsError> {
        let yawn: Box<dyn RegionClassifier> = match &config.yawn_model_path {
            Some(path) => Box::new(OnnxClassifier::load(path, "yawn", config.image_size)?),
            None => {
                warn!("No yawn model path configured. Using fixed classifier.");
                Box::new(FixedClassifier(0.0))
            }
        };
        let eye: Box<dyn RegionClassifier> = match &config.eye_model_path {
            Some(path) => Box::new(OnnxClassifier::load(path, "eye", config.image_size)?),
            None => {
                warn!("No eye model path configured. Using fixed classifier.");
                Box::new(FixedClassifier(0.0))
            }
        };
        Ok(Self::new(yawn, eye))
    }

    pub fn classify(&self, crops: &RegionCrops) -> Result<RegionProbabilities, DmsError> {
        let probs = RegionProbabilities {
            yawn: self.yawn.predict(&crops.face)?,
            left_eye: self.eye.predict(&crops.left_eye)?,
            right_eye: self.eye.predict(&crops.right_eye)?,
        };
        probs.validate()?;
        debug!(
            "Probabilities: yawn={:.3} left_eye={:.3} right_eye={:.3}",
            probs.yawn, probs.left_eye, probs.right_eye
        );
        Ok(probs)
    }
}
