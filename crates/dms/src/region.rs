//! Face and eye region extraction

use crate::model::{load_session, run_first_output};
use crate::{DmsConfig, DmsError};
use ndarray::Array4;
use ort::session::Session;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use video_frame::VideoFrame;

/// Rectangle in frame pixel coordinates (max edges exclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub xmin: u32,
    pub xmax: u32,
    pub ymin: u32,
    pub ymax: u32,
}

impl Region {
    pub fn new(xmin: u32, xmax: u32, ymin: u32, ymax: u32) -> Result<Self, DmsError> {
        if xmin > xmax || ymin > ymax {
            return Err(DmsError::InvalidInput(format!(
                "region x[{}, {}] y[{}, {}] is inverted",
                xmin, xmax, ymin, ymax
            )));
        }
        Ok(Self { xmin, xmax, ymin, ymax })
    }

    /// Build a region from normalised `[0, 1]` corner coordinates
    pub fn from_normalized(
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        width: u32,
        height: u32,
    ) -> Result<Self, DmsError> {
        if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            return Err(DmsError::InvalidInput("non-finite region coordinate".into()));
        }
        let px = |v: f32, extent: u32| (v.clamp(0.0, 1.0) * extent as f32).round() as u32;
        Self::new(px(x1, width), px(x2, width), px(y1, height), px(y2, height))
    }

    pub fn width(&self) -> u32 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> u32 {
        self.ymax - self.ymin
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Clip the region to a `width` x `height` frame
    pub fn clamp_to(&self, width: u32, height: u32) -> Region {
        Region {
            xmin: self.xmin.min(width),
            xmax: self.xmax.min(width),
            ymin: self.ymin.min(height),
            ymax: self.ymax.min(height),
        }
    }

    /// Sub-rectangle given as fractions of this region's width and height
    pub fn fraction(&self, fx0: f32, fx1: f32, fy0: f32, fy1: f32) -> Region {
        let w = self.width() as f32;
        let h = self.height() as f32;
        let at = |origin: u32, extent: f32, f: f32| origin + (extent * f.clamp(0.0, 1.0)).round() as u32;
        let (xa, xb) = (at(self.xmin, w, fx0), at(self.xmin, w, fx1));
        let (ya, yb) = (at(self.ymin, h, fy0), at(self.ymin, h, fy1));
        Region {
            xmin: xa.min(xb),
            xmax: xa.max(xb),
            ymin: ya.min(yb),
            ymax: ya.max(yb),
        }
    }

    /// Cut this region out of a frame; `None` for an empty or out-of-bounds region
    pub fn crop(&self, frame: &VideoFrame) -> Option<VideoFrame> {
        if self.is_empty() {
            return None;
        }
        frame.crop(self.xmin, self.ymin, self.width(), self.height())
    }
}

/// Face and eye boxes from one extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionSet {
    pub face: Region,
    pub left_eye: Region,
    pub right_eye: Region,
}

/// Cropped sub-images ready for classification
#[derive(Debug, Clone)]
pub struct RegionCrops {
    pub regions: RegionSet,
    pub face: VideoFrame,
    pub left_eye: VideoFrame,
    pub right_eye: VideoFrame,
}

impl RegionCrops {
    /// Derive eye regions from a face box and crop all three
    pub fn from_face(frame: &VideoFrame, face: Region) -> Result<Self, DmsError> {
        let face = face.clamp_to(frame.width, frame.height);
        let regions = RegionSet {
            face,
            left_eye: face.fraction(0.15, 0.45, 0.25, 0.50),
            right_eye: face.fraction(0.55, 0.85, 0.25, 0.50),
        };

        let crop = |region: &Region| region.crop(frame).ok_or(DmsError::NoSubjectFound);
        Ok(Self {
            face: crop(&regions.face)?,
            left_eye: crop(&regions.left_eye)?,
            right_eye: crop(&regions.right_eye)?,
            regions,
        })
    }
}

/// Locates the face and eyes in a frame
pub trait RegionExtractor: Send + Sync {
    fn extract(&self, frame: &VideoFrame) -> Result<RegionCrops, DmsError>;
}

/// Face detector backed by an ONNX model emitting `(x1, y1, x2, y2, score)` rows
pub struct FaceModelExtractor {
    session: Session,
    input_size: u32,
    confidence_threshold: f32,
}

impl FaceModelExtractor {
    pub fn load(path: &str, config: &DmsConfig) -> Result<Self, DmsError> {
        Ok(Self {
            session: load_session(path, "face detection")?,
            input_size: config.face_input_size,
            confidence_threshold: config.face_confidence,
        })
    }

    fn preprocess(&self, frame: &VideoFrame) -> Array4<f32> {
        let size = self.input_size;
        let resized = frame.resize(size, size);
        let mut input = Array4::<f32>::zeros((1, 3, size as usize, size as usize));
        for (i, pixel) in resized.data.chunks_exact(3).enumerate() {
            let (y, x) = (i / size as usize, i % size as usize);
            for c in 0..3 {
                input[[0, c, y, x]] = pixel[c] as f32 / 127.5 - 1.0;
            }
        }
        input
    }
}

impl RegionExtractor for FaceModelExtractor {
    fn extract(&self, frame: &VideoFrame) -> Result<RegionCrops, DmsError> {
        if frame.is_empty() {
            return Err(DmsError::NoSubjectFound);
        }
        let raw = run_first_output(&self.session, self.preprocess(frame))?;
        let [x1, y1, x2, y2, score] =
            best_detection(&raw, self.confidence_threshold).ok_or(DmsError::NoSubjectFound)?;
        debug!("Face detected with score {:.3}", score);

        let face = Region::from_normalized(x1, y1, x2, y2, frame.width, frame.height)?;
        RegionCrops::from_face(frame, face)
    }
}

/// Pick the highest-scoring `(x1, y1, x2, y2, score)` row at or above `min_score`
pub fn best_detection(raw: &[f32], min_score: f32) -> Option<[f32; 5]> {
    raw.chunks_exact(5)
        .filter(|row| row.iter().all(|v| v.is_finite()) && row[4] >= min_score)
        .max_by(|a, b| a[4].total_cmp(&b[4]))
        .map(|row| [row[0], row[1], row[2], row[3], row[4]])
}

/// Model-free extractor assuming a centred, camera-facing subject
#[derive(Debug, Clone, Default)]
pub struct CenteredFaceExtractor;

impl CenteredFaceExtractor {
    pub fn new() -> Self {
        warn!("No face model path configured. Assuming a centred subject.");
        Self
    }
}

impl RegionExtractor for CenteredFaceExtractor {
    fn extract(&self, frame: &VideoFrame) -> Result<RegionCrops, DmsError> {
        if frame.is_empty() {
            return Err(DmsError::NoSubjectFound);
        }
        let face = Region::from_normalized(0.3, 0.2, 0.7, 0.7, frame.width, frame.height)?;
        RegionCrops::from_face(frame, face)
    }
}

/// Build the configured extractor
pub fn extractor_from_config(config: &DmsConfig) -> Result<Box<dyn RegionExtractor>, DmsError> {
    match &config.face_model_path {
        Some(path) => Ok(Box::new(FaceModelExtractor::load(path, config)?)),
        None => Ok(Box::new(CenteredFaceExtractor::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_rejects_inverted() {
        assert!(matches!(Region::new(10, 5, 0, 1), Err(DmsError::InvalidInput(_))));
        assert!(Region::new(5, 5, 1, 1).unwrap().is_empty());
    }

    #[test]
    fn test_empty_region_does_not_crop() {
        let frame = VideoFrame::filled(20, 20, [0, 0, 0]);
        assert!(Region::new(5, 5, 0, 10).unwrap().crop(&frame).is_none());
        assert!(matches!(
            RegionCrops::from_face(&frame, Region::new(30, 40, 30, 40).unwrap()),
            Err(DmsError::NoSubjectFound)
        ));
    }

    #[test]
    fn test_from_normalized_scales() {
        let r = Region::from_normalized(0.25, 0.5, 0.75, 1.0, 200, 100).unwrap();
        assert_eq!(r, Region { xmin: 50, xmax: 150, ymin: 50, ymax: 100 });
        assert!(Region::from_normalized(f32::NAN, 0.0, 1.0, 1.0, 10, 10).is_err());
    }

    #[test]
    fn test_fraction_stays_inside() {
        let face = Region::new(100, 200, 50, 150).unwrap();
        let eye = face.fraction(0.15, 0.45, 0.25, 0.5);
        assert_eq!(eye, Region { xmin: 115, xmax: 145, ymin: 75, ymax: 100 });
    }

    #[test]
    fn test_clamp_to_frame() {
        let r = Region::new(600, 700, 400, 500).unwrap().clamp_to(640, 480);
        assert_eq!(r, Region { xmin: 600, xmax: 640, ymin: 400, ymax: 480 });
    }

    #[test]
    fn test_centered_extractor_crops_all_regions() {
        let frame = VideoFrame::filled(640, 480, [90, 90, 90]);
        let crops = CenteredFaceExtractor.extract(&frame).unwrap();
        assert_eq!(crops.face.width, crops.regions.face.width());
        assert_eq!(crops.left_eye.height, crops.regions.left_eye.height());
        assert!(crops.regions.left_eye.xmax <= crops.regions.right_eye.xmin);
    }

    #[test]
    fn test_tiny_frame_has_no_subject() {
        let frame = VideoFrame::filled(2, 2, [0, 0, 0]);
        assert!(matches!(
            CenteredFaceExtractor.extract(&frame),
            Err(DmsError::NoSubjectFound)
        ));
    }

    #[test]
    fn test_best_detection() {
        let raw = [
            0.1, 0.1, 0.5, 0.5, 0.6, //
            0.2, 0.2, 0.6, 0.6, 0.9, //
            0.0, 0.0, 1.0, 1.0, f32::NAN,
        ];
        assert_eq!(best_detection(&raw, 0.7), Some([0.2, 0.2, 0.6, 0.6, 0.9]));
        assert_eq!(best_detection(&raw, 0.95), None);
        assert_eq!(best_detection(&[], 0.0), None);
    }
}
