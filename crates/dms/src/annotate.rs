//! Frame overlay: boxes and a status label

use ab_glyph::FontArc;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use tracing::info;
use video_frame::VideoFrame;
use crate::analysis::{Decision, DecisionLabel};
use crate::config::AnnotationConfig;
use crate::region::Region;
use crate::DmsError;

pub const GREEN: [u8; 3] = [0, 255, 0];
pub const RED: [u8; 3] = [255, 0, 0];

/// Shown instead of boxes when no subject was found
pub const WARNING_TEXT: &str = "WARNING! DRIVER NOT FOUND!";

const EYE_THICKNESS: u32 = 2;
const FACE_THICKNESS: u32 = 3;

/// DejaVu Sans, used when no font is configured
const BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Outline to draw
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRect {
    pub region: Region,
    pub color: [u8; 3],
    pub thickness: u32,
}

/// Text to draw (top-left anchored)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawText {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub color: [u8; 3],
    pub scale: f32,
}

/// Draw instructions for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub rects: Vec<DrawRect>,
    pub label: DrawText,
}

/// Turns decisions into overlays
pub struct Annotator {
    label_x: i32,
    label_y: i32,
    font_scale: f32,
    font: FontArc,
}

impl Annotator {
    pub fn new(config: &AnnotationConfig) -> Result<Self, DmsError> {
        let font = match &config.font_path {
            Some(path) => {
                info!("Loading overlay font from {}", path);
                let bytes = std::fs::read(path)
                    .map_err(|e| DmsError::Config(format!("font {}: {}", path, e)))?;
                FontArc::try_from_vec(bytes)
                    .map_err(|e| DmsError::Config(format!("font {}: {}", path, e)))?
            }
            None => FontArc::try_from_slice(BUNDLED_FONT)
                .map_err(|e| DmsError::Config(format!("bundled font: {}", e)))?,
        };

        Ok(Self {
            label_x: config.label_x,
            label_y: config.label_y,
            font_scale: config.font_scale,
            font,
        })
    }

    /// Describe the overlay for a decision (no drawing)
    pub fn annotate(&self, decision: &Decision) -> Annotation {
        let color = if decision.is_drowsy() { RED } else { GREEN };
        let text = match decision.label {
            DecisionLabel::SubjectNotFound => WARNING_TEXT.to_string(),
            label => format!("Prediction = {}", label),
        };

        let rects = match (&decision.label, &decision.boxes) {
            (DecisionLabel::SubjectNotFound, _) | (_, None) => Vec::new(),
            (_, Some(boxes)) => vec![
                DrawRect { region: boxes.left_eye, color, thickness: EYE_THICKNESS },
                DrawRect { region: boxes.right_eye, color, thickness: EYE_THICKNESS },
                DrawRect { region: boxes.face, color, thickness: FACE_THICKNESS },
            ],
        };

        Annotation {
            rects,
            label: DrawText {
                text,
                x: self.label_x,
                y: self.label_y,
                color,
                scale: self.font_scale,
            },
        }
    }

    /// Rasterise an annotation onto a copy of the frame
    pub fn render(&self, frame: &VideoFrame, annotation: &Annotation) -> Result<VideoFrame, DmsError> {
        let mut canvas = frame.to_image()?;

        for rect in &annotation.rects {
            draw_outline(&mut canvas, rect);
        }

        let label = &annotation.label;
        draw_text_mut(
            &mut canvas,
            Rgb(label.color),
            label.x,
            label.y,
            label.scale,
            &self.font,
            &label.text,
        );

        Ok(VideoFrame::from_image(canvas, frame.timestamp_ns, frame.sequence))
    }

    /// Annotate and render in one step
    pub fn annotate_frame(&self, frame: &VideoFrame, decision: &Decision) -> Result<VideoFrame, DmsError> {
        self.render(frame, &self.annotate(decision))
    }
}

fn draw_outline(canvas: &mut RgbImage, rect: &DrawRect) {
    let region = rect.region.clamp_to(canvas.width(), canvas.height());
    for inset in 0..rect.thickness {
        let width = region.width().saturating_sub(2 * inset);
        let height = region.height().saturating_sub(2 * inset);
        if width == 0 || height == 0 {
            break;
        }
        let outline = Rect::at((region.xmin + inset) as i32, (region.ymin + inset) as i32)
            .of_size(width, height);
        draw_hollow_rect_mut(canvas, outline, Rgb(rect.color));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionSet;
    use crate::state::DrowsinessPhase;

    fn boxes() -> RegionSet {
        RegionSet {
            face: Region::new(20, 80, 10, 90).unwrap(),
            left_eye: Region::new(30, 45, 30, 40).unwrap(),
            right_eye: Region::new(55, 70, 30, 40).unwrap(),
        }
    }

    fn annotator() -> Annotator {
        Annotator::new(&AnnotationConfig::default()).unwrap()
    }

    fn decision(label: DecisionLabel, boxes: Option<RegionSet>) -> Decision {
        Decision {
            label,
            boxes,
            phase: DrowsinessPhase::Alert,
            ..Default::default()
        }
    }

    #[test]
    fn test_alert_is_green() {
        let annotation = annotator().annotate(&decision(DecisionLabel::Alert, Some(boxes())));
        assert_eq!(annotation.rects.len(), 3);
        assert!(annotation.rects.iter().all(|r| r.color == GREEN));
        assert_eq!(annotation.rects[2].thickness, 3);
        assert_eq!(annotation.label.text, "Prediction = Alert");
        assert_eq!((annotation.label.x, annotation.label.y), (40, 40));
    }

    #[test]
    fn test_drowsy_is_red() {
        let annotation = annotator().annotate(&decision(DecisionLabel::Drowsy, Some(boxes())));
        assert!(annotation.rects.iter().all(|r| r.color == RED));
        assert_eq!(annotation.label.color, RED);
        assert_eq!(annotation.label.text, "Prediction = Drowsy");
    }

    #[test]
    fn test_subject_not_found_has_only_text() {
        let annotation = annotator().annotate(&decision(DecisionLabel::SubjectNotFound, None));
        assert!(annotation.rects.is_empty());
        assert_eq!(annotation.label.text, WARNING_TEXT);
    }

    #[test]
    fn test_initial_decision_has_no_boxes() {
        let annotation = annotator().annotate(&Decision::default());
        assert!(annotation.rects.is_empty());
        assert_eq!(annotation.label.text, "Prediction = Alert");
    }

    #[test]
    fn test_render_draws_outline() {
        let frame = VideoFrame::filled(100, 100, [0, 0, 0]);
        let annotator = annotator();
        let out = annotator
            .annotate_frame(&frame, &decision(DecisionLabel::Drowsy, Some(boxes())))
            .unwrap();

        assert_eq!((out.width, out.height), (100, 100));
        assert_eq!(out.get_pixel(20, 10), Some(RED));
        assert_eq!(out.get_pixel(22, 12), Some(RED));
        assert_eq!(out.get_pixel(50, 80), Some([0, 0, 0]));
        // Input is untouched
        assert_eq!(frame.get_pixel(20, 10), Some([0, 0, 0]));
    }

    #[test]
    fn test_render_clips_to_frame() {
        let frame = VideoFrame::filled(50, 50, [0, 0, 0]);
        let oversized = RegionSet {
            face: Region::new(40, 200, 40, 200).unwrap(),
            left_eye: Region::new(49, 49, 0, 10).unwrap(),
            right_eye: Region::new(0, 5, 0, 5).unwrap(),
        };
        let out = annotator()
            .annotate_frame(&frame, &decision(DecisionLabel::Alert, Some(oversized)))
            .unwrap();
        assert_eq!((out.width, out.height), (50, 50));
        assert_eq!(out.get_pixel(40, 40), Some(GREEN));
    }

    #[test]
    fn test_render_draws_warning_without_boxes() {
        let frame = VideoFrame::filled(320, 120, [0, 0, 0]);
        let out = annotator()
            .annotate_frame(&frame, &decision(DecisionLabel::SubjectNotFound, None))
            .unwrap();

        assert_eq!((out.width, out.height), (320, 120));
        assert_ne!(out.data, frame.data);

        // Glyphs land right of and below the (40, 40) anchor
        let mut touched = 0;
        for y in 40..70 {
            for x in 40..300 {
                if out.get_pixel(x, y) != Some([0, 0, 0]) {
                    touched += 1;
                }
            }
        }
        assert!(touched > 0);
        assert_eq!(out.get_pixel(5, 5), Some([0, 0, 0]));
    }

    #[test]
    fn test_render_draws_prediction_label() {
        let frame = VideoFrame::filled(320, 120, [0, 0, 0]);
        let out = annotator()
            .annotate_frame(&frame, &decision(DecisionLabel::Drowsy, None))
            .unwrap();

        let red = (40..70)
            .flat_map(|y| (40..300).map(move |x| (x, y)))
            .filter_map(|(x, y)| out.get_pixel(x, y))
            .filter(|px| px[0] > 0 && px[1] == 0 && px[2] == 0)
            .count();
        assert!(red > 0);
    }

    #[test]
    fn test_missing_font_file() {
        let config = AnnotationConfig {
            font_path: Some("/nonexistent/font.ttf".into()),
            ..Default::default()
        };
        assert!(matches!(Annotator::new(&config), Err(DmsError::Config(_))));
    }
}
