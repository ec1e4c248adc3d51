mod crop;
mod letterbox;
mod palm;

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

pub use crop::{CropTransform, INPUT_SIZE, decode_landmarks, prepare_rotated_crop};
pub use letterbox::{Letterbox, prepare_frame};
pub use palm::{
    HandCrop, PALM_INPUT_SIZE, PalmDetector, PalmDetectorConfig, PalmRegion, crop_from_palm,
    decode_palms, generate_anchors,
};

use super::Detector;
use crate::{
    landmark::LandmarkSet,
    model_download::{ModelKind, ensure_model_available},
    types::Frame,
};

pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

/// Two-stage MediaPipe hand tracking through ONNX Runtime: the palm detector
/// locates the most confident hand, then the handpose estimator runs on a
/// rotated crop around it. Reports at most one hand.
pub struct HandposeDetector {
    handpose: Session,
    palm_detector: PalmDetector,
    min_confidence: f32,
}

impl HandposeDetector {
    pub fn new(handpose_path: &Path, palm_path: &Path, min_confidence: f32) -> Result<Self> {
        ensure_model_available(ModelKind::HandposeEstimator, handpose_path)?;
        ensure_model_available(ModelKind::PalmDetector, palm_path)?;

        let handpose = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(handpose_path)
            .with_context(|| {
                format!("failed to load ORT session from {}", handpose_path.display())
            })?;

        let palm_detector = PalmDetector::new(
            palm_path,
            PalmDetectorConfig {
                score_threshold: min_confidence,
                ..PalmDetectorConfig::default()
            },
        )?;

        log::info!(
            "handpose ORT backend ready using {} and palm detector {}",
            handpose_path.display(),
            palm_path.display()
        );

        Ok(Self {
            handpose,
            palm_detector,
            min_confidence,
        })
    }
}

impl Detector for HandposeDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>> {
        let Some(palm) = self.palm_detector.detect_best(frame)? else {
            return Ok(None);
        };

        let crop = crop_from_palm(&palm);
        let (input, transform) =
            prepare_rotated_crop(frame, crop.center, crop.side, crop.angle, INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .handpose
            .run(ort::inputs![tensor])
            .context("failed to run ORT session")?;

        if outputs.len() < 1 {
            return Err(anyhow!("model returned no outputs"));
        }

        let hand_score = if outputs.len() > 1 {
            outputs[1]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
                .unwrap_or(0.0)
        } else {
            0.0
        };
        let confidence = (hand_score * palm.score).clamp(0.0, 1.0);
        if confidence < self.min_confidence {
            log::trace!(
                "hand confidence {confidence:.2} below {:.2}",
                self.min_confidence
            );
            return Ok(None);
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = coords.iter().copied().collect();
        let landmarks = decode_landmarks(&flattened, &transform)?;

        Ok(Some(landmarks))
    }
}
