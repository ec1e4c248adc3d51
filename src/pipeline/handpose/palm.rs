use std::{cmp::Ordering, f32::consts::PI, path::Path};

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::letterbox::{Letterbox, prepare_frame};
use crate::types::Frame;

pub const PALM_INPUT_SIZE: u32 = 192;
const PALM_KEYPOINTS: usize = 7;
const FEATURES: usize = 4 + PALM_KEYPOINTS * 2;
const ANCHOR_STRIDES: [u32; 4] = [8, 16, 16, 16];

// Palm keypoints used to orient the hand crop.
const KEYPOINT_WRIST: usize = 0;
const KEYPOINT_MIDDLE_MCP: usize = 2;

// Hand crop relative to the palm box.
const CROP_SCALE: f32 = 2.6;
const CROP_SHIFT_Y: f32 = -0.5;

#[derive(Clone, Debug)]
pub struct PalmDetectorConfig {
    pub score_threshold: f32,
    pub nms_threshold: f32,
}

impl Default for PalmDetectorConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            nms_threshold: 0.3,
        }
    }
}

/// Palm box and keypoints in frame pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct PalmRegion {
    pub bbox: [f32; 4],
    pub keypoints: [(f32, f32); PALM_KEYPOINTS],
    pub score: f32,
}

/// Where to cut the hand out of the frame for the landmark model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandCrop {
    pub center: (f32, f32),
    pub side: f32,
    pub angle: f32,
}

pub struct PalmDetector {
    session: Session,
    anchors: Vec<[f32; 2]>,
    cfg: PalmDetectorConfig,
}

impl PalmDetector {
    pub fn new(model_path: &Path, cfg: PalmDetectorConfig) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| {
                format!("failed to load palm detector from {}", model_path.display())
            })?;

        Ok(Self {
            session,
            anchors: generate_anchors(PALM_INPUT_SIZE),
            cfg,
        })
    }

    /// Highest scoring palm in the frame, if any clears the threshold.
    pub fn detect_best(&mut self, frame: &Frame) -> Result<Option<PalmRegion>> {
        let (input, letterbox) = prepare_frame(frame, PALM_INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run palm detector session")?;

        if outputs.len() < 2 {
            return Err(anyhow!(
                "palm detector returned {} outputs, expected at least 2",
                outputs.len()
            ));
        }

        let boxes = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let boxes: Vec<f32> = boxes.iter().copied().collect();
        let scores: Vec<f32> = scores.iter().copied().collect();

        let regions = decode_palms(&boxes, &scores, &self.anchors, &letterbox, &self.cfg)?;
        log::trace!("{} palm candidates after suppression", regions.len());
        Ok(regions.into_iter().next())
    }
}

/// SSD anchor centres for the MediaPipe palm model: two anchors per grid
/// cell, layers sharing a stride are emitted together.
pub fn generate_anchors(input_size: u32) -> Vec<[f32; 2]> {
    let mut anchors = Vec::new();
    let mut layer = 0;
    while layer < ANCHOR_STRIDES.len() {
        let stride = ANCHOR_STRIDES[layer];
        let mut per_cell = 0;
        while layer < ANCHOR_STRIDES.len() && ANCHOR_STRIDES[layer] == stride {
            per_cell += 2;
            layer += 1;
        }

        let grid = input_size.div_ceil(stride);
        for y in 0..grid {
            for x in 0..grid {
                let center = [
                    (x as f32 + 0.5) / grid as f32,
                    (y as f32 + 0.5) / grid as f32,
                ];
                anchors.extend(std::iter::repeat_n(center, per_cell));
            }
        }
    }
    anchors
}

/// Decodes raw `[anchors, 18]` boxes and `[anchors, 1]` logits into palm
/// regions sorted by score, overlapping boxes removed.
pub fn decode_palms(
    boxes: &[f32],
    scores: &[f32],
    anchors: &[[f32; 2]],
    letterbox: &Letterbox,
    cfg: &PalmDetectorConfig,
) -> Result<Vec<PalmRegion>> {
    if boxes.len() < anchors.len() * FEATURES || scores.len() < anchors.len() {
        return Err(anyhow!(
            "palm outputs too small: {} box values and {} scores for {} anchors",
            boxes.len(),
            scores.len(),
            anchors.len()
        ));
    }

    let input = PALM_INPUT_SIZE as f32;
    let (max_w, max_h) = (
        letterbox.orig_w.saturating_sub(1) as f32,
        letterbox.orig_h.saturating_sub(1) as f32,
    );

    let mut candidates = Vec::new();
    for (idx, anchor) in anchors.iter().enumerate() {
        let score = sigmoid(scores[idx]);
        if score < cfg.score_threshold {
            continue;
        }

        let raw = &boxes[idx * FEATURES..(idx + 1) * FEATURES];
        let cx = raw[0] / input + anchor[0];
        let cy = raw[1] / input + anchor[1];
        let (hw, hh) = (raw[2] / input / 2.0, raw[3] / input / 2.0);

        let (x1, y1) = letterbox.to_frame(cx - hw, cy - hh);
        let (x2, y2) = letterbox.to_frame(cx + hw, cy + hh);
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        let keypoints = std::array::from_fn(|k| {
            let u = raw[4 + k * 2] / input + anchor[0];
            let v = raw[5 + k * 2] / input + anchor[1];
            letterbox.to_frame(u, v)
        });

        candidates.push(PalmRegion {
            bbox: [
                x1.clamp(0.0, max_w),
                y1.clamp(0.0, max_h),
                x2.clamp(0.0, max_w),
                y2.clamp(0.0, max_h),
            ],
            keypoints,
            score,
        });
    }

    Ok(nms(candidates, cfg.nms_threshold))
}

/// Square crop around the whole hand, rotated so the fingers point up in
/// the model input.
pub fn crop_from_palm(region: &PalmRegion) -> HandCrop {
    let (wx, wy) = region.keypoints[KEYPOINT_WRIST];
    let (mx, my) = region.keypoints[KEYPOINT_MIDDLE_MCP];
    let angle = normalize_radians(PI / 2.0 - (-(my - wy)).atan2(mx - wx));

    let width = region.bbox[2] - region.bbox[0];
    let height = region.bbox[3] - region.bbox[1];
    let (bx, by) = (
        (region.bbox[0] + region.bbox[2]) * 0.5,
        (region.bbox[1] + region.bbox[3]) * 0.5,
    );

    // Move from the palm towards the fingers along the hand axis.
    let shift = CROP_SHIFT_Y * height;
    let (sin, cos) = angle.sin_cos();
    let center = (bx - shift * sin, by + shift * cos);

    HandCrop {
        center,
        side: width.max(height) * CROP_SCALE,
        angle,
    }
}

fn normalize_radians(angle: f32) -> f32 {
    angle - 2.0 * PI * ((angle + PI) / (2.0 * PI)).floor()
}

fn nms(mut candidates: Vec<PalmRegion>, threshold: f32) -> Vec<PalmRegion> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut keep: Vec<PalmRegion> = Vec::new();
    for candidate in candidates {
        if keep.iter().all(|k| iou(&candidate.bbox, &k.bbox) < threshold) {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    if inter <= 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;
    use approx::assert_abs_diff_eq;

    fn region(bbox: [f32; 4], wrist: (f32, f32), middle: (f32, f32), score: f32) -> PalmRegion {
        let mut keypoints = [(0.0, 0.0); PALM_KEYPOINTS];
        keypoints[KEYPOINT_WRIST] = wrist;
        keypoints[KEYPOINT_MIDDLE_MCP] = middle;
        PalmRegion {
            bbox,
            keypoints,
            score,
        }
    }

    #[test]
    fn anchor_layout_matches_palm_model() {
        let anchors = generate_anchors(PALM_INPUT_SIZE);
        assert_eq!(anchors.len(), 2016);
        // Stride 8: 24x24 cells, two anchors each.
        assert_eq!(anchors[0], [0.5 / 24.0, 0.5 / 24.0]);
        assert_eq!(anchors[1], anchors[0]);
        // Stride 16 layers start after 1152 anchors, six per cell.
        assert_eq!(anchors[1152], [0.5 / 12.0, 0.5 / 12.0]);
        assert_eq!(anchors[1157], anchors[1152]);
        assert_eq!(anchors[1158], [1.5 / 12.0, 0.5 / 12.0]);
    }

    #[test]
    fn decodes_single_confident_anchor_into_frame_pixels() {
        let anchors = vec![[0.25, 0.5], [0.75, 0.5]];
        let mut boxes = vec![0.0; anchors.len() * FEATURES];
        // Second anchor: 48x48 box on the input, wrist 24 px below centre.
        boxes[FEATURES + 2] = 48.0;
        boxes[FEATURES + 3] = 48.0;
        boxes[FEATURES + 5] = 24.0;
        let scores = [-10.0, 10.0];
        // Square frame: input fractions map straight onto 384 px.
        let letterbox = Letterbox::for_frame(384, 384, PALM_INPUT_SIZE);

        let palms = decode_palms(
            &boxes,
            &scores,
            &anchors,
            &letterbox,
            &PalmDetectorConfig::default(),
        )
        .unwrap();

        assert_eq!(palms.len(), 1);
        let palm = &palms[0];
        assert_abs_diff_eq!(palm.bbox[0], 240.0, epsilon = 1e-3);
        assert_abs_diff_eq!(palm.bbox[1], 144.0, epsilon = 1e-3);
        assert_abs_diff_eq!(palm.bbox[2], 336.0, epsilon = 1e-3);
        assert_abs_diff_eq!(palm.bbox[3], 240.0, epsilon = 1e-3);
        assert_abs_diff_eq!(palm.keypoints[KEYPOINT_WRIST].1, 240.0, epsilon = 1e-3);
        assert!(palm.score > 0.99);
    }

    #[test]
    fn rejects_truncated_outputs() {
        let letterbox = Letterbox::for_frame(384, 384, PALM_INPUT_SIZE);
        let anchors = generate_anchors(PALM_INPUT_SIZE);
        let result = decode_palms(
            &[0.0; 10],
            &[0.0; 10],
            &anchors,
            &letterbox,
            &PalmDetectorConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn overlapping_palms_keep_the_best() {
        let weaker = region([0.0, 0.0, 100.0, 100.0], (0.0, 0.0), (0.0, 0.0), 0.6);
        let stronger = region([5.0, 5.0, 105.0, 105.0], (0.0, 0.0), (0.0, 0.0), 0.9);
        let apart = region([300.0, 300.0, 350.0, 350.0], (0.0, 0.0), (0.0, 0.0), 0.7);

        let kept = nms(vec![weaker, stronger.clone(), apart.clone()], 0.3);
        assert_eq!(kept, vec![stronger, apart]);
    }

    #[test]
    fn upright_palm_crop_is_unrotated_and_reaches_fingers() {
        let palm = region([100.0, 200.0, 200.0, 300.0], (150.0, 300.0), (150.0, 210.0), 0.9);
        let crop = crop_from_palm(&palm);
        assert_abs_diff_eq!(crop.angle, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(crop.side, 260.0, epsilon = 1e-3);
        // Centre moves up by half the palm height.
        assert_abs_diff_eq!(crop.center.0, 150.0, epsilon = 1e-3);
        assert_abs_diff_eq!(crop.center.1, 200.0, epsilon = 1e-3);
    }

    #[test]
    fn sideways_palm_crop_is_quarter_turn() {
        // Fingers point to the right of the frame.
        let palm = region([100.0, 200.0, 200.0, 300.0], (100.0, 250.0), (190.0, 250.0), 0.9);
        let crop = crop_from_palm(&palm);
        assert_abs_diff_eq!(crop.angle, FRAC_PI_2, epsilon = 1e-5);
        assert_abs_diff_eq!(crop.center.0, 200.0, epsilon = 1e-3);
        assert_abs_diff_eq!(crop.center.1, 250.0, epsilon = 1e-3);
    }
}
