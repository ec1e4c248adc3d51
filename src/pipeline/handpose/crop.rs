use anyhow::{Result, anyhow};
use ndarray::Array4;
use rayon::prelude::*;

use crate::{
    landmark::{LandmarkSet, NUM_LANDMARKS, Point},
    types::Frame,
};

pub const INPUT_SIZE: u32 = 224;

/// Square, rotated window of the frame that is resampled into the handpose
/// model input. `angle` is in radians; zero keeps the frame upright.
#[derive(Clone, Debug, PartialEq)]
pub struct CropTransform {
    pub center: (f32, f32),
    pub side: f32,
    pub angle: f32,
    pub output_size: u32,
    pub orig_w: u32,
    pub orig_h: u32,
}

impl CropTransform {
    /// Model input pixel to frame pixel.
    pub fn project(&self, x: f32, y: f32) -> (f32, f32) {
        let half = self.output_size as f32 / 2.0;
        let scale = self.side / self.output_size as f32;
        let dx = (x - half) * scale;
        let dy = (y - half) * scale;
        let (sin, cos) = self.angle.sin_cos();
        (
            self.center.0 + dx * cos - dy * sin,
            self.center.1 + dx * sin + dy * cos,
        )
    }
}

/// Samples the rotated crop bilinearly into an NHWC `[0, 1]` tensor.
/// Pixels falling outside the frame are black.
pub fn prepare_rotated_crop(
    frame: &Frame,
    center: (f32, f32),
    side: f32,
    angle: f32,
    output_size: u32,
) -> Result<(Array4<f32>, CropTransform)> {
    let expected_len = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    if frame.rgba.len() != expected_len || expected_len == 0 {
        return Err(anyhow!(
            "frame buffer size mismatch: got {}, expected {}",
            frame.rgba.len(),
            expected_len
        ));
    }

    let transform = CropTransform {
        center,
        side,
        angle,
        output_size,
        orig_w: frame.width,
        orig_h: frame.height,
    };

    let out = output_size as usize;
    let data: Vec<f32> = (0..out * out)
        .into_par_iter()
        .flat_map_iter(|i| {
            let (x, y) = ((i % out) as f32 + 0.5, (i / out) as f32 + 0.5);
            let (sx, sy) = transform.project(x, y);
            sample_rgb(frame, sx, sy)
        })
        .collect();

    let array = Array4::<f32>::from_shape_vec((1, out, out, 3), data)
        .map_err(|err| anyhow!("failed to build rotated crop tensor: {err}"))?;

    Ok((array, transform))
}

/// Turns the model's flat `x, y, z` output (crop pixels) into a landmark set
/// normalized to the frame.
pub fn decode_landmarks(flat: &[f32], transform: &CropTransform) -> Result<LandmarkSet> {
    if flat.len() < NUM_LANDMARKS * 3 {
        return Err(anyhow!(
            "unexpected landmarks length: got {}, need {}",
            flat.len(),
            NUM_LANDMARKS * 3
        ));
    }

    let (w, h) = (transform.orig_w as f32, transform.orig_h as f32);
    let z_scale = transform.side / transform.output_size as f32 / w;
    let points: Vec<Point> = flat
        .chunks_exact(3)
        .take(NUM_LANDMARKS)
        .map(|c| {
            let (px, py) = transform.project(c[0], c[1]);
            Point::new(
                (px / w).clamp(0.0, 1.0),
                (py / h).clamp(0.0, 1.0),
                c[2] * z_scale,
            )
        })
        .collect();

    Ok(LandmarkSet::from_slice(&points)?)
}

fn sample_rgb(frame: &Frame, x: f32, y: f32) -> [f32; 3] {
    if !x.is_finite() || !y.is_finite() {
        return [0.0; 3];
    }
    // Pixel centres sit at half-integer coordinates.
    let (x, y) = (x - 0.5, y - 0.5);
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);

    let (w, h) = (frame.width as i64, frame.height as i64);
    let fetch = |cx: f32, cy: f32| -> [f32; 3] {
        let (ix, iy) = (cx as i64, cy as i64);
        if ix < 0 || iy < 0 || ix >= w || iy >= h {
            return [0.0; 3];
        }
        let idx = ((iy * w + ix) as usize) * 4;
        [
            frame.rgba[idx] as f32 / 255.0,
            frame.rgba[idx + 1] as f32 / 255.0,
            frame.rgba[idx + 2] as f32 / 255.0,
        ]
    };

    let c00 = fetch(x0, y0);
    let c10 = fetch(x0 + 1.0, y0);
    let c01 = fetch(x0, y0 + 1.0);
    let c11 = fetch(x0 + 1.0, y0 + 1.0);

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    std::array::from_fn(|c| lerp(lerp(c00[c], c10[c], fx), lerp(c01[c], c11[c], fx), fy))
}
