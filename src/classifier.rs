use std::fmt;

use crate::landmark::{Finger, FrameSize, LandmarkSet, Point};

pub const DEFAULT_ANGLE_THRESHOLD_DEG: f32 = 160.0;
pub const DEFAULT_DISTANCE_THRESHOLD_PX: f32 = 20.0;

/// Axis the thumb tip is compared on by the coordinate heuristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Range the angle heuristic reports its reading in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AngleRange {
    /// `[0, 360)`, signed sweep from the base segment to the tip segment.
    Full,
    /// `[0, 180]`, the full value reflected about 180.
    Folded,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Strategy {
    /// Tip compared against the middle joint. Fingers are bent when the tip
    /// sits lower in the image than the PIP joint; the thumb is bent when
    /// its tip is on the smaller side of the IP joint on `thumb_axis`.
    /// Equal coordinates count as straight.
    Coordinate { thumb_axis: Axis },
    /// Bent when the interior angle at the middle joint is below
    /// `threshold_deg`.
    Angle {
        threshold_deg: f32,
        range: AngleRange,
    },
    /// Closed when the knuckle-to-tip pixel distance is below
    /// `threshold_px`.
    Distance { threshold_px: f32 },
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Coordinate {
            thumb_axis: Axis::X,
        }
    }
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Coordinate { .. } => "coordinate",
            Strategy::Angle { .. } => "angle",
            Strategy::Distance { .. } => "distance",
        }
    }
}

/// The scalar a heuristic derived for one finger.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Reading {
    /// Tip minus reference coordinate on the compared axis.
    Offset(f32),
    Degrees(f32),
    Pixels(f32),
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Offset(v) => write!(f, "{v:+.3}"),
            Reading::Degrees(v) => write!(f, "{} deg", *v as i32),
            Reading::Pixels(v) => write!(f, "{v:.0} px"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FingerStates {
    pub bent: [bool; 5],
    pub readings: [Reading; 5],
}

impl FingerStates {
    pub fn is_bent(&self, finger: Finger) -> bool {
        self.bent[finger as usize]
    }

    pub fn reading(&self, finger: Finger) -> Reading {
        self.readings[finger as usize]
    }

    pub fn bent_count(&self) -> usize {
        self.bent.iter().filter(|b| **b).count()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FingerClassifier {
    strategy: Strategy,
}

impl FingerClassifier {
    pub fn new(strategy: Strategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn classify(&self, landmarks: &LandmarkSet, size: FrameSize) -> FingerStates {
        let mut bent = [false; 5];
        let mut readings = [Reading::Offset(0.0); 5];

        for finger in Finger::ALL {
            let (is_bent, reading) = match self.strategy {
                Strategy::Coordinate { thumb_axis } => {
                    classify_by_coordinate(landmarks, finger, thumb_axis)
                }
                Strategy::Angle {
                    threshold_deg,
                    range,
                } => classify_by_angle(landmarks, finger, threshold_deg, range),
                Strategy::Distance { threshold_px } => {
                    classify_by_distance(landmarks, finger, size, threshold_px)
                }
            };
            bent[finger as usize] = is_bent;
            readings[finger as usize] = reading;
        }

        FingerStates { bent, readings }
    }
}

fn classify_by_coordinate(
    landmarks: &LandmarkSet,
    finger: Finger,
    thumb_axis: Axis,
) -> (bool, Reading) {
    let tip = landmarks.get(finger.tip());
    let reference = landmarks.get(finger.middle_joint());

    match finger {
        Finger::Thumb => {
            let offset = match thumb_axis {
                Axis::X => tip.x - reference.x,
                Axis::Y => tip.y - reference.y,
            };
            (offset < 0.0, Reading::Offset(offset))
        }
        _ => {
            let offset = tip.y - reference.y;
            (offset > 0.0, Reading::Offset(offset))
        }
    }
}

fn classify_by_angle(
    landmarks: &LandmarkSet,
    finger: Finger,
    threshold_deg: f32,
    range: AngleRange,
) -> (bool, Reading) {
    let base = landmarks.get(finger.knuckle());
    let vertex = landmarks.get(finger.middle_joint());
    let tip = landmarks.get(finger.tip());

    let full = joint_angle(base, vertex, tip);
    let interior = fold_angle(full);
    let reported = match range {
        AngleRange::Full => full,
        AngleRange::Folded => interior,
    };

    (interior < threshold_deg, Reading::Degrees(reported))
}

fn classify_by_distance(
    landmarks: &LandmarkSet,
    finger: Finger,
    size: FrameSize,
    threshold_px: f32,
) -> (bool, Reading) {
    let knuckle = landmarks.to_pixel(finger.knuckle(), size);
    let tip = landmarks.to_pixel(finger.tip(), size);
    let dist = pixel_distance(knuckle, tip);
    (dist < threshold_px, Reading::Pixels(dist))
}

/// Angle at `vertex` swept from the `vertex -> base` segment to the
/// `vertex -> tip` segment, in degrees within `[0, 360)`.
///
/// Collinear points give 180. A zero-length segment has no direction and is
/// reported as straight.
pub fn joint_angle(base: Point, vertex: Point, tip: Point) -> f32 {
    let (bx, by) = (base.x - vertex.x, base.y - vertex.y);
    let (tx, ty) = (tip.x - vertex.x, tip.y - vertex.y);
    if bx.hypot(by) < 1e-9 || tx.hypot(ty) < 1e-9 {
        return 180.0;
    }

    let deg = (ty.atan2(tx) - by.atan2(bx)).to_degrees();
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Reflects a `[0, 360)` angle into `[0, 180]`.
pub fn fold_angle(angle: f32) -> f32 {
    if angle > 180.0 { 360.0 - angle } else { angle }
}

fn pixel_distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    (a.0 - b.0).hypot(a.1 - b.1)
}
