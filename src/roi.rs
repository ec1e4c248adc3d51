use crate::landmark::{FrameSize, LandmarkSet, WRIST};

pub const DEFAULT_CENTERED_FRACTION: f32 = 0.4;

/// Axis-aligned rectangle in frame pixels. A hand is only considered active
/// while its wrist lies strictly inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionOfInterest {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl RegionOfInterest {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Box covering `fraction` of each frame dimension, centered.
    pub fn centered(size: FrameSize, fraction: f32) -> Self {
        let width = (size.width as f32 * fraction) as i32;
        let height = (size.height as f32 * fraction) as i32;
        Self {
            x: (size.width as i32 - width) / 2,
            y: (size.height as i32 - height) / 2,
            width,
            height,
        }
    }

    /// Points on the border are outside.
    pub fn contains(&self, px: i32, py: i32) -> bool {
        let (px, py) = (i64::from(px), i64::from(py));
        let (x, y) = (i64::from(self.x), i64::from(self.y));
        x < px && px < x + i64::from(self.width) && y < py && py < y + i64::from(self.height)
    }
}

/// How the active region is chosen for a run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum RegionSpec {
    #[default]
    Disabled,
    Fixed(RegionOfInterest),
    /// Resolved against each frame's size.
    Centered(f32),
}

impl RegionSpec {
    pub fn resolve(&self, size: FrameSize) -> Option<RegionOfInterest> {
        match *self {
            RegionSpec::Disabled => None,
            RegionSpec::Fixed(roi) => Some(roi),
            RegionSpec::Centered(fraction) => Some(RegionOfInterest::centered(size, fraction)),
        }
    }
}

/// Passes the hand through when no region is configured or its wrist is
/// inside the region; otherwise the frame has no result.
pub fn gate<'a>(
    roi: Option<&RegionOfInterest>,
    landmarks: &'a LandmarkSet,
    size: FrameSize,
) -> Option<&'a LandmarkSet> {
    let Some(roi) = roi else {
        return Some(landmarks);
    };
    let (wx, wy) = landmarks.to_pixel(WRIST, size);
    if roi.contains(wx as i32, wy as i32) {
        Some(landmarks)
    } else {
        log::trace!("wrist at ({wx:.0}, {wy:.0}) outside region {roi:?}");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::{NUM_LANDMARKS, Point};

    fn hand_with_wrist(x: f32, y: f32) -> LandmarkSet {
        let mut pts = [Point::default(); NUM_LANDMARKS];
        pts[WRIST] = Point::xy(x, y);
        LandmarkSet::new(pts)
    }

    #[test]
    fn centered_box_matches_frame_fraction() {
        let roi = RegionOfInterest::centered(FrameSize::new(640, 480), 0.4);
        assert_eq!(roi, RegionOfInterest::new(192, 144, 256, 192));
    }

    #[test]
    fn boundary_is_outside() {
        let roi = RegionOfInterest::new(10, 20, 100, 50);
        assert!(!roi.contains(10, 40));
        assert!(!roi.contains(110, 40));
        assert!(!roi.contains(50, 20));
        assert!(!roi.contains(50, 70));
        assert!(roi.contains(11, 21));
        assert!(roi.contains(109, 69));
    }

    #[test]
    fn region_at_coordinate_limit_does_not_overflow() {
        let roi = RegionOfInterest::new(i32::MAX - 10, i32::MAX - 10, i32::MAX, i32::MAX);
        assert!(roi.contains(i32::MAX - 5, i32::MAX - 5));
        assert!(!roi.contains(0, 0));
    }

    #[test]
    fn gate_suppresses_hand_outside_any_edge() {
        let size = FrameSize::new(640, 480);
        let roi = RegionOfInterest::centered(size, 0.4);
        for (x, y) in [(0.1, 0.5), (0.9, 0.5), (0.5, 0.1), (0.5, 0.9)] {
            let hand = hand_with_wrist(x, y);
            assert!(gate(Some(&roi), &hand, size).is_none(), "({x}, {y})");
        }
        let centered = hand_with_wrist(0.5, 0.5);
        assert!(gate(Some(&roi), &centered, size).is_some());
    }

    #[test]
    fn gate_without_region_passes_everything() {
        let hand = hand_with_wrist(0.0, 0.0);
        assert!(gate(None, &hand, FrameSize::new(640, 480)).is_some());
    }

    #[test]
    fn wrist_on_edge_pixel_is_rejected() {
        let size = FrameSize::new(640, 480);
        let roi = RegionOfInterest::centered(size, 0.4);
        // 0.3 * 640 = 192 == roi.x
        let hand = hand_with_wrist(0.3, 0.5);
        assert!(gate(Some(&roi), &hand, size).is_none());
    }
}
