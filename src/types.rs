use std::time::Instant;

use crate::{
    classifier::FingerStates,
    landmark::{Finger, FrameSize, LandmarkSet},
    roi::RegionOfInterest,
};

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(rgba: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            rgba,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    /// Flip left-right in place for a selfie view.
    pub fn mirror_horizontal(&mut self) {
        let row_len = self.width as usize * 4;
        if row_len == 0 {
            return;
        }
        for row in self.rgba.chunks_exact_mut(row_len) {
            let (mut left, mut right) = (0usize, self.width as usize - 1);
            while left < right {
                for c in 0..4 {
                    row.swap(left * 4 + c, right * 4 + c);
                }
                left += 1;
                right -= 1;
            }
        }
    }
}

/// Everything the classifier concluded about one frame.
#[derive(Clone, Debug)]
pub struct HandReport {
    pub landmarks: LandmarkSet,
    pub states: FingerStates,
}

impl HandReport {
    pub fn text_lines(&self) -> Vec<String> {
        Finger::ALL
            .iter()
            .map(|finger| {
                format!(
                    "{}: {} ({})",
                    finger.label(),
                    if self.states.is_bent(*finger) {
                        "Bent"
                    } else {
                        "Straight"
                    },
                    self.states.reading(*finger)
                )
            })
            .collect()
    }

    pub fn summary_line(&self) -> String {
        let bits: Vec<&str> = self
            .states
            .bent
            .iter()
            .map(|b| if *b { "1" } else { "0" })
            .collect();
        format!("Finger States: {}", bits.join(" "))
    }
}

/// What the renderer should draw onto a frame.
#[derive(Clone, Debug, Default)]
pub struct Annotation {
    pub region: Option<RegionOfInterest>,
    pub hand: Option<HandReport>,
    /// A hand was detected but rejected by the region gate.
    pub outside_region: bool,
}
