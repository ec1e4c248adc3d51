#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod files;
pub mod handpose;
pub mod overlay;

use std::io::Write;

use anyhow::Result;

use crate::{
    classifier::FingerClassifier,
    error::FrameError,
    landmark::LandmarkSet,
    roi::{self, RegionSpec},
    serial::SerialSink,
    types::{Annotation, Frame, HandReport},
};

#[cfg(feature = "camera-nokhwa")]
pub use camera::CameraSource;
pub use files::{ImageFileSource, PngDirectorySink};
pub use handpose::HandposeDetector;
pub use overlay::OverlayRenderer;

pub trait FrameSource {
    /// `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameError>;
}

pub trait Detector {
    /// Landmarks of the most prominent hand, in normalized coordinates.
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>>;
}

pub trait Renderer {
    fn annotate(&mut self, frame: Frame, annotation: &Annotation) -> Frame;
}

/// Receives every annotated frame.
pub trait FrameSink {
    fn present(&mut self, frame: &Frame, index: u64) -> Result<()>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadErrorPolicy {
    /// Log and move on to the next frame.
    #[default]
    Skip,
    /// Log and end the run.
    Abort,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub on_read_error: ReadErrorPolicy,
    pub max_frames: Option<u64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub read_failures: u64,
    pub hands_detected: u64,
    pub hands_classified: u64,
    pub lines_sent: u64,
}

/// Result of pushing one frame through the pipeline.
pub struct FrameOutcome {
    pub frame: Frame,
    pub detected: bool,
    pub report: Option<HandReport>,
    pub line_sent: bool,
}

pub struct Pipeline<D, R, W: Write> {
    detector: D,
    renderer: R,
    classifier: FingerClassifier,
    region: RegionSpec,
    serial: Option<SerialSink<W>>,
    mirror: bool,
}

impl<D, R, W> Pipeline<D, R, W>
where
    D: Detector,
    R: Renderer,
    W: Write,
{
    pub fn new(detector: D, renderer: R, classifier: FingerClassifier) -> Self {
        Self {
            detector,
            renderer,
            classifier,
            region: RegionSpec::Disabled,
            serial: None,
            mirror: false,
        }
    }

    pub fn with_region(mut self, region: RegionSpec) -> Self {
        self.region = region;
        self
    }

    pub fn with_serial(mut self, sink: SerialSink<W>) -> Self {
        self.serial = Some(sink);
        self
    }

    pub fn with_mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn serial(&self) -> Option<&SerialSink<W>> {
        self.serial.as_ref()
    }

    pub fn into_serial(self) -> Option<SerialSink<W>> {
        self.serial
    }

    pub fn process_frame(&mut self, mut frame: Frame) -> FrameOutcome {
        if self.mirror {
            frame.mirror_horizontal();
        }

        let size = frame.size();
        let region = self.region.resolve(size);

        let detected = match self.detector.detect(&frame) {
            Ok(landmarks) => landmarks,
            Err(err) => {
                log::warn!("hand detection failed: {err:?}");
                None
            }
        };

        let mut annotation = Annotation {
            region,
            ..Annotation::default()
        };
        let mut line_sent = false;

        if let Some(landmarks) = &detected {
            match roi::gate(region.as_ref(), landmarks, size) {
                Some(accepted) => {
                    let states = self.classifier.classify(accepted, size);
                    log::debug!(
                        "finger states {:?} ({} bent)",
                        states.bent,
                        states.bent_count()
                    );

                    if let Some(serial) = self.serial.as_mut() {
                        match serial.send(&states.bent) {
                            Ok(()) => line_sent = true,
                            Err(err) => log::warn!("serial write failed: {err}"),
                        }
                    }

                    annotation.hand = Some(HandReport {
                        landmarks: accepted.clone(),
                        states,
                    });
                }
                None => annotation.outside_region = true,
            }
        }

        let report = annotation.hand.clone();
        let frame = self.renderer.annotate(frame, &annotation);

        FrameOutcome {
            frame,
            detected: detected.is_some(),
            report,
            line_sent,
        }
    }

    pub fn run<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
        options: RunOptions,
        mut sink: Option<&mut dyn FrameSink>,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        loop {
            if options.max_frames.is_some_and(|max| summary.frames >= max) {
                log::info!("frame limit reached");
                break;
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(FrameError::Disconnected) => {
                    log::warn!("frame source disconnected");
                    break;
                }
                Err(err) => {
                    summary.read_failures += 1;
                    match options.on_read_error {
                        ReadErrorPolicy::Skip => {
                            log::warn!("{err}; skipping");
                            continue;
                        }
                        ReadErrorPolicy::Abort => {
                            log::error!("{err}; stopping");
                            break;
                        }
                    }
                }
            };

            let outcome = self.process_frame(frame);
            summary.frames += 1;
            summary.hands_detected += outcome.detected as u64;
            summary.hands_classified += outcome.report.is_some() as u64;
            summary.lines_sent += outcome.line_sent as u64;

            if let Some(sink) = sink.as_deref_mut() {
                sink.present(&outcome.frame, summary.frames)?;
            }
        }

        Ok(summary)
    }
}
