use std::{
    collections::VecDeque,
    io::{self, Write},
};

use anyhow::{Result, anyhow};
use finger_relay::{
    classifier::{FingerClassifier, Strategy},
    error::FrameError,
    landmark::{LandmarkSet, NUM_LANDMARKS, Point, WRIST},
    pipeline::{
        Detector, FrameSink, FrameSource, Pipeline, ReadErrorPolicy, Renderer, RunOptions,
    },
    roi::{RegionOfInterest, RegionSpec},
    serial::SerialSink,
    types::{Annotation, Frame},
};

const WIDTH: u32 = 100;
const HEIGHT: u32 = 100;

fn blank_frame() -> Frame {
    Frame::new(vec![0; (WIDTH * HEIGHT * 4) as usize], WIDTH, HEIGHT)
}

/// Upright hand with every finger extended; wrist at pixel (50, 90).
fn open_hand() -> LandmarkSet {
    let mut pts = [Point::default(); NUM_LANDMARKS];
    pts[WRIST] = Point::xy(0.5, 0.9);
    let thumb = [(0.58, 0.82), (0.62, 0.74), (0.65, 0.66), (0.68, 0.58)];
    for (i, (x, y)) in thumb.into_iter().enumerate() {
        pts[1 + i] = Point::xy(x, y);
    }
    for (f, x) in [0.56_f32, 0.50, 0.44, 0.38].into_iter().enumerate() {
        for j in 0..4 {
            pts[5 + f * 4 + j] = Point::xy(x, 0.6 - 0.08 * j as f32);
        }
    }
    LandmarkSet::new(pts)
}

/// Index finger folded so its tip drops below the PIP joint.
fn pointing_down_index() -> LandmarkSet {
    let mut pts = *open_hand().points();
    pts[8] = Point::xy(0.56, 0.58);
    LandmarkSet::new(pts)
}

#[derive(Default)]
struct ScriptedDetector {
    results: VecDeque<Result<Option<LandmarkSet>>>,
    seen_first_pixels: Vec<[u8; 4]>,
}

impl ScriptedDetector {
    fn new(results: impl IntoIterator<Item = Result<Option<LandmarkSet>>>) -> Self {
        Self {
            results: results.into_iter().collect(),
            seen_first_pixels: Vec::new(),
        }
    }
}

impl Detector for &mut ScriptedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>> {
        let mut first = [0u8; 4];
        first.copy_from_slice(&frame.rgba[..4]);
        self.seen_first_pixels.push(first);
        self.results.pop_front().unwrap_or(Ok(None))
    }
}

struct NoopRenderer;

impl Renderer for NoopRenderer {
    fn annotate(&mut self, frame: Frame, _annotation: &Annotation) -> Frame {
        frame
    }
}

struct ScriptedSource {
    items: VecDeque<Result<Frame, FrameError>>,
}

impl ScriptedSource {
    fn new(items: impl IntoIterator<Item = Result<Frame, FrameError>>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    fn frames(n: usize) -> Self {
        Self::new((0..n).map(|_| Ok(blank_frame())))
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        self.items.pop_front().transpose()
    }
}

#[derive(Default)]
struct RecordingSink {
    indices: Vec<u64>,
}

impl FrameSink for RecordingSink {
    fn present(&mut self, _frame: &Frame, index: u64) -> Result<()> {
        self.indices.push(index);
        Ok(())
    }
}

struct BrokenPort;

impl Write for BrokenPort {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn pipeline(
    detector: &mut ScriptedDetector,
) -> Pipeline<&mut ScriptedDetector, NoopRenderer, Vec<u8>> {
    Pipeline::new(detector, NoopRenderer, FingerClassifier::new(Strategy::default()))
        .with_serial(SerialSink::new(Vec::new()))
}

fn written(pipeline: Pipeline<&mut ScriptedDetector, NoopRenderer, Vec<u8>>) -> String {
    let bytes = pipeline.into_serial().map(SerialSink::into_inner).unwrap_or_default();
    String::from_utf8(bytes).unwrap()
}

#[test]
fn frames_without_a_hand_send_nothing() {
    let mut detector = ScriptedDetector::new([Ok(None), Ok(None)]);
    let mut pipe = pipeline(&mut detector);
    let summary = pipe
        .run(&mut ScriptedSource::frames(2), RunOptions::default(), None)
        .unwrap();

    assert_eq!(summary.frames, 2);
    assert_eq!(summary.hands_detected, 0);
    assert_eq!(summary.lines_sent, 0);
    assert_eq!(written(pipe), "");
}

#[test]
fn one_line_per_classified_frame() {
    let mut detector =
        ScriptedDetector::new([Ok(Some(open_hand())), Ok(None), Ok(Some(pointing_down_index()))]);
    let mut pipe = pipeline(&mut detector);
    let summary = pipe
        .run(&mut ScriptedSource::frames(3), RunOptions::default(), None)
        .unwrap();

    assert_eq!(summary.hands_detected, 2);
    assert_eq!(summary.hands_classified, 2);
    assert_eq!(summary.lines_sent, 2);
    assert_eq!(written(pipe), "00000\n01000\n");
}

#[test]
fn hand_outside_region_is_dropped() {
    let mut detector = ScriptedDetector::new([Ok(Some(open_hand()))]);
    let mut pipe =
        pipeline(&mut detector).with_region(RegionSpec::Fixed(RegionOfInterest::new(0, 0, 40, 40)));

    let outcome = pipe.process_frame(blank_frame());
    assert!(outcome.detected);
    assert!(outcome.report.is_none());
    assert!(!outcome.line_sent);
    assert_eq!(written(pipe), "");
}

#[test]
fn hand_inside_region_is_classified() {
    let mut detector = ScriptedDetector::new([Ok(Some(pointing_down_index()))]);
    let mut pipe =
        pipeline(&mut detector).with_region(RegionSpec::Fixed(RegionOfInterest::new(10, 10, 80, 85)));

    let outcome = pipe.process_frame(blank_frame());
    let report = outcome.report.expect("hand inside region");
    assert_eq!(report.summary_line(), "Finger States: 0 1 0 0 0");
    assert_eq!(written(pipe), "01000\n");
}

#[test]
fn wrist_on_region_border_is_outside() {
    let mut pts = *open_hand().points();
    pts[WRIST] = Point::xy(0.5, 0.5);
    let mut detector = ScriptedDetector::new([Ok(Some(LandmarkSet::new(pts)))]);
    // Bottom edge sits exactly on the wrist row.
    let mut pipe =
        pipeline(&mut detector).with_region(RegionSpec::Fixed(RegionOfInterest::new(0, 0, 100, 50)));

    assert!(pipe.process_frame(blank_frame()).report.is_none());
}

#[test]
fn detector_error_yields_no_output() {
    let mut detector =
        ScriptedDetector::new([Err(anyhow!("inference failed")), Ok(Some(open_hand()))]);
    let mut pipe = pipeline(&mut detector);
    let summary = pipe
        .run(&mut ScriptedSource::frames(2), RunOptions::default(), None)
        .unwrap();

    assert_eq!(summary.frames, 2);
    assert_eq!(summary.hands_detected, 1);
    assert_eq!(written(pipe), "00000\n");
}

#[test]
fn skip_policy_continues_past_read_failures() {
    let mut source = ScriptedSource::new([
        Ok(blank_frame()),
        Err(FrameError::Read("corrupt".into())),
        Ok(blank_frame()),
    ]);
    let mut detector = ScriptedDetector::default();
    let summary = pipeline(&mut detector)
        .run(&mut source, RunOptions::default(), None)
        .unwrap();

    assert_eq!(summary.frames, 2);
    assert_eq!(summary.read_failures, 1);
}

#[test]
fn abort_policy_stops_at_first_failure() {
    let mut source = ScriptedSource::new([
        Ok(blank_frame()),
        Err(FrameError::Read("corrupt".into())),
        Ok(blank_frame()),
    ]);
    let options = RunOptions {
        on_read_error: ReadErrorPolicy::Abort,
        ..RunOptions::default()
    };
    let mut detector = ScriptedDetector::default();
    let summary = pipeline(&mut detector).run(&mut source, options, None).unwrap();

    assert_eq!(summary.frames, 1);
    assert_eq!(summary.read_failures, 1);
}

#[test]
fn disconnect_ends_the_run() {
    let mut source = ScriptedSource::new([
        Ok(blank_frame()),
        Err(FrameError::Disconnected),
        Ok(blank_frame()),
    ]);
    let mut detector = ScriptedDetector::default();
    let summary = pipeline(&mut detector)
        .run(&mut source, RunOptions::default(), None)
        .unwrap();

    assert_eq!(summary.frames, 1);
    assert_eq!(summary.read_failures, 0);
}

#[test]
fn frame_limit_is_honoured() {
    let options = RunOptions {
        max_frames: Some(2),
        ..RunOptions::default()
    };
    let mut source = ScriptedSource::frames(5);
    let mut detector = ScriptedDetector::default();
    let summary = pipeline(&mut detector).run(&mut source, options, None).unwrap();

    assert_eq!(summary.frames, 2);
    assert_eq!(source.items.len(), 3);
}

#[test]
fn sink_sees_every_frame_in_order() {
    let mut sink = RecordingSink::default();
    let mut detector = ScriptedDetector::default();
    pipeline(&mut detector)
        .run(&mut ScriptedSource::frames(3), RunOptions::default(), Some(&mut sink))
        .unwrap();

    assert_eq!(sink.indices, vec![1, 2, 3]);
}

#[test]
fn serial_failure_does_not_stop_the_run() {
    let mut detector = ScriptedDetector::new([Ok(Some(open_hand())), Ok(Some(open_hand()))]);
    let mut pipe = Pipeline::new(
        &mut detector,
        NoopRenderer,
        FingerClassifier::new(Strategy::default()),
    )
    .with_serial(SerialSink::new(BrokenPort));
    let summary = pipe
        .run(&mut ScriptedSource::frames(2), RunOptions::default(), None)
        .unwrap();

    assert_eq!(summary.frames, 2);
    assert_eq!(summary.hands_classified, 2);
    assert_eq!(summary.lines_sent, 0);
    assert_eq!(pipe.serial().map(SerialSink::lines_written), Some(0));
}

#[test]
fn mirroring_happens_before_detection() {
    let mut frame = blank_frame();
    let last = frame.rgba.len() / HEIGHT as usize - 4;
    frame.rgba[last..last + 4].copy_from_slice(&[1, 2, 3, 255]);

    let mut detector = ScriptedDetector::default();
    pipeline(&mut detector).with_mirror(true).process_frame(frame);

    assert_eq!(detector.seen_first_pixels, vec![[1, 2, 3, 255]]);
}
