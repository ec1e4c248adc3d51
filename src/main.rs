use std::process::ExitCode;

use anyhow::Result;
use finger_relay::{
    classifier::FingerClassifier,
    config::{Config, InputSource, USAGE},
    pipeline::{
        FrameSink, FrameSource, HandposeDetector, ImageFileSource, OverlayRenderer,
        PngDirectorySink, Pipeline, RunSummary,
    },
    serial::{SerialSink, open_serial_port},
};

fn main() -> ExitCode {
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };
    if config.show_help {
        print!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    match run(config) {
        Ok(summary) => {
            log::info!(
                "done: {} frames, {} read failures, {} hands detected, {} classified, {} lines sent",
                summary.frames,
                summary.read_failures,
                summary.hands_detected,
                summary.hands_classified,
                summary.lines_sent,
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{err:?}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config) -> Result<RunSummary> {
    let classifier = FingerClassifier::new(config.strategy);
    log::info!(
        "strategy {}, models {} and {}",
        classifier.strategy().name(),
        config.palm_model_path.display(),
        config.model_path.display()
    );

    let detector = HandposeDetector::new(
        &config.model_path,
        &config.palm_model_path,
        config.min_confidence,
    )?;
    let mut pipeline = Pipeline::new(detector, OverlayRenderer, classifier)
        .with_region(config.region)
        .with_mirror(config.mirror);

    if let Some(path) = &config.serial_port {
        let port = open_serial_port(path, config.baud_rate)?;
        pipeline = pipeline.with_serial(SerialSink::new(port));
    }

    let mut sink = match &config.save_dir {
        Some(dir) => Some(PngDirectorySink::create(dir)?),
        None => None,
    };
    let sink = sink.as_mut().map(|s| s as &mut dyn FrameSink);

    let mut source = open_source(&config.input)?;
    pipeline.run(source.as_mut(), config.run, sink)
}

fn open_source(input: &InputSource) -> Result<Box<dyn FrameSource>> {
    match input {
        InputSource::Images(paths) => Ok(Box::new(ImageFileSource::new(paths.iter().cloned()))),
        InputSource::Camera(index) => open_camera(*index),
    }
}

#[cfg(feature = "camera-nokhwa")]
fn open_camera(index: u32) -> Result<Box<dyn FrameSource>> {
    log::info!("opening camera {index}");
    Ok(Box::new(finger_relay::pipeline::CameraSource::open(index)?))
}

#[cfg(not(feature = "camera-nokhwa"))]
fn open_camera(index: u32) -> Result<Box<dyn FrameSource>> {
    anyhow::bail!("camera {index} requested but this build has no camera support")
}
