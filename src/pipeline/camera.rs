use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender, bounded};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{CameraIndex, RequestedFormat, RequestedFormatType},
};

use super::FrameSource;
use crate::{error::FrameError, types::Frame};

enum Capture {
    Frame(Frame),
    Failed(String),
}

/// Webcam frames captured on a background thread. Only the newest frame is
/// kept while the consumer is busy.
pub struct CameraSource {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    frames: Receiver<Capture>,
}

impl CameraSource {
    pub fn open(index: u32) -> Result<Self> {
        let index = CameraIndex::Index(index);
        // Fail fast before spawning the capture thread.
        drop(build_camera(index.clone())?);

        let (tx, rx) = bounded(1);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = thread::spawn(move || capture_loop(index, tx, stop_flag));

        Ok(Self {
            stop,
            handle: Some(handle),
            frames: rx,
        })
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // Unblock a capture thread waiting to report a failure.
        while self.frames.try_recv().is_ok() {}
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        let mut latest = self.frames.recv().map_err(|_| FrameError::Disconnected)?;
        while let Capture::Frame(_) = latest {
            match self.frames.try_recv() {
                Ok(newer) => latest = newer,
                Err(_) => break,
            }
        }
        match latest {
            Capture::Frame(frame) => Ok(Some(frame)),
            Capture::Failed(reason) => Err(FrameError::Read(reason)),
        }
    }
}

fn build_camera(index: CameraIndex) -> Result<Camera> {
    let requested =
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
    let mut camera = Camera::new(index, requested)?;
    camera.open_stream()?;
    Ok(camera)
}

fn capture_loop(index: CameraIndex, tx: Sender<Capture>, stop: Arc<AtomicBool>) {
    let mut camera = match build_camera(index) {
        Ok(cam) => cam,
        Err(err) => {
            log::error!("failed to open camera: {err:?}");
            return;
        }
    };
    log::info!("camera stream open at {}", camera.resolution());

    while !stop.load(Ordering::Relaxed) {
        let capture = match read_frame(&mut camera) {
            Ok(frame) => Capture::Frame(frame),
            Err(err) => Capture::Failed(format!("{err:?}")),
        };

        // Drop if the consumer is busy. Failures must still get through so
        // the read-error policy can see them.
        match capture {
            Capture::Frame(_) => {
                let _ = tx.try_send(capture);
            }
            Capture::Failed(_) => {
                if tx.send(capture).is_err() {
                    break;
                }
            }
        }
    }

    if let Err(err) = camera.stop_stream() {
        log::warn!("failed to stop camera stream: {err:?}");
    }
}

fn read_frame(camera: &mut Camera) -> Result<Frame> {
    let buffer = camera.frame()?;
    let decoded = buffer.decode_image::<RgbFormat>()?;
    let (width, height) = decoded.dimensions();

    let rgb = decoded.into_raw();
    let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
    for chunk in rgb.chunks_exact(3) {
        rgba.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
    }

    Ok(Frame::new(rgba, width, height))
}
