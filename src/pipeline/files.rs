use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use image::RgbaImage;

use super::{FrameSink, FrameSource};
use crate::{error::FrameError, types::Frame};

/// Replays still images as frames, one per file, in the given order.
pub struct ImageFileSource {
    paths: VecDeque<PathBuf>,
}

impl ImageFileSource {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }
}

impl FrameSource for ImageFileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };
        log::debug!("loading frame from {}", path.display());
        load_frame(&path)
            .map(Some)
            .map_err(|err| FrameError::Read(format!("{}: {err:#}", path.display())))
    }
}

pub fn load_frame(path: &Path) -> Result<Frame> {
    let image = image::open(path)
        .with_context(|| format!("failed to open image {}", path.display()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    Ok(Frame::new(image.into_raw(), width, height))
}

/// Writes annotated frames as numbered PNG files.
pub struct PngDirectorySink {
    dir: PathBuf,
}

impl PngDirectorySink {
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{index:06}.png"))
    }
}

impl FrameSink for PngDirectorySink {
    fn present(&mut self, frame: &Frame, index: u64) -> Result<()> {
        let (width, height) = (frame.width, frame.height);
        let image = RgbaImage::from_raw(width, height, frame.rgba.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match {width}x{height}"))?;
        let path = self.path_for(index);
        image
            .save(&path)
            .with_context(|| format!("failed to save {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("finger-relay-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn png_sink_round_trips_through_source() {
        let dir = temp_dir("png");
        let mut sink = PngDirectorySink::create(&dir).unwrap();
        let frame = Frame::new([10u8, 20, 30, 255].repeat(6), 3, 2);
        sink.present(&frame, 1).unwrap();

        let mut source = ImageFileSource::new([sink.path_for(1)]);
        let loaded = source.next_frame().unwrap().unwrap();
        assert_eq!((loaded.width, loaded.height), (3, 2));
        assert_eq!(loaded.rgba, frame.rgba);
        assert!(source.next_frame().unwrap().is_none());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let mut source = ImageFileSource::new([temp_dir("missing").join("nope.png")]);
        assert!(matches!(source.next_frame(), Err(FrameError::Read(_))));
    }
}
