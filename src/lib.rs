pub mod classifier;
pub mod config;
pub mod error;
pub mod landmark;
pub mod model_download;
pub mod pipeline;
pub mod roi;
pub mod serial;
pub mod types;

pub use classifier::{FingerClassifier, FingerStates, Strategy};
pub use landmark::{Finger, FrameSize, LandmarkSet};
pub use pipeline::{Pipeline, RunOptions, RunSummary};
