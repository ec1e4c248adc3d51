use thiserror::Error;

#[derive(Debug, Error)]
pub enum LandmarkError {
    #[error("expected {expected} landmarks, got {got}")]
    WrongCount { expected: usize, got: usize },
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("failed to read frame: {0}")]
    Read(String),
    #[error("frame source closed")]
    Disconnected,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown argument `{0}`")]
    UnknownArgument(String),
    #[error("missing value for `{0}`")]
    MissingValue(&'static str),
    #[error("invalid value `{value}` for `{flag}`: {reason}")]
    InvalidValue {
        flag: &'static str,
        value: String,
        reason: String,
    },
    #[error("`--camera` and `--image` cannot be combined")]
    ConflictingSources,
}
