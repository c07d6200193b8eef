use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProctorError {
    #[error("camera {device_index} unavailable: {reason}")]
    CameraUnavailable { device_index: i32, reason: String },

    #[error("frame unavailable: {0}")]
    FrameUnavailable(String),

    #[error("failed to store evidence at {path}: {reason}")]
    Storage { path: PathBuf, reason: String },

    #[error("face detection failed: {0}")]
    Detection(String),
}
