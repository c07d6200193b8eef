use crate::frame::FaceRect;
use anyhow::Result;
use image::GrayImage;

/// Tuning knobs trading recall against false positives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorSettings {
    /// Image pyramid step between detection scales (> 1.0)
    pub scale_factor: f64,
    /// Overlapping candidate hits required to accept a face
    pub min_neighbors: i32,
    /// Smallest face edge considered, in pixels
    pub min_face_size: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            scale_factor: 1.3,
            min_neighbors: 5,
            min_face_size: 30,
        }
    }
}

/// Pluggable face detection capability.
///
/// Implementations keep no state between calls that influences the result.
pub trait FaceDetector {
    /// Detects faces in a grayscale frame
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<FaceRect>>;
}
