use chrono::{DateTime, Local};
use image::{GrayImage, RgbImage, imageops};

/// A captured camera frame.
///
/// Pixels are stored in RGB order. Capture backends that deliver BGR data
/// (OpenCV) convert at the boundary, so evidence files and the presentation
/// sinks can rely on a single channel convention.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
    captured_at: DateTime<Local>,
}

impl Frame {
    pub fn new(image: RgbImage, captured_at: DateTime<Local>) -> Self {
        Self { image, captured_at }
    }

    /// Wraps an image stamped with the current wall-clock time
    pub fn captured_now(image: RgbImage) -> Self {
        Self::new(image, Local::now())
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    /// Luma conversion used as the face detector input
    pub fn to_gray(&self) -> GrayImage {
        imageops::grayscale(&self.image)
    }
}

/// Axis-aligned face region in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl FaceRect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}
