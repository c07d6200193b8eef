use crate::camera::{CaptureBackend, CaptureDevice, Resolution};
use crate::cv_convert;
use crate::frame::Frame;
use anyhow::{Context, Result, bail};
use log::debug;
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture},
};

/// Capture strategy backed by one OpenCV `videoio` API preference
pub struct OpenCvBackend {
    name: &'static str,
    api_preference: i32,
}

impl OpenCvBackend {
    pub fn new(name: &'static str, api_preference: i32) -> Self {
        Self {
            name,
            api_preference,
        }
    }

    /// Backend strategies for the current platform, most specific first and
    /// the generic auto-selection last
    pub fn platform_defaults() -> Vec<Box<dyn CaptureBackend>> {
        let mut backends: Vec<Box<dyn CaptureBackend>> = Vec::new();

        if cfg!(target_os = "windows") {
            backends.push(Box::new(Self::new("dshow", videoio::CAP_DSHOW)));
            backends.push(Box::new(Self::new("msmf", videoio::CAP_MSMF)));
        } else if cfg!(target_os = "macos") {
            backends.push(Box::new(Self::new("avfoundation", videoio::CAP_AVFOUNDATION)));
        } else {
            backends.push(Box::new(Self::new("v4l2", videoio::CAP_V4L2)));
            backends.push(Box::new(Self::new("gstreamer", videoio::CAP_GSTREAMER)));
        }
        backends.push(Box::new(Self::new("any", videoio::CAP_ANY)));

        backends
    }
}

impl CaptureBackend for OpenCvBackend {
    fn name(&self) -> &str {
        self.name
    }

    fn open(&self, device_index: i32, resolution: Resolution) -> Result<Box<dyn CaptureDevice>> {
        let mut capture = VideoCapture::new(device_index, self.api_preference)
            .with_context(|| format!("failed to create {} capture", self.name))?;

        if !capture.is_opened()? {
            bail!("{} did not open camera {}", self.name, device_index);
        }

        // Best effort, drivers are free to pick another mode
        let width_set = property_accepted(
            "width",
            capture.set(videoio::CAP_PROP_FRAME_WIDTH, resolution.width as f64),
        );
        let height_set = property_accepted(
            "height",
            capture.set(videoio::CAP_PROP_FRAME_HEIGHT, resolution.height as f64),
        );
        if !(width_set && height_set) {
            debug!(
                "{} ignored the {}x{} resolution request",
                self.name, resolution.width, resolution.height
            );
        }
        let _ = capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0);

        if !capture.grab()? {
            let _ = capture.release();
            bail!("{} opened camera {} but it returned no frame", self.name, device_index);
        }

        Ok(Box::new(OpenCvDevice { capture }))
    }
}

/// Outcome of a best-effort property request; an OpenCV error counts as a refusal
fn property_accepted(property: &str, result: opencv::Result<bool>) -> bool {
    match result {
        Ok(accepted) => accepted,
        Err(err) => {
            debug!("Setting capture {} failed: {}", property, err);
            false
        }
    }
}

struct OpenCvDevice {
    capture: VideoCapture,
}

impl CaptureDevice for OpenCvDevice {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let mut mat = Mat::default();
        if !self.capture.read(&mut mat)? || mat.empty() {
            return Ok(None);
        }

        let image = cv_convert::bgr_mat_to_rgb(&mat)?;
        Ok(Some(Frame::captured_now(image)))
    }

    fn release(&mut self) -> Result<()> {
        self.capture.release()?;
        Ok(())
    }
}
