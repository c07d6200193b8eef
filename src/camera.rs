use crate::error::ProctorError;
use crate::frame::Frame;
use anyhow::Result;
use log::{debug, info, warn};

/// Requested capture resolution. Backends may ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

/// An opened camera device owned by exactly one [`Camera`].
pub trait CaptureDevice {
    /// Blocking read of the next frame. `Ok(None)` means the device answered
    /// with an empty frame.
    fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// Releases the underlying device
    fn release(&mut self) -> Result<()>;
}

/// One platform-specific way of acquiring a camera device.
pub trait CaptureBackend {
    fn name(&self) -> &str;

    /// Opens the device and verifies it is responsive
    fn open(&self, device_index: i32, resolution: Resolution) -> Result<Box<dyn CaptureDevice>>;
}

struct OpenHandle {
    backend: String,
    device: Box<dyn CaptureDevice>,
}

/// Camera lifecycle manager: tries backend strategies in priority order and
/// owns at most one open device at a time.
pub struct Camera {
    device_index: i32,
    resolution: Resolution,
    backends: Vec<Box<dyn CaptureBackend>>,
    handle: Option<OpenHandle>,
}

impl Camera {
    pub fn new(
        device_index: i32,
        resolution: Resolution,
        backends: Vec<Box<dyn CaptureBackend>>,
    ) -> Self {
        Self {
            device_index,
            resolution,
            backends,
            handle: None,
        }
    }

    /// Opens the device with the first backend that yields a working handle.
    /// Any handle that is already open is released first.
    pub fn open(&mut self) -> Result<(), ProctorError> {
        self.close();

        let mut tried = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            tried.push(backend.name().to_string());
            match backend.open(self.device_index, self.resolution) {
                Ok(device) => {
                    info!(
                        "Camera {} opened with {} backend",
                        self.device_index,
                        backend.name()
                    );
                    self.handle = Some(OpenHandle {
                        backend: backend.name().to_string(),
                        device,
                    });
                    return Ok(());
                }
                Err(err) => {
                    debug!("{} backend failed for camera {}: {:#}", backend.name(), self.device_index, err);
                }
            }
        }

        Err(ProctorError::CameraUnavailable {
            device_index: self.device_index,
            reason: if tried.is_empty() {
                "no capture backends configured".to_string()
            } else {
                format!("no backend produced a working handle (tried {})", tried.join(", "))
            },
        })
    }

    /// Reads the next frame from the open device
    pub fn read(&mut self) -> Result<Frame, ProctorError> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| ProctorError::FrameUnavailable("camera is not open".to_string()))?;

        match handle.device.read_frame() {
            Ok(Some(frame)) if !frame.is_empty() => Ok(frame),
            Ok(_) => Err(ProctorError::FrameUnavailable("empty frame".to_string())),
            Err(err) => Err(ProctorError::FrameUnavailable(format!("{:#}", err))),
        }
    }

    /// Releases the device. Closing a closed camera is a no-op.
    pub fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if let Err(err) = handle.device.release() {
                warn!("Releasing camera {} ({}) failed: {:#}", self.device_index, handle.backend, err);
            } else {
                debug!("Camera {} released", self.device_index);
            }
        }
    }

    /// Closes the current handle, if any, and opens the device again
    pub fn reinitialize(&mut self) -> Result<(), ProctorError> {
        self.close();
        self.open()
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Name of the backend that produced the open handle
    pub fn backend_name(&self) -> Option<&str> {
        self.handle.as_ref().map(|h| h.backend.as_str())
    }

    pub fn device_index(&self) -> i32 {
        self.device_index
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use image::RgbImage;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Counters {
        opens: Vec<String>,
        releases: usize,
    }

    struct FakeDevice {
        counters: Rc<RefCell<Counters>>,
        empty: bool,
    }

    impl CaptureDevice for FakeDevice {
        fn read_frame(&mut self) -> Result<Option<Frame>> {
            if self.empty {
                Ok(None)
            } else {
                Ok(Some(Frame::captured_now(RgbImage::new(8, 6))))
            }
        }

        fn release(&mut self) -> Result<()> {
            self.counters.borrow_mut().releases += 1;
            Ok(())
        }
    }

    struct FakeBackend {
        name: &'static str,
        works: bool,
        empty_frames: bool,
        counters: Rc<RefCell<Counters>>,
    }

    impl CaptureBackend for FakeBackend {
        fn name(&self) -> &str {
            self.name
        }

        fn open(&self, _device_index: i32, _resolution: Resolution) -> Result<Box<dyn CaptureDevice>> {
            self.counters.borrow_mut().opens.push(self.name.to_string());
            if self.works {
                Ok(Box::new(FakeDevice {
                    counters: self.counters.clone(),
                    empty: self.empty_frames,
                }))
            } else {
                Err(anyhow!("{} cannot open the device", self.name))
            }
        }
    }

    fn backend(name: &'static str, works: bool, counters: &Rc<RefCell<Counters>>) -> Box<dyn CaptureBackend> {
        Box::new(FakeBackend {
            name,
            works,
            empty_frames: false,
            counters: counters.clone(),
        })
    }

    #[test]
    fn test_backends_tried_in_priority_order() {
        let counters = Rc::new(RefCell::new(Counters::default()));
        let mut camera = Camera::new(
            0,
            Resolution::default(),
            vec![
                backend("v4l2", false, &counters),
                backend("gstreamer", true, &counters),
                backend("any", true, &counters),
            ],
        );

        camera.open().unwrap();

        assert!(camera.is_open());
        assert_eq!(camera.backend_name(), Some("gstreamer"));
        assert_eq!(counters.borrow().opens, vec!["v4l2", "gstreamer"]);
    }

    #[test]
    fn test_all_backends_failing_is_camera_unavailable() {
        let counters = Rc::new(RefCell::new(Counters::default()));
        let mut camera = Camera::new(
            2,
            Resolution::default(),
            vec![backend("v4l2", false, &counters), backend("any", false, &counters)],
        );

        let err = camera.open().unwrap_err();

        assert!(matches!(
            err,
            ProctorError::CameraUnavailable { device_index: 2, ref reason } if reason.contains("tried v4l2, any")
        ));
        assert!(!camera.is_open());
    }

    #[test]
    fn test_read_without_handle_is_frame_unavailable() {
        let mut camera = Camera::new(0, Resolution::default(), Vec::new());
        assert!(matches!(camera.read(), Err(ProctorError::FrameUnavailable(_))));
    }

    #[test]
    fn test_empty_frame_is_frame_unavailable() {
        let counters = Rc::new(RefCell::new(Counters::default()));
        let mut camera = Camera::new(
            0,
            Resolution::default(),
            vec![Box::new(FakeBackend {
                name: "any",
                works: true,
                empty_frames: true,
                counters: counters.clone(),
            })],
        );
        camera.open().unwrap();

        assert!(matches!(camera.read(), Err(ProctorError::FrameUnavailable(_))));
    }

    #[test]
    fn test_close_is_idempotent() {
        let counters = Rc::new(RefCell::new(Counters::default()));
        let mut camera = Camera::new(0, Resolution::default(), vec![backend("any", true, &counters)]);
        camera.open().unwrap();
        assert!(camera.read().is_ok());

        camera.close();
        camera.close();
        drop(camera);

        assert_eq!(counters.borrow().releases, 1);
    }

    #[test]
    fn test_reinitialize_releases_previous_handle() {
        let counters = Rc::new(RefCell::new(Counters::default()));
        let mut camera = Camera::new(0, Resolution::default(), vec![backend("any", true, &counters)]);
        camera.open().unwrap();

        camera.reinitialize().unwrap();

        assert_eq!(counters.borrow().releases, 1);
        assert_eq!(counters.borrow().opens.len(), 2);
        assert!(camera.is_open());
    }
}
