use crate::cv_convert;
use crate::monitor::Control;
use crate::presentation::PresentationSink;
use anyhow::Result;
use image::RgbImage;
use log::warn;
use opencv::{
    core::{Point, Scalar},
    highgui, imgproc,
};

pub const WINDOW_TITLE: &str = "Exam Proctor";

const KEY_ESCAPE: i32 = 27;

/// Windowed sink. Keys: `s` start, `p` stop, `r` reconnect, `q`/Esc quit.
pub struct HighguiSink {
    window: String,
    pending: Option<Control>,
}

impl HighguiSink {
    pub fn new(title: &str) -> Result<Self> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self {
            window: title.to_string(),
            pending: None,
        })
    }

    fn window_closed(&self) -> bool {
        highgui::get_window_property(&self.window, highgui::WND_PROP_VISIBLE)
            .map(|visible| visible < 1.0)
            .unwrap_or(false)
    }
}

fn control_for_key(key: i32) -> Option<Control> {
    if key == KEY_ESCAPE {
        return Some(Control::Shutdown);
    }
    match u8::try_from(key & 0xFF).ok().map(char::from) {
        Some('q') => Some(Control::Shutdown),
        Some('s') => Some(Control::Start),
        Some('p') => Some(Control::Stop),
        Some('r') => Some(Control::Reconnect),
        _ => None,
    }
}

impl PresentationSink for HighguiSink {
    fn present(&mut self, image: &RgbImage, status: Option<&str>) -> Result<()> {
        let mut display = cv_convert::rgb_to_bgr_mat(image)?;

        if let Some(status) = status {
            for (i, line) in status.lines().enumerate() {
                imgproc::put_text(
                    &mut display,
                    line,
                    Point::new(10, 30 + 30 * i as i32),
                    imgproc::FONT_HERSHEY_SIMPLEX,
                    0.7,
                    Scalar::new(0.0, 0.0, 255.0, 0.0),
                    2,
                    imgproc::LINE_8,
                    false,
                )?;
            }
        }

        highgui::imshow(&self.window, &display)?;

        // wait_key also pumps the window's event loop
        let key = highgui::wait_key(1)?;
        if key >= 0 {
            self.pending = control_for_key(key).or(self.pending);
        }
        if self.window_closed() {
            self.pending = Some(Control::Shutdown);
        }
        Ok(())
    }

    fn poll_control(&mut self) -> Option<Control> {
        self.pending.take()
    }

    fn close(&mut self) {
        if let Err(err) = highgui::destroy_window(&self.window) {
            warn!("Failed to close window {}: {}", self.window, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bindings() {
        assert_eq!(control_for_key('q' as i32), Some(Control::Shutdown));
        assert_eq!(control_for_key(KEY_ESCAPE), Some(Control::Shutdown));
        assert_eq!(control_for_key('s' as i32), Some(Control::Start));
        assert_eq!(control_for_key('p' as i32), Some(Control::Stop));
        assert_eq!(control_for_key('r' as i32), Some(Control::Reconnect));
        assert_eq!(control_for_key('x' as i32), None);
    }
}
