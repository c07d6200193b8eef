use crate::monitor::Control;
use anyhow::Result;
use image::RgbImage;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

/// Consumer of the per-tick display frame.
///
/// Sinks never modify the frame they are given.
pub trait PresentationSink {
    /// Shows one frame with optional status text
    fn present(&mut self, image: &RgbImage, status: Option<&str>) -> Result<()>;

    /// Operator command captured by the sink since the last poll
    fn poll_control(&mut self) -> Option<Control> {
        None
    }

    /// Called once when the session ends
    fn close(&mut self) {}
}

/// Headless sink that renders the status text on a terminal spinner line
pub struct ConsoleSink {
    spinner: ProgressBar,
    started: Instant,
    frames: u64,
}

impl ConsoleSink {
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();

        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} frames | {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        spinner.set_style(style);
        spinner.set_message("Starting...");

        Self {
            spinner,
            started: Instant::now(),
            frames: 0,
        }
    }

    fn message(&self, status: Option<&str>) -> String {
        let elapsed = self.started.elapsed();
        let fps = if elapsed > Duration::ZERO {
            self.frames as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        format!(
            "{} | session {} | {:.1} fps",
            status.unwrap_or("-"),
            format_duration(elapsed.as_secs_f64()),
            fps
        )
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentationSink for ConsoleSink {
    fn present(&mut self, _image: &RgbImage, status: Option<&str>) -> Result<()> {
        self.frames += 1;
        self.spinner.inc(1);

        let msg = self.message(status);
        self.spinner.set_message(msg);
        Ok(())
    }

    fn close(&mut self) {
        let msg = format!("Session ended after {}", format_duration(self.started.elapsed().as_secs_f64()));
        self.spinner.finish_with_message(msg);
    }
}

/// Formats a duration in seconds to h:mm:ss format
fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_clock_formatting() {
        assert_eq!(format_duration(7.4), "0:07");
        assert_eq!(format_duration(600.0), "10:00");
        assert_eq!(format_duration(3599.99), "59:59");
        // A three hour exam rolls over into the hours field
        assert_eq!(format_duration(10_805.0), "3:00:05");
    }

    #[test]
    fn test_console_sink_counts_frames() {
        let mut sink = ConsoleSink::new();
        let image = RgbImage::new(4, 4);

        sink.present(&image, Some("PAUSED | violations: 0")).unwrap();
        sink.present(&image, None).unwrap();
        sink.close();

        assert_eq!(sink.frames(), 2);
    }

    #[test]
    fn test_console_message_includes_status() {
        let sink = ConsoleSink::new();
        let msg = sink.message(Some("MONITORING | faces: 1 | violations: 0"));

        assert!(msg.starts_with("MONITORING | faces: 1 | violations: 0 | session 0:00"));
        assert!(msg.ends_with("fps"));
    }
}
