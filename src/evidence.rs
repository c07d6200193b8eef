use crate::error::ProctorError;
use crate::event_log::EventLog;
use crate::violation::ViolationEvent;
use anyhow::anyhow;
use image::ImageFormat;
use log::{debug, warn};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Encoding of evidence files. Pixels are written in RGB order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceFormat {
    Jpeg,
    Png,
}

impl EvidenceFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            EvidenceFormat::Jpeg => "jpg",
            EvidenceFormat::Png => "png",
        }
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            EvidenceFormat::Jpeg => ImageFormat::Jpeg,
            EvidenceFormat::Png => ImageFormat::Png,
        }
    }
}

impl FromStr for EvidenceFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(EvidenceFormat::Jpeg),
            "png" => Ok(EvidenceFormat::Png),
            other => Err(anyhow!("unsupported evidence format: {}", other)),
        }
    }
}

/// Identifier of one persisted evidence file: second-resolution timestamp
/// plus a per-process sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceId {
    id: String,
    path: PathBuf,
}

impl EvidenceId {
    pub fn as_str(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Persists violation frames and owns the session's violation counter.
pub struct EvidenceRecorder {
    dir: PathBuf,
    format: EvidenceFormat,
    violation_count: u64,
    sequence: u64,
}

impl EvidenceRecorder {
    pub fn new(dir: impl Into<PathBuf>, format: EvidenceFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
            violation_count: 0,
            sequence: 0,
        }
    }

    /// Counts the violation, logs it and writes its evidence frame.
    ///
    /// The count advances even when the write fails.
    pub fn record(
        &mut self,
        event: &ViolationEvent,
        log: &mut EventLog,
    ) -> Result<EvidenceId, ProctorError> {
        self.violation_count += 1;
        let number = self.violation_count;
        log.record(format!("Violation #{}: {}", number, event.kind.description()));

        match self.write(event) {
            Ok(id) => {
                debug!("Evidence for violation #{} saved to {}", number, id.path.display());
                Ok(id)
            }
            Err(err) => {
                warn!("Evidence for violation #{} lost: {}", number, err);
                log.record(format!("Evidence for violation #{} not saved: {}", number, err));
                Err(err)
            }
        }
    }

    fn write(&mut self, event: &ViolationEvent) -> Result<EvidenceId, ProctorError> {
        fs::create_dir_all(&self.dir).map_err(|e| storage_error(&self.dir, e))?;

        let stamp = event.occurred_at.format("%Y%m%d_%H%M%S").to_string();
        loop {
            self.sequence += 1;
            let id = format!("{}_{:04}", stamp, self.sequence);
            let path = self.dir.join(format!(
                "{}_{}.{}",
                event.kind.slug(),
                id,
                self.format.extension()
            ));

            let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                // Left over from an earlier session, never overwrite it
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(storage_error(&path, e)),
            };

            let mut writer = BufWriter::new(file);
            let written = event
                .evidence
                .image()
                .write_to(&mut writer, self.format.image_format())
                .map_err(|e| e.to_string())
                .and_then(|_| writer.flush().map_err(|e| e.to_string()));

            return match written {
                Ok(()) => Ok(EvidenceId { id, path }),
                Err(reason) => {
                    let _ = fs::remove_file(&path);
                    Err(ProctorError::Storage { path, reason })
                }
            };
        }
    }

    pub fn violation_count(&self) -> u64 {
        self.violation_count
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn storage_error(path: &Path, err: io::Error) -> ProctorError {
    ProctorError::Storage {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::violation::ViolationKind;
    use chrono::{Local, TimeZone};
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn event(kind: ViolationKind) -> ViolationEvent {
        let at = Local.with_ymd_and_hms(2026, 5, 4, 9, 30, 15).unwrap();
        ViolationEvent {
            kind,
            occurred_at: at,
            evidence: Frame::new(RgbImage::from_pixel(32, 24, Rgb([250, 10, 10])), at),
        }
    }

    #[test]
    fn test_record_writes_file_and_counts() {
        let dir = TempDir::new().unwrap();
        let evidence_dir = dir.path().join("violations");
        let mut recorder = EvidenceRecorder::new(&evidence_dir, EvidenceFormat::Png);
        let mut log = EventLog::in_memory();

        let id = recorder.record(&event(ViolationKind::NoFace), &mut log).unwrap();

        assert_eq!(id.as_str(), "20260504_093015_0001");
        assert_eq!(
            id.path().file_name().and_then(|n| n.to_str()),
            Some("no_face_20260504_093015_0001.png")
        );
        assert!(id.path().is_file());
        assert_eq!(recorder.violation_count(), 1);
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].message, "Violation #1: No person detected");
    }

    #[test]
    fn test_saved_png_keeps_rgb_order() {
        let dir = TempDir::new().unwrap();
        let mut recorder = EvidenceRecorder::new(dir.path(), EvidenceFormat::Png);
        let mut log = EventLog::in_memory();

        let id = recorder.record(&event(ViolationKind::MultipleFaces), &mut log).unwrap();

        let saved = image::open(id.path()).unwrap().to_rgb8();
        assert_eq!(*saved.get_pixel(0, 0), Rgb([250, 10, 10]));
    }

    #[test]
    fn test_same_second_violations_get_distinct_ids() {
        let dir = TempDir::new().unwrap();
        let mut recorder = EvidenceRecorder::new(dir.path(), EvidenceFormat::Jpeg);
        let mut log = EventLog::in_memory();

        let first = recorder.record(&event(ViolationKind::MultipleFaces), &mut log).unwrap();
        let second = recorder.record(&event(ViolationKind::MultipleFaces), &mut log).unwrap();

        assert_ne!(first, second);
        assert!(first.path().is_file());
        assert!(second.path().is_file());
        assert_eq!(recorder.violation_count(), 2);
    }

    #[test]
    fn test_existing_files_are_never_overwritten() {
        let dir = TempDir::new().unwrap();
        let stale = dir.path().join("no_face_20260504_093015_0001.png");
        fs::write(&stale, b"earlier session").unwrap();

        let mut recorder = EvidenceRecorder::new(dir.path(), EvidenceFormat::Png);
        let mut log = EventLog::in_memory();
        let id = recorder.record(&event(ViolationKind::NoFace), &mut log).unwrap();

        assert_eq!(id.as_str(), "20260504_093015_0002");
        assert_eq!(fs::read(&stale).unwrap(), b"earlier session");
    }

    #[test]
    fn test_storage_failure_still_counts_violation() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("violations");
        fs::write(&blocker, b"not a directory").unwrap();

        let mut recorder = EvidenceRecorder::new(&blocker, EvidenceFormat::Jpeg);
        let mut log = EventLog::in_memory();
        let result = recorder.record(&event(ViolationKind::NoFace), &mut log);

        assert!(matches!(result, Err(ProctorError::Storage { .. })));
        assert_eq!(recorder.violation_count(), 1);
        assert_eq!(log.len(), 2);
        assert!(log.entries()[1].message.starts_with("Evidence for violation #1 not saved"));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JPG".parse::<EvidenceFormat>().unwrap(), EvidenceFormat::Jpeg);
        assert_eq!("png".parse::<EvidenceFormat>().unwrap(), EvidenceFormat::Png);
        assert!("gif".parse::<EvidenceFormat>().is_err());
    }
}
