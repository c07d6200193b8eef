use crate::camera::Resolution;
use crate::cli::Args;
use crate::evidence::EvidenceFormat;
use crate::face_detector::DetectorSettings;
use crate::haar_detector;
use crate::monitor::LoopSettings;
use crate::violation::ViolationPolicy;
use anyhow::{Context, Result, bail};
use log::warn;
use std::path::PathBuf;
use std::time::Duration;

/// Everything needed to assemble a monitoring session
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub device_index: i32,
    pub resolution: Resolution,
    pub tick_interval: Duration,
    pub min_tick_delay: Duration,
    pub policy: ViolationPolicy,
    pub detector: DetectorSettings,
    /// `None` until resolved against the filesystem
    pub cascade: Option<PathBuf>,
    pub evidence_dir: PathBuf,
    pub evidence_format: EvidenceFormat,
    pub log_file: Option<PathBuf>,
    pub reconnect_backoff: Duration,
    pub reconnect_backoff_max: Duration,
    pub headless: bool,
    pub auto_start: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let settings = LoopSettings::default();
        Self {
            device_index: 0,
            resolution: Resolution::default(),
            tick_interval: settings.tick_interval,
            min_tick_delay: settings.min_tick_delay,
            policy: settings.policy,
            detector: DetectorSettings::default(),
            cascade: None,
            evidence_dir: PathBuf::from("violations"),
            evidence_format: EvidenceFormat::Jpeg,
            log_file: None,
            reconnect_backoff: settings.reconnect_backoff,
            reconnect_backoff_max: settings.reconnect_backoff_max,
            headless: false,
            auto_start: false,
        }
    }
}

impl MonitorConfig {
    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            tick_interval: self.tick_interval,
            min_tick_delay: self.min_tick_delay,
            policy: self.policy,
            reconnect_backoff: self.reconnect_backoff,
            reconnect_backoff_max: self.reconnect_backoff_max,
        }
    }
}

/// Builds a session configuration from command line arguments
pub fn build_config(args: &Args) -> Result<MonitorConfig> {
    if args.tick_ms == 0 {
        bail!("--tick-ms must be greater than zero");
    }
    if args.scale_factor <= 1.0 {
        bail!("--scale-factor must be greater than 1.0, got {}", args.scale_factor);
    }
    if args.min_neighbors < 0 {
        bail!("--min-neighbors must not be negative, got {}", args.min_neighbors);
    }

    let policy = ViolationPolicy {
        no_face_threshold: secs_arg("--no-face-threshold-secs", args.no_face_threshold_secs)?,
        no_face_cooldown: secs_arg("--no-face-cooldown-secs", args.no_face_cooldown_secs)?,
    };
    if policy.no_face_threshold >= policy.no_face_cooldown {
        warn!(
            "No-face threshold ({:?}) is not below the cooldown ({:?}); alerts are spaced by the threshold",
            policy.no_face_threshold, policy.no_face_cooldown
        );
    }

    let cascade = match &args.cascade {
        Some(path) => {
            let path = PathBuf::from(path);
            if !path.is_file() {
                bail!("cascade file {} does not exist", path.display());
            }
            Some(path)
        }
        None => haar_detector::find_default_cascade(),
    };

    let evidence_format = args
        .evidence_format
        .parse::<EvidenceFormat>()
        .context("invalid --evidence-format")?;

    Ok(MonitorConfig {
        device_index: args.device,
        resolution: Resolution {
            width: args.width,
            height: args.height,
        },
        tick_interval: Duration::from_millis(args.tick_ms),
        min_tick_delay: Duration::from_millis(args.min_delay_ms),
        policy,
        detector: DetectorSettings {
            scale_factor: args.scale_factor,
            min_neighbors: args.min_neighbors,
            min_face_size: args.min_face_size,
        },
        cascade,
        evidence_dir: PathBuf::from(&args.evidence_dir),
        evidence_format,
        log_file: args.log_file.as_ref().map(PathBuf::from),
        reconnect_backoff: Duration::from_millis(args.reconnect_backoff_ms),
        reconnect_backoff_max: Duration::from_millis(args.reconnect_backoff_max_ms),
        headless: args.headless,
        auto_start: args.auto_start,
    })
}

fn secs_arg(name: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("{} must be a non-negative number of seconds", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use argh::FromArgs;
    use tempfile::NamedTempFile;

    fn parse(extra: &[&str]) -> Args {
        Args::from_args(&["exam-proctor"], extra).unwrap()
    }

    #[test]
    fn test_defaults_match_session_defaults() {
        let mut config = build_config(&parse(&[])).unwrap();
        config.cascade = None;

        assert_eq!(config, MonitorConfig::default());
        assert_eq!(config.loop_settings(), LoopSettings::default());
    }

    #[test]
    fn test_overrides_are_applied() {
        let cascade = NamedTempFile::new().unwrap();
        let cascade_path = cascade.path().to_str().unwrap();
        let args = parse(&[
            "--device",
            "2",
            "--tick-ms",
            "30",
            "--no-face-threshold-secs",
            "1.5",
            "--evidence-format",
            "png",
            "--cascade",
            cascade_path,
            "--headless",
            "--auto-start",
        ]);

        let config = build_config(&args).unwrap();

        assert_eq!(config.device_index, 2);
        assert_eq!(config.tick_interval, Duration::from_millis(30));
        assert_eq!(config.policy.no_face_threshold, Duration::from_millis(1500));
        assert_eq!(config.evidence_format, EvidenceFormat::Png);
        assert_eq!(config.cascade.as_deref(), Some(cascade.path()));
        assert!(config.headless);
        assert!(config.auto_start);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(build_config(&parse(&["--tick-ms", "0"])).is_err());
        assert!(build_config(&parse(&["--scale-factor", "1.0"])).is_err());
        assert!(build_config(&parse(&["--evidence-format", "bmp"])).is_err());
        assert!(build_config(&parse(&["--cascade", "/nonexistent/cascade.xml"])).is_err());

        let mut args = parse(&[]);
        args.min_neighbors = -1;
        assert!(build_config(&args).is_err());

        let mut args = parse(&[]);
        args.no_face_cooldown_secs = -2.0;
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn test_threshold_above_cooldown_is_kept() {
        let args = parse(&["--no-face-threshold-secs", "8", "--no-face-cooldown-secs", "5"]);

        let config = build_config(&args).unwrap();

        assert_eq!(config.policy.no_face_threshold, Duration::from_secs(8));
        assert_eq!(config.policy.no_face_cooldown, Duration::from_secs(5));
    }
}
