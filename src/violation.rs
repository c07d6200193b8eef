use crate::frame::Frame;
use chrono::{DateTime, Local};
use std::fmt;
use std::time::{Duration, Instant};

/// Silence that must be exceeded before a missing face is reported
pub const NO_FACE_THRESHOLD: Duration = Duration::from_secs(3);

/// Minimum time between two no-face reports
pub const NO_FACE_COOLDOWN: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    NoFace,
    MultipleFaces,
}

impl ViolationKind {
    /// File-name friendly identifier
    pub fn slug(&self) -> &'static str {
        match self {
            ViolationKind::NoFace => "no_face",
            ViolationKind::MultipleFaces => "multiple_faces",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ViolationKind::NoFace => "No person detected",
            ViolationKind::MultipleFaces => "Multiple people detected",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A reportable violation together with the frame that proves it.
#[derive(Debug, Clone)]
pub struct ViolationEvent {
    pub kind: ViolationKind,
    pub occurred_at: DateTime<Local>,
    pub evidence: Frame,
}

/// Debounce timings for the no-face rule.
///
/// A threshold that is not below the cooldown is honored as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViolationPolicy {
    pub no_face_threshold: Duration,
    pub no_face_cooldown: Duration,
}

impl Default for ViolationPolicy {
    fn default() -> Self {
        Self {
            no_face_threshold: NO_FACE_THRESHOLD,
            no_face_cooldown: NO_FACE_COOLDOWN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoringState {
    pub enabled: bool,
    /// Last tick with at least one face
    pub last_face_seen_at: Instant,
    /// Last tick that fired a no-face violation, `None` if never
    pub last_no_face_alert_at: Option<Instant>,
}

/// Turns per-frame face counts into rate-limited violations.
pub struct ViolationStateMachine {
    policy: ViolationPolicy,
    state: MonitoringState,
}

impl ViolationStateMachine {
    /// Creates a disabled state machine
    pub fn new(policy: ViolationPolicy, now: Instant) -> Self {
        Self {
            policy,
            state: MonitoringState {
                enabled: false,
                last_face_seen_at: now,
                last_no_face_alert_at: None,
            },
        }
    }

    /// Enables violation logic; the silence window restarts at `now`
    pub fn enable(&mut self, now: Instant) {
        self.state.enabled = true;
        self.state.last_face_seen_at = now;
    }

    pub fn disable(&mut self) {
        self.state.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    pub fn state(&self) -> &MonitoringState {
        &self.state
    }

    pub fn policy(&self) -> &ViolationPolicy {
        &self.policy
    }

    /// Time since a face was last seen
    pub fn silence(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.state.last_face_seen_at)
    }

    /// Feeds one tick's face count and returns the violation it triggers, if any
    pub fn observe(&mut self, face_count: usize, now: Instant) -> Option<ViolationKind> {
        if !self.state.enabled {
            return None;
        }

        match face_count {
            0 => {
                let silent_too_long = self.silence(now) > self.policy.no_face_threshold;
                let cooled_down = match self.state.last_no_face_alert_at {
                    Some(last) => now.saturating_duration_since(last) >= self.policy.no_face_cooldown,
                    None => true,
                };

                if silent_too_long && cooled_down {
                    self.state.last_no_face_alert_at = Some(now);
                    Some(ViolationKind::NoFace)
                } else {
                    None
                }
            }
            1 => {
                self.state.last_face_seen_at = now;
                None
            }
            _ => {
                // No cooldown: every multi-face tick is reported
                self.state.last_face_seen_at = now;
                Some(ViolationKind::MultipleFaces)
            }
        }
    }
}
