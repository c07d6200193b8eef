use crate::annotate;
use crate::camera::Camera;
use crate::error::ProctorError;
use crate::event_log::EventLog;
use crate::evidence::EvidenceRecorder;
use crate::face_detector::FaceDetector;
use crate::frame::Frame;
use crate::presentation::PresentationSink;
use crate::scheduler::{Cadence, ReconnectBackoff};
use crate::violation::{ViolationEvent, ViolationKind, ViolationPolicy, ViolationStateMachine};
use chrono::Local;
use image::RgbImage;
use log::{debug, error, info, warn};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TryRecvError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Camera open, violation logic off
    Idle,
    /// Camera open, every frame is checked
    Active,
    /// The last read failed and the camera is being reacquired
    Reconnecting,
}

/// Operator commands, applied between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Start,
    Stop,
    Reconnect,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub tick_interval: Duration,
    pub min_tick_delay: Duration,
    pub policy: ViolationPolicy,
    pub reconnect_backoff: Duration,
    pub reconnect_backoff_max: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(15),
            min_tick_delay: Duration::from_millis(1),
            policy: ViolationPolicy::default(),
            reconnect_backoff: Duration::from_millis(250),
            reconnect_backoff_max: Duration::from_secs(5),
        }
    }
}

/// What happened during one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub state: LoopState,
    /// Face count, when detection ran and succeeded
    pub faces: Option<usize>,
    pub violations: Vec<ViolationKind>,
    pub reconnect_attempted: bool,
    /// Delay before the next tick
    pub delay: Duration,
}

/// The monitoring control loop.
///
/// Ticks run strictly one after another: [`Monitor::run`] awaits the
/// inter-tick sleep and only then calls [`Monitor::tick`] again, and
/// operator commands are applied between ticks. All mutable session state
/// lives in this struct, so no locking is involved.
pub struct Monitor<D, P> {
    camera: Camera,
    detector: D,
    sink: P,
    violations: ViolationStateMachine,
    recorder: EvidenceRecorder,
    log: EventLog,
    cadence: Cadence,
    backoff: ReconnectBackoff,
    state: LoopState,
    reconnect_attempts: u64,
    current_frame: Option<Frame>,
    shut_down: bool,
}

impl<D: FaceDetector, P: PresentationSink> Monitor<D, P> {
    /// Creates the loop around a camera that has not been opened yet
    pub fn new(
        camera: Camera,
        detector: D,
        sink: P,
        recorder: EvidenceRecorder,
        log: EventLog,
        settings: LoopSettings,
    ) -> Self {
        Self {
            camera,
            detector,
            sink,
            violations: ViolationStateMachine::new(settings.policy, now()),
            recorder,
            log,
            cadence: Cadence::new(settings.tick_interval, settings.min_tick_delay),
            backoff: ReconnectBackoff::new(settings.reconnect_backoff, settings.reconnect_backoff_max),
            state: LoopState::Reconnecting,
            reconnect_attempts: 0,
            current_frame: None,
            shut_down: false,
        }
    }

    /// Opens the camera. On failure the loop stays in `Reconnecting` and
    /// keeps retrying on every tick.
    pub fn connect(&mut self) -> Result<(), ProctorError> {
        match self.camera.open() {
            Ok(()) => {
                self.log.record(format!(
                    "Camera {} connected ({})",
                    self.camera.device_index(),
                    self.camera.backend_name().unwrap_or("unknown backend")
                ));
                self.state = self.resting_state();
                Ok(())
            }
            Err(err) => {
                self.log.record(format!("Camera connection failed: {}", err));
                self.state = LoopState::Reconnecting;
                Err(err)
            }
        }
    }

    /// Enables violation checks. Needs an open camera whose feed is healthy.
    pub fn start(&mut self) -> Result<(), ProctorError> {
        if self.state == LoopState::Reconnecting || !self.camera.is_open() {
            let err = ProctorError::CameraUnavailable {
                device_index: self.camera.device_index(),
                reason: "camera is not connected".to_string(),
            };
            self.log.record(format!("Cannot start monitoring: {}", err));
            return Err(err);
        }
        if self.state == LoopState::Active {
            return Ok(());
        }

        self.violations.enable(now());
        self.state = LoopState::Active;
        self.log.record("Monitoring started");
        Ok(())
    }

    /// Disables violation checks
    pub fn stop(&mut self) {
        if self.violations.is_enabled() {
            self.violations.disable();
            self.log.record("Monitoring stopped");
        }
        if self.state == LoopState::Active {
            self.state = LoopState::Idle;
        }
    }

    /// Operator-requested camera reinitialization
    pub fn reconnect(&mut self) {
        self.log.record("Camera reconnect requested");
        match self.camera.reinitialize() {
            Ok(()) => {
                self.log.record(format!(
                    "Camera {} reconnected ({})",
                    self.camera.device_index(),
                    self.camera.backend_name().unwrap_or("unknown backend")
                ));
                self.reconnect_attempts = 0;
                self.backoff.reset();
                self.state = self.resting_state();
            }
            Err(err) => {
                self.log.record(format!("Camera reconnect failed: {}", err));
                self.state = LoopState::Reconnecting;
            }
        }
    }

    /// Releases the camera and the sink. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.camera.close();
        self.sink.close();
        self.shut_down = true;
        self.log.record(format!(
            "Session closed with {} violation(s)",
            self.recorder.violation_count()
        ));
        debug!(
            "Cadence: {} ticks, {} over budget, worst case {:?}",
            self.cadence.total_ticks(),
            self.cadence.deadline_misses(),
            self.cadence.worst_case()
        );
    }

    /// Applies one operator command; returns `false` when the loop should end
    pub fn apply(&mut self, control: Control) -> bool {
        match control {
            Control::Start => {
                if let Err(err) = self.start() {
                    error!("{}", err);
                }
                true
            }
            Control::Stop => {
                self.stop();
                true
            }
            Control::Reconnect => {
                self.reconnect();
                true
            }
            Control::Shutdown => false,
        }
    }

    /// Runs one tick at the current time
    pub fn tick(&mut self) -> TickReport {
        self.tick_at(now())
    }

    /// Runs one tick: read a frame, check it when active, present it and
    /// compute the delay before the next tick. Does nothing after shutdown.
    pub fn tick_at(&mut self, now: Instant) -> TickReport {
        let started = tokio::time::Instant::now();
        let mut report = TickReport {
            state: self.state,
            faces: None,
            violations: Vec::new(),
            reconnect_attempted: false,
            delay: Duration::ZERO,
        };
        if self.shut_down {
            return report;
        }

        let mut reopened = true;
        match self.camera.read() {
            Ok(frame) => {
                if self.state == LoopState::Reconnecting {
                    self.log.record(format!(
                        "Camera feed restored after {} reconnect attempt(s)",
                        self.reconnect_attempts
                    ));
                    self.reconnect_attempts = 0;
                    self.backoff.reset();
                }
                self.state = self.resting_state();

                if self.state == LoopState::Active {
                    self.check_frame(frame, now, &mut report);
                } else {
                    let status = format!("PAUSED | violations: {}", self.recorder.violation_count());
                    self.show(frame.image(), Some(&status));
                    self.current_frame = Some(frame);
                }
            }
            Err(err) => reopened = self.recover(err, &mut report),
        }

        report.state = self.state;
        let mut delay = self.cadence.next_delay(started.elapsed());
        if !reopened {
            delay = delay.max(self.backoff.on_failure());
        }
        report.delay = delay;
        report
    }

    /// Drives ticks until a shutdown command arrives or `shutdown` completes
    pub async fn run<F>(&mut self, mut controls: mpsc::UnboundedReceiver<Control>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut controls_open = true;
        let mut running = true;

        while running && !self.shut_down {
            if !self.drain_controls(&mut controls) {
                break;
            }

            let report = self.tick();

            if let Some(control) = self.sink.poll_control() {
                if !self.apply(control) {
                    break;
                }
            }

            // Commands are applied as they arrive, the next tick still waits for the sleep
            let sleep = tokio::time::sleep(report.delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        info!("Shutdown requested");
                        running = false;
                        break;
                    }
                    received = controls.recv(), if controls_open => match received {
                        Some(control) => {
                            if !self.apply(control) {
                                running = false;
                                break;
                            }
                        }
                        None => controls_open = false,
                    },
                    _ = &mut sleep => break,
                }
            }
        }

        self.shutdown();
    }

    fn drain_controls(&mut self, controls: &mut mpsc::UnboundedReceiver<Control>) -> bool {
        loop {
            match controls.try_recv() {
                Ok(control) => {
                    if !self.apply(control) {
                        return false;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return true,
            }
        }
    }

    fn check_frame(&mut self, frame: Frame, now: Instant, report: &mut TickReport) {
        let faces = match self.detector.detect(&frame.to_gray()) {
            Ok(faces) => faces,
            Err(err) => {
                // A failed detection skips the violation rules for this tick only
                let err = ProctorError::Detection(format!("{:#}", err));
                warn!("{}; frame not checked", err);
                self.show(frame.image(), Some("Detection unavailable"));
                self.current_frame = Some(frame);
                return;
            }
        };

        let count = faces.len();
        report.faces = Some(count);
        let verdict = self.violations.observe(count, now);

        let mut display = frame.image().clone();
        let color = if count > 1 {
            annotate::VIOLATION_COLOR
        } else {
            annotate::FACE_COLOR
        };
        annotate::draw_face_boxes(&mut display, &faces, color, annotate::BOX_THICKNESS);

        if let Some(kind) = verdict {
            report.violations.push(kind);
            let event = ViolationEvent {
                kind,
                occurred_at: Local::now(),
                evidence: frame.clone(),
            };
            if let Err(err) = self.recorder.record(&event, &mut self.log) {
                debug!("Continuing without evidence: {}", err);
            }
        }
        self.current_frame = Some(frame);

        let status = self.active_status(count, now);
        self.show(&display, Some(&status));
    }

    /// Attempts one reinitialization; returns whether the camera reopened
    fn recover(&mut self, err: ProctorError, report: &mut TickReport) -> bool {
        if self.state != LoopState::Reconnecting {
            self.log.record(format!("{}; reconnecting", err));
        } else {
            debug!("{}", err);
        }
        self.state = LoopState::Reconnecting;
        self.reconnect_attempts += 1;
        report.reconnect_attempted = true;

        let reopened = match self.camera.reinitialize() {
            Ok(()) => {
                debug!(
                    "Reconnect attempt {} reopened the camera via {}",
                    self.reconnect_attempts,
                    self.camera.backend_name().unwrap_or("unknown backend")
                );
                true
            }
            Err(err) => {
                debug!("Reconnect attempt {} failed: {}", self.reconnect_attempts, err);
                false
            }
        };

        let resolution = self.camera.resolution();
        let placeholder = annotate::placeholder_frame(resolution.width, resolution.height);
        let status = format!(
            "Camera disconnected - reconnecting (attempt {})",
            self.reconnect_attempts
        );
        self.show(&placeholder, Some(&status));
        reopened
    }

    fn active_status(&self, count: usize, now: Instant) -> String {
        let mut status = format!(
            "MONITORING | faces: {} | violations: {}",
            count,
            self.recorder.violation_count()
        );
        if count > 1 {
            status.push_str("\nWARNING: Multiple people detected!");
        } else if count == 0 && self.violations.silence(now) > self.violations.policy().no_face_threshold {
            status.push_str("\nWARNING: No person detected!");
        }
        status
    }

    fn show(&mut self, image: &RgbImage, status: Option<&str>) {
        if let Err(err) = self.sink.present(image, status) {
            warn!("Presenting frame failed: {:#}", err);
        }
    }

    fn resting_state(&self) -> LoopState {
        if self.violations.is_enabled() {
            LoopState::Active
        } else {
            LoopState::Idle
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_monitoring(&self) -> bool {
        self.violations.is_enabled()
    }

    pub fn violation_count(&self) -> u64 {
        self.recorder.violation_count()
    }

    /// Consecutive reconnect attempts in the current outage
    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts
    }

    /// Unannotated copy of the last frame read
    pub fn current_frame(&self) -> Option<&Frame> {
        self.current_frame.as_ref()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn recorder(&self) -> &EvidenceRecorder {
        &self.recorder
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
