use anyhow::{Context, Result};
use exam_proctor::camera::Camera;
use exam_proctor::cli::Args;
use exam_proctor::config::{MonitorConfig, build_config};
use exam_proctor::event_log::EventLog;
use exam_proctor::evidence::EvidenceRecorder;
use exam_proctor::haar_detector::{self, HaarCascadeDetector};
use exam_proctor::highgui_sink::{HighguiSink, WINDOW_TITLE};
use exam_proctor::monitor::{Control, Monitor};
use exam_proctor::opencv_capture::OpenCvBackend;
use exam_proctor::presentation::{ConsoleSink, PresentationSink};
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const SUMMARY_LOG_LINES: usize = 20;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Args = argh::from_env();
    let config = build_config(&args)?;

    let cascade = config.cascade.clone().with_context(|| {
        format!(
            "no {} found; pass --cascade or set OPENCV_HAARCASCADES",
            haar_detector::FRONTAL_FACE_CASCADE
        )
    })?;
    let detector = HaarCascadeDetector::load(&cascade, config.detector)?;
    info!("Loaded face cascade from {}", cascade.display());

    let camera = Camera::new(
        config.device_index,
        config.resolution,
        OpenCvBackend::platform_defaults(),
    );
    let recorder = EvidenceRecorder::new(&config.evidence_dir, config.evidence_format);
    let log = EventLog::open(config.log_file.as_deref())?;

    let (tx, rx) = mpsc::unbounded_channel();

    let settings = config.loop_settings();

    if config.headless {
        tokio::spawn(read_commands(tx));
        println!("Commands: start, stop, reconnect, quit");
        let monitor = Monitor::new(camera, detector, ConsoleSink::new(), recorder, log, settings);
        run_session(&config, monitor, rx).await
    } else {
        let sink = HighguiSink::new(WINDOW_TITLE)?;
        println!("Keys: s = start, p = stop, r = reconnect, q = quit");
        let monitor = Monitor::new(camera, detector, sink, recorder, log, settings);
        run_session(&config, monitor, rx).await
    }
}

async fn run_session<P: PresentationSink>(
    config: &MonitorConfig,
    mut monitor: Monitor<HaarCascadeDetector, P>,
    controls: mpsc::UnboundedReceiver<Control>,
) -> Result<()> {
    if let Err(err) = monitor.connect() {
        warn!("{}; will keep retrying", err);
    }
    if config.auto_start {
        if let Err(err) = monitor.start() {
            warn!("Auto start skipped: {}", err);
        }
    }

    monitor
        .run(controls, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {}", err);
                std::future::pending::<()>().await;
            }
        })
        .await;

    println!("Session summary");
    println!("  Violations: {}", monitor.violation_count());
    println!("  Evidence directory: {}", monitor.recorder().dir().display());
    if let Some(path) = &config.log_file {
        println!("  Log file: {}", path.display());
    }
    let log = monitor.log();
    let shown = log.len().min(SUMMARY_LOG_LINES);
    if shown > 0 {
        println!("  Last {} of {} log entries:", shown, log.recorded());
        for entry in log.tail(SUMMARY_LOG_LINES) {
            println!("    {}", entry.line());
        }
    }

    Ok(())
}

/// Reads `start`, `stop`, `reconnect` and `quit` commands from stdin
async fn read_commands(tx: mpsc::UnboundedSender<Control>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!("Failed to read command: {}", err);
                break;
            }
        };

        let control = match line.trim() {
            "start" => Control::Start,
            "stop" => Control::Stop,
            "reconnect" => Control::Reconnect,
            "quit" | "exit" => Control::Shutdown,
            "" => continue,
            other => {
                warn!("Unknown command {:?} (expected start, stop, reconnect or quit)", other);
                continue;
            }
        };

        if tx.send(control).is_err() {
            break;
        }
    }
}
