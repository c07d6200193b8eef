use argh::FromArgs;

/// Exam proctoring camera monitor
#[derive(FromArgs, Debug)]
pub struct Args {
    /// camera device index
    #[argh(option, default = "0")]
    pub device: i32,

    /// requested capture width in pixels
    #[argh(option, default = "640")]
    pub width: u32,

    /// requested capture height in pixels
    #[argh(option, default = "480")]
    pub height: u32,

    /// target tick interval in milliseconds
    #[argh(option, default = "15")]
    pub tick_ms: u64,

    /// minimum delay between ticks in milliseconds
    #[argh(option, default = "1")]
    pub min_delay_ms: u64,

    /// seconds without a face before a violation is reported
    #[argh(option, default = "3.0")]
    pub no_face_threshold_secs: f64,

    /// minimum seconds between two no-face violations
    #[argh(option, default = "5.0")]
    pub no_face_cooldown_secs: f64,

    /// detector scale step between pyramid levels
    #[argh(option, default = "1.3")]
    pub scale_factor: f64,

    /// detector minimum neighbor hits per face
    #[argh(option, default = "5")]
    pub min_neighbors: i32,

    /// smallest face edge in pixels
    #[argh(option, default = "30")]
    pub min_face_size: u32,

    /// path to a Haar cascade file; searched in the usual OpenCV locations when omitted
    #[argh(option)]
    pub cascade: Option<String>,

    /// directory for violation evidence frames
    #[argh(option, default = "String::from(\"violations\")")]
    pub evidence_dir: String,

    /// evidence image format: jpg or png
    #[argh(option, default = "String::from(\"jpg\")")]
    pub evidence_format: String,

    /// append the session log to this file
    #[argh(option)]
    pub log_file: Option<String>,

    /// initial delay between reconnect attempts in milliseconds
    #[argh(option, default = "250")]
    pub reconnect_backoff_ms: u64,

    /// maximum delay between reconnect attempts in milliseconds
    #[argh(option, default = "5000")]
    pub reconnect_backoff_max_ms: u64,

    /// run without a window; commands are read from stdin
    #[argh(switch)]
    pub headless: bool,

    /// start monitoring as soon as the camera is connected
    #[argh(switch)]
    pub auto_start: bool,
}
