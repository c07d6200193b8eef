pub mod annotate;
pub mod camera;
pub mod cli;
pub mod config;
pub mod cv_convert;
pub mod error;
pub mod event_log;
pub mod evidence;
pub mod face_detector;
pub mod frame;
pub mod haar_detector;
pub mod highgui_sink;
pub mod monitor;
pub mod opencv_capture;
pub mod presentation;
pub mod scheduler;
pub mod violation;
