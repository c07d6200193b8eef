use crate::cv_convert;
use crate::face_detector::{DetectorSettings, FaceDetector};
use crate::frame::FaceRect;
use anyhow::{Context, Result, bail};
use image::GrayImage;
use opencv::{
    core::{Rect, Size, Vector},
    objdetect::CascadeClassifier,
    prelude::*,
};
use std::env;
use std::path::{Path, PathBuf};

pub const FRONTAL_FACE_CASCADE: &str = "haarcascade_frontalface_default.xml";

const CASCADE_DIRS: &[&str] = &[
    "/usr/share/opencv4/haarcascades",
    "/usr/local/share/opencv4/haarcascades",
    "/usr/share/opencv/haarcascades",
    "/opt/homebrew/share/opencv4/haarcascades",
    "assets/cascades",
];

/// Looks for the frontal face cascade in `$OPENCV_HAARCASCADES` and the
/// usual OpenCV install locations
pub fn find_default_cascade() -> Option<PathBuf> {
    let from_env = env::var_os("OPENCV_HAARCASCADES").map(PathBuf::from);
    from_env
        .into_iter()
        .chain(CASCADE_DIRS.iter().map(PathBuf::from))
        .map(|dir| dir.join(FRONTAL_FACE_CASCADE))
        .find(|path| path.is_file())
}

/// Face detector backed by an OpenCV Haar cascade classifier.
pub struct HaarCascadeDetector {
    classifier: CascadeClassifier,
    settings: DetectorSettings,
}

impl HaarCascadeDetector {
    /// Loads a cascade definition from disk
    pub fn load(path: &Path, settings: DetectorSettings) -> Result<Self> {
        let path_str = path
            .to_str()
            .with_context(|| format!("cascade path {} is not valid UTF-8", path.display()))?;
        let classifier = CascadeClassifier::new(path_str)
            .with_context(|| format!("failed to load cascade {}", path.display()))?;
        if classifier.empty()? {
            bail!("cascade {} contains no classifier", path.display());
        }

        Ok(Self {
            classifier,
            settings,
        })
    }
}

impl FaceDetector for HaarCascadeDetector {
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<FaceRect>> {
        let mat = cv_convert::gray_to_mat(gray)?;
        let min_size = self.settings.min_face_size as i32;

        let mut rects = Vector::<Rect>::new();
        self.classifier.detect_multi_scale(
            &mat,
            &mut rects,
            self.settings.scale_factor,
            self.settings.min_neighbors,
            0,
            Size::new(min_size, min_size),
            Size::default(),
        )?;

        Ok(rects
            .iter()
            .map(|r| FaceRect::new(r.x, r.y, r.width.max(0) as u32, r.height.max(0) as u32))
            .collect())
    }
}
