//! Conversions between OpenCV matrices and `image` buffers.
//!
//! OpenCV hands out BGR pixels; everything past this module is RGB.

use anyhow::{Context, Result, bail};
use image::{GrayImage, RgbImage};
use opencv::{
    core::{self, AlgorithmHint, Mat, Scalar},
    imgproc,
    prelude::*,
};

/// Converts a BGR capture matrix into an RGB image
pub fn bgr_mat_to_rgb(mat: &Mat) -> Result<RgbImage> {
    if mat.channels() != 3 {
        bail!("expected a 3-channel frame, got {} channels", mat.channels());
    }

    let mut rgb_mat = Mat::default();
    imgproc::cvt_color(
        mat,
        &mut rgb_mat,
        imgproc::COLOR_BGR2RGB,
        0,
        AlgorithmHint::ALGO_HINT_DEFAULT,
    )?;

    let width = rgb_mat.cols() as u32;
    let height = rgb_mat.rows() as u32;
    let data = rgb_mat.data_bytes()?.to_vec();
    RgbImage::from_vec(width, height, data).context("frame buffer does not match its dimensions")
}

/// Converts an RGB image into a BGR matrix for OpenCV drawing and display
pub fn rgb_to_bgr_mat(image: &RgbImage) -> Result<Mat> {
    let mut rgb_mat = Mat::new_rows_cols_with_default(
        image.height() as i32,
        image.width() as i32,
        core::CV_8UC3,
        Scalar::all(0.0),
    )?;
    rgb_mat.data_bytes_mut()?.copy_from_slice(image.as_raw());

    let mut bgr_mat = Mat::default();
    imgproc::cvt_color(
        &rgb_mat,
        &mut bgr_mat,
        imgproc::COLOR_RGB2BGR,
        0,
        AlgorithmHint::ALGO_HINT_DEFAULT,
    )?;
    Ok(bgr_mat)
}

/// Copies a grayscale image into a single-channel matrix
pub fn gray_to_mat(image: &GrayImage) -> Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        image.height() as i32,
        image.width() as i32,
        core::CV_8UC1,
        Scalar::all(0.0),
    )?;
    mat.data_bytes_mut()?.copy_from_slice(image.as_raw());
    Ok(mat)
}
