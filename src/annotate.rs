use crate::frame::FaceRect;
use image::{Rgb, RgbImage};

/// Outline color for an accepted face
pub const FACE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

/// Outline color for faces on a multiple-faces tick
pub const VIOLATION_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

pub const BOX_THICKNESS: u32 = 2;

const PLACEHOLDER_COLOR: Rgb<u8> = Rgb([32, 32, 32]);

/// Draws hollow rectangles around the given faces
///
/// # Arguments
/// * `image` - The working copy to draw on
/// * `faces` - Face regions in image coordinates, may extend past the edges
/// * `color` - Outline color
/// * `thickness` - Outline width in pixels, drawn inwards from the region edge
pub fn draw_face_boxes(image: &mut RgbImage, faces: &[FaceRect], color: Rgb<u8>, thickness: u32) {
    for face in faces {
        draw_hollow_rect(image, face, color, thickness.max(1));
    }
}

fn draw_hollow_rect(image: &mut RgbImage, face: &FaceRect, color: Rgb<u8>, thickness: u32) {
    let (img_w, img_h) = (image.width() as i64, image.height() as i64);
    let left = face.x as i64;
    let top = face.y as i64;
    let right = left + face.width as i64;
    let bottom = top + face.height as i64;
    let t = thickness as i64;

    let x0 = left.max(0);
    let y0 = top.max(0);
    let x1 = right.min(img_w);
    let y1 = bottom.min(img_h);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    for y in y0..y1 {
        for x in x0..x1 {
            let on_edge = x < left + t || x >= right - t || y < top + t || y >= bottom - t;
            if on_edge {
                image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Frame shown while the camera is being reacquired
pub fn placeholder_frame(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width.max(1), height.max(1), PLACEHOLDER_COLOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    #[test]
    fn test_box_outline_and_interior() {
        let mut image = RgbImage::new(100, 100);
        draw_face_boxes(&mut image, &[FaceRect::new(10, 10, 30, 20)], FACE_COLOR, 2);

        // Corners and edges are colored
        assert_eq!(*image.get_pixel(10, 10), FACE_COLOR);
        assert_eq!(*image.get_pixel(39, 29), FACE_COLOR);
        assert_eq!(*image.get_pixel(11, 20), FACE_COLOR);
        assert_eq!(*image.get_pixel(25, 28), FACE_COLOR);

        // Interior and outside are untouched
        assert_eq!(*image.get_pixel(25, 20), BLACK);
        assert_eq!(*image.get_pixel(9, 9), BLACK);
        assert_eq!(*image.get_pixel(40, 30), BLACK);
    }

    #[test]
    fn test_box_partially_outside_is_clipped() {
        let mut image = RgbImage::new(20, 20);
        draw_face_boxes(&mut image, &[FaceRect::new(-5, -5, 15, 40)], VIOLATION_COLOR, 1);

        // Right edge of the box is inside the image
        assert_eq!(*image.get_pixel(9, 3), VIOLATION_COLOR);
        // Left and top edges fall outside, so the visible corner is interior
        assert_eq!(*image.get_pixel(0, 0), BLACK);
    }

    #[test]
    fn test_box_fully_outside_is_ignored() {
        let mut image = RgbImage::new(20, 20);
        draw_face_boxes(&mut image, &[FaceRect::new(50, 50, 10, 10)], FACE_COLOR, 2);
        assert!(image.pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn test_placeholder_dimensions() {
        let placeholder = placeholder_frame(640, 480);
        assert_eq!(placeholder.width(), 640);
        assert_eq!(placeholder.height(), 480);

        let degenerate = placeholder_frame(0, 0);
        assert_eq!(degenerate.width(), 1);
    }
}
