use image::{Rgb, RgbImage};

use crate::types::Detection;

/// Mean colour of the four corner pixels, taken as the paper colour.
/// `None` for an image with no pixels.
pub fn background_color(image: &RgbImage) -> Option<Rgb<u8>> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let corners = [(0, 0), (w - 1, 0), (0, h - 1), (w - 1, h - 1)];
    let mut sum = [0u32; 3];
    for (x, y) in corners {
        for (acc, c) in sum.iter_mut().zip(image.get_pixel(x, y).0) {
            *acc += c as u32;
        }
    }
    Some(Rgb(sum.map(|s| ((s as f32) / 4.0).round() as u8)))
}

/// Copy of `image` with every masked pixel painted in the background colour.
pub fn sanitize_image(image: &RgbImage, detection: &Detection) -> RgbImage {
    let mut out = image.clone();
    if detection.is_absent() {
        return out;
    }
    let Some(fill) = background_color(image) else {
        return out;
    };
    for (x, y) in detection.to_mask().foreground() {
        if x < out.width() && y < out.height() {
            out.put_pixel(x, y, fill);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Diagnostics, IntruderRegion, MaskBoundaries};

    #[test]
    fn test_background_is_corner_mean() {
        let mut img = RgbImage::from_pixel(10, 10, Rgb([100, 100, 100]));
        img.put_pixel(0, 0, Rgb([200, 0, 100]));
        assert_eq!(background_color(&img), Some(Rgb([125, 75, 100])));
    }

    #[test]
    fn test_empty_image_has_no_background() {
        assert_eq!(background_color(&RgbImage::new(0, 5)), None);
        assert_eq!(background_color(&RgbImage::new(5, 0)), None);
        let empty = RgbImage::new(0, 0);
        let det = Detection::new(
            0,
            0,
            IntruderRegion::Boundaries(MaskBoundaries::columns(Some(3), None)),
            Diagnostics::default(),
        );
        assert_eq!(sanitize_image(&empty, &det), empty);
    }

    #[test]
    fn test_boundaries_are_painted() {
        let img = RgbImage::from_fn(12, 8, |x, _| if x < 3 { Rgb([0, 0, 0]) } else { Rgb([240, 240, 240]) });
        let det = Detection::new(
            12,
            8,
            IntruderRegion::Boundaries(MaskBoundaries::columns(Some(3), None)),
            Diagnostics::default(),
        );
        let out = sanitize_image(&img, &det);
        // left corners are ink, right corners paper
        let fill = Rgb([120, 120, 120]);
        assert_eq!(out.get_pixel(1, 4), &fill);
        assert_eq!(out.get_pixel(3, 4), &Rgb([240, 240, 240]));
        assert_eq!(img.get_pixel(1, 4), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_absent_detection_is_identity() {
        let img = RgbImage::from_fn(9, 9, |x, y| Rgb([x as u8, y as u8, 7]));
        assert_eq!(sanitize_image(&img, &Detection::absent(9, 9, "nothing")), img);
    }
}
