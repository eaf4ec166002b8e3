//! Grayscale conversion.
//!
//! Reduces an RGBA image to BT.601 luminance while keeping the RGBA
//! layout: each output pixel has `R == G == B == L` and the input alpha.
//! This is the first step in the pipeline: pixels in, balanced
//! grayscale out.

use image::Rgba;

use crate::types::RgbaImage;

/// BT.601 luma weights in thousandths: `0.299`, `0.587`, `0.114`.
const WEIGHT_R: u32 = 299;
const WEIGHT_G: u32 = 587;
const WEIGHT_B: u32 = 114;
const WEIGHT_SCALE: u32 = 1000;
const _: () = assert!(WEIGHT_R + WEIGHT_G + WEIGHT_B == WEIGHT_SCALE);

/// Luminance of one pixel: `0.299*R + 0.587*G + 0.114*B`, truncated.
///
/// Evaluated in integer fixed point, which yields exactly the truncated
/// real-valued sum. The weights sum to one, so the result never exceeds
/// 255 and a balanced pixel (`R == G == B == v`) maps to `v`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = WEIGHT_R * r as u32 + WEIGHT_G * g as u32 + WEIGHT_B * b as u32;
    // weighted <= 255 * WEIGHT_SCALE, so the quotient fits in a u8.
    (weighted / WEIGHT_SCALE) as u8
}

/// Convert an RGBA image to balanced grayscale.
///
/// Every color channel of the output pixel carries the [`luma`] of the
/// input pixel; alpha is copied unchanged. The input is not modified.
#[must_use = "returns the grayscale image"]
pub fn to_grayscale(image: &RgbaImage) -> RgbaImage {
    into_grayscale(image.clone())
}

/// Convert an owned RGBA image to balanced grayscale in place.
#[must_use = "returns the grayscale image"]
pub fn into_grayscale(mut image: RgbaImage) -> RgbaImage {
    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let l = luma(r, g, b);
        *pixel = Rgba([l, l, l, a]);
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_of_primaries_follows_weights() {
        assert_eq!(luma(255, 0, 0), 76); // 76.245
        assert_eq!(luma(0, 255, 0), 149); // 149.685
        assert_eq!(luma(0, 0, 255), 29); // 29.07
    }

    #[test]
    fn luma_truncates_fraction() {
        // 0.299 * 100 + 0.587 * 150 + 0.114 * 200 = 140.75
        assert_eq!(luma(100, 150, 200), 140);
        // 0.299 + 0.587 = 0.886
        assert_eq!(luma(1, 1, 0), 0);
    }

    #[test]
    fn luma_is_fixed_point_on_balanced_pixels() {
        for v in 0..=255u8 {
            assert_eq!(luma(v, v, v), v, "luma({v}, {v}, {v})");
        }
    }

    #[test]
    fn luma_stays_in_range() {
        assert_eq!(luma(255, 255, 255), 255);
        assert_eq!(luma(0, 0, 0), 0);
    }

    #[test]
    fn green_is_brightest_channel() {
        let r = luma(200, 0, 0);
        let g = luma(0, 200, 0);
        let b = luma(0, 0, 200);
        assert!(
            g > r && r > b,
            "expected green > red > blue luminance, got R={r} G={g} B={b}",
        );
    }

    #[test]
    fn output_is_balanced_and_keeps_alpha() {
        let img = RgbaImage::from_fn(4, 3, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = (x * 40 + y * 17) as u8;
            Rgba([v, v.wrapping_mul(3), 255 - v, v / 2])
        });
        let gray = to_grayscale(&img);
        assert_eq!(gray.dimensions(), img.dimensions());
        for (src, dst) in img.pixels().zip(gray.pixels()) {
            let [r, g, b, a] = src.0;
            assert_eq!(dst.0, [luma(r, g, b), luma(r, g, b), luma(r, g, b), a]);
        }
    }

    #[test]
    fn input_is_not_modified() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([10, 200, 30, 255]));
        let before = img.clone();
        let _gray = to_grayscale(&img);
        assert_eq!(img, before);
    }

    #[test]
    fn conversion_is_idempotent() {
        let img = RgbaImage::from_fn(16, 9, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = (x * 13 + y * 29) as u8;
            Rgba([v, 255 - v, v.wrapping_mul(7), 255])
        });
        let once = to_grayscale(&img);
        let twice = to_grayscale(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn transparent_pixels_are_converted() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 0]));
        let gray = to_grayscale(&img);
        assert_eq!(gray.get_pixel(0, 0).0, [255, 255, 255, 0]);
    }
}
