//! Crack classification and reporting.
//!
//! Thresholds the gradient magnitude map, paints crack pixels over the
//! grayscale image, and condenses the crack count into [`Metrics`] with
//! a [`Severity`] verdict.

use image::Rgba;

use crate::types::{Dimensions, GrayImage, Metrics, RgbaImage, Severity};

/// Color (R, G, B) used to paint crack pixels.
pub const CRACK_COLOR: [u8; 3] = [255, 0, 0];

/// Whether a pixel with the given magnitude is a crack pixel.
///
/// The comparison is strict: a magnitude equal to the threshold is not
/// a crack.
#[must_use]
pub const fn is_crack(magnitude: u8, threshold: u8) -> bool {
    magnitude > threshold
}

/// Paint crack pixels onto a copy of the grayscale image.
///
/// Pixels whose magnitude in `edges` exceeds `threshold` become
/// [`CRACK_COLOR`]; every other pixel keeps its grayscale value. Alpha
/// is taken from `grayscale` unchanged.
///
/// Returns the annotated image and the number of crack pixels. Both
/// images must have the same dimensions.
#[must_use = "returns the annotated image and crack count"]
pub(crate) fn annotate(
    edges: &GrayImage,
    grayscale: &RgbaImage,
    threshold: u8,
) -> (RgbaImage, u64) {
    debug_assert_eq!(edges.dimensions(), grayscale.dimensions());

    let mut annotated = grayscale.clone();
    let mut crack_pixels = 0u64;
    for (pixel, magnitude) in annotated.pixels_mut().zip(edges.pixels()) {
        if is_crack(magnitude.0[0], threshold) {
            let [r, g, b] = CRACK_COLOR;
            *pixel = Rgba([r, g, b, pixel.0[3]]);
            crack_pixels += 1;
        }
    }
    (annotated, crack_pixels)
}

/// Crack coverage in percent, unrounded.
///
/// Returns 0.0 for an empty image.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn coverage_percent(crack_pixels: u64, total_pixels: u64) -> f64 {
    if total_pixels == 0 {
        return 0.0;
    }
    crack_pixels as f64 / total_pixels as f64 * 100.0
}

/// Round to two decimals, halves away from zero.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Build the summary metrics for a run.
///
/// Severity is selected from the unrounded coverage; only the reported
/// `crack_percentage` is rounded.
#[must_use]
pub fn summarize(crack_pixels: u64, dimensions: Dimensions) -> Metrics {
    let total_pixels = dimensions.pixel_count();
    let coverage = coverage_percent(crack_pixels, total_pixels);
    let severity = Severity::from_percentage(coverage);
    Metrics {
        crack_pixel_count: crack_pixels,
        total_pixels,
        crack_percentage: round2(coverage),
        width: dimensions.width,
        height: dimensions.height,
        severity,
        recommendation: severity.recommendation().to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    #[test]
    fn threshold_is_strict() {
        assert!(!is_crack(100, 100));
        assert!(is_crack(101, 100));
        assert!(!is_crack(0, 100));
        assert!(!is_crack(255, 255));
    }

    #[test]
    fn annotate_paints_only_crack_pixels() {
        let grayscale = RgbaImage::from_pixel(3, 1, Rgba([40, 40, 40, 200]));
        let mut edges = GrayImage::new(3, 1);
        edges.put_pixel(0, 0, image::Luma([100]));
        edges.put_pixel(1, 0, image::Luma([101]));
        edges.put_pixel(2, 0, image::Luma([255]));

        let (annotated, count) = annotate(&edges, &grayscale, 100);

        assert_eq!(count, 2);
        assert_eq!(annotated.get_pixel(0, 0).0, [40, 40, 40, 200]);
        assert_eq!(annotated.get_pixel(1, 0).0, [255, 0, 0, 200]);
        assert_eq!(annotated.get_pixel(2, 0).0, [255, 0, 0, 200]);
    }

    #[test]
    fn annotate_count_matches_painted_pixels() {
        let grayscale = RgbaImage::from_fn(7, 5, |x, y| {
            let v = u8::try_from(x * 30 + y).unwrap();
            Rgba([v, v, v, 255])
        });
        let edges = GrayImage::from_fn(7, 5, |x, y| {
            image::Luma([u8::try_from((x * 53 + y * 29) % 256).unwrap()])
        });

        let (annotated, count) = annotate(&edges, &grayscale, 100);

        assert_eq!(annotated.dimensions(), grayscale.dimensions());
        let painted = annotated
            .enumerate_pixels()
            .filter(|(x, y, _)| is_crack(edges.get_pixel(*x, *y).0[0], 100))
            .inspect(|(_, _, p)| assert_eq!(p.0, [255, 0, 0, 255]))
            .count();
        assert_eq!(count, painted as u64);
        assert!(count > 0 && count < 35);
    }

    #[test]
    fn annotate_respects_custom_threshold() {
        let grayscale = RgbaImage::from_pixel(2, 1, Rgba([9, 9, 9, 255]));
        let edges = GrayImage::from_raw(2, 1, vec![30, 60]).unwrap();
        let (_, count) = annotate(&edges, &grayscale, 50);
        assert_eq!(count, 1);
    }

    #[test]
    fn coverage_of_empty_image_is_zero() {
        assert!((coverage_percent(0, 0) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn round2_rounds_half_away_from_zero() {
        assert!((round2(1.005_000_1) - 1.01).abs() < 1e-12);
        assert!((round2(0.125) - 0.13).abs() < 1e-12);
        assert!((round2(2.994) - 2.99).abs() < 1e-12);
        assert!((round2(33.333_333) - 33.33).abs() < 1e-12);
    }

    #[test]
    fn summarize_no_cracks() {
        let m = summarize(0, dims(4, 4));
        assert_eq!(m.crack_pixel_count, 0);
        assert_eq!(m.total_pixels, 16);
        assert_eq!(m.percentage_label(), "0.00");
        assert_eq!(m.severity, Severity::Minor);
        assert_eq!(m.recommendation, "Monitor regularly");
    }

    #[test]
    fn summarize_tier_boundaries_on_exact_counts() {
        // 10_000 pixels: each crack pixel is 0.01%.
        let d = dims(100, 100);
        assert_eq!(summarize(99, d).severity, Severity::Minor);
        assert_eq!(summarize(100, d).severity, Severity::Moderate);
        assert_eq!(summarize(299, d).severity, Severity::Moderate);
        assert_eq!(summarize(300, d).severity, Severity::Critical);
        assert_eq!(summarize(5000, d).severity, Severity::Critical);
    }

    #[test]
    fn severity_uses_unrounded_coverage() {
        // 996 / 100_000 = 0.996% displays as 1.00 but stays Minor.
        let m = summarize(996, dims(1000, 100));
        assert_eq!(m.percentage_label(), "1.00");
        assert_eq!(m.severity, Severity::Minor);
    }

    #[test]
    fn full_coverage_is_one_hundred_percent() {
        let m = summarize(9, dims(3, 3));
        assert!((m.crack_percentage - 100.0).abs() < f64::EPSILON);
        assert_eq!(m.severity, Severity::Critical);
        assert_eq!(m.recommendation, "Immediate repair required");
    }

    #[test]
    fn percentage_is_rounded_to_two_decimals() {
        // 1 / 3 = 33.333...%
        let m = summarize(1, dims(3, 1));
        assert!((m.crack_percentage - 33.33).abs() < 1e-12);
        assert_eq!(m.percentage_label(), "33.33");
    }
}
