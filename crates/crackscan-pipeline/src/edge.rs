//! Sobel gradient magnitude.
//!
//! Convolves the balanced grayscale image with the horizontal and
//! vertical 3x3 Sobel kernels and stores `sqrt(gx² + gy²)` per pixel as
//! an 8-bit [`GrayImage`].
//!
//! Only interior pixels are convolved. The outermost one-pixel ring is
//! left at magnitude 0 rather than reflected or clamped, so border
//! pixels are never classified as cracks. Images narrower or shorter
//! than 3 pixels have no interior and produce an all-zero map.
//!
//! Magnitudes above 255 are clamped and fractional parts are truncated
//! when stored, matching the luminance conversion in
//! [`grayscale`](crate::grayscale).

use rayon::prelude::*;

use crate::types::{Dimensions, GrayImage, RgbaImage};

/// Horizontal Sobel kernel (responds to vertical edges).
pub const SOBEL_X: [[i32; 3]; 3] = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]];

/// Vertical Sobel kernel (responds to horizontal edges).
pub const SOBEL_Y: [[i32; 3]; 3] = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]];

/// Compute the Sobel gradient magnitude of a grayscale image.
///
/// Reads the red channel only; the input is expected to be balanced
/// (`R == G == B`), as produced by
/// [`to_grayscale`](crate::grayscale::to_grayscale).
///
/// With `parallel` set, output rows are computed on the rayon thread
/// pool. Each row only reads its fixed 3-row neighborhood of the shared
/// input and writes its own disjoint output row, so both paths produce
/// identical maps.
#[must_use = "returns the gradient magnitude map"]
pub fn sobel_magnitude(gray: &RgbaImage, parallel: bool) -> GrayImage {
    let dimensions = Dimensions {
        width: gray.width(),
        height: gray.height(),
    };
    let mut out = GrayImage::new(dimensions.width, dimensions.height);
    if !dimensions.has_interior() {
        return out;
    }

    let luminance: Vec<u8> = gray.pixels().map(|p| p.0[0]).collect();
    let width = dimensions.width as usize;
    let height = dimensions.height as usize;
    let rows: &mut [u8] = &mut out;

    if parallel {
        rows.par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| magnitude_row(&luminance, width, height, y, row));
    } else {
        rows.chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| magnitude_row(&luminance, width, height, y, row));
    }

    out
}

/// Fill one output row. Border rows and the first and last column of
/// every row are left untouched (zero).
fn magnitude_row(luminance: &[u8], width: usize, height: usize, y: usize, row: &mut [u8]) {
    if y == 0 || y + 1 >= height {
        return;
    }
    for (x, out) in row.iter_mut().enumerate().take(width - 1).skip(1) {
        let (gx, gy) = gradient_at(luminance, width, x, y);
        *out = clamp_magnitude(gx, gy);
    }
}

/// Horizontal and vertical Sobel responses at an interior pixel.
fn gradient_at(luminance: &[u8], width: usize, x: usize, y: usize) -> (i32, i32) {
    let mut gx = 0;
    let mut gy = 0;
    for (ky, (row_x, row_y)) in SOBEL_X.iter().zip(SOBEL_Y.iter()).enumerate() {
        let base = (y + ky - 1) * width + x - 1;
        let window = &luminance[base..base + 3];
        for ((&sample, &wx), &wy) in window.iter().zip(row_x).zip(row_y) {
            let sample = i32::from(sample);
            gx += wx * sample;
            gy += wy * sample;
        }
    }
    (gx, gy)
}

/// `sqrt(gx² + gy²)` clamped to `[0, 255]` and truncated.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn clamp_magnitude(gx: i32, gy: i32) -> u8 {
    // |gx|, |gy| <= 4 * 255, so the sum of squares fits in an i32.
    let magnitude = f64::from(gx * gx + gy * gy).sqrt();
    magnitude.min(255.0) as u8
}
