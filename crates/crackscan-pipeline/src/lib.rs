//! crackscan-pipeline: Pure crack detection pipeline (sans-IO).
//!
//! Grades surface damage in a raster image through:
//! grayscale -> Sobel gradient magnitude -> threshold classification ->
//! coverage metrics and severity verdict.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! RGBA pixel buffers and returns structured data. Decoding uploaded
//! files and encoding the annotated result are the caller's job (see
//! `crackscan-bench`).

pub mod classify;
pub mod diagnostics;
pub mod edge;
pub mod grayscale;
pub mod pipeline;
pub mod types;

pub use diagnostics::{Clock, PipelineDiagnostics, analyze_with_diagnostics};
pub use pipeline::Pipeline;
pub use types::{
    Analysis, Dimensions, GrayImage, Metrics, PipelineConfig, PipelineError, RgbaImage, Severity,
    StagedResult,
};

/// Check that a buffer of `len` bytes holds a `width` x `height` RGBA
/// image.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidDimensions`] if width or height is
/// zero, and [`PipelineError::BufferLengthMismatch`] if `len` is not
/// `width * height * 4`.
pub fn validate(len: usize, width: u32, height: u32) -> Result<Dimensions, PipelineError> {
    let dimensions = check_dimensions(width, height)?;
    let expected = dimensions.pixel_count() * 4;
    let actual = len as u64;
    if actual != expected {
        return Err(PipelineError::BufferLengthMismatch {
            width,
            height,
            expected,
            actual,
        });
    }
    Ok(dimensions)
}

/// Analyze a raw RGBA pixel buffer for cracks.
///
/// `pixels` is row-major RGBA with 8 bits per channel. The caller's
/// buffer is only read; the annotated image is a fresh allocation.
///
/// # Pipeline steps
///
/// 1. Validate dimensions and buffer length
/// 2. BT.601 grayscale conversion
/// 3. Sobel gradient magnitude (border ring fixed at zero)
/// 4. Threshold classification, annotation and metrics
///
/// # Errors
///
/// Returns [`PipelineError::InvalidDimensions`] if width or height is
/// zero. Returns [`PipelineError::BufferLengthMismatch`] if
/// `pixels.len() != width * height * 4`. No work is done in either case.
pub fn analyze(
    pixels: &[u8],
    width: u32,
    height: u32,
    config: &PipelineConfig,
) -> Result<Analysis, PipelineError> {
    let dimensions = validate(pixels.len(), width, height)?;
    let image = RgbaImage::from_raw(width, height, pixels.to_vec())
        .ok_or(PipelineError::InvalidDimensions { width, height })?;
    Ok(run(grayscale::into_grayscale(image), dimensions, config))
}

/// Analyze an already decoded RGBA image for cracks.
///
/// Equivalent to [`analyze`] on the image's pixels. Bytes past the last
/// pixel in the image's container are ignored. The image is not
/// modified.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidDimensions`] if the image is empty.
pub fn analyze_image(image: &RgbaImage, config: &PipelineConfig) -> Result<Analysis, PipelineError> {
    let (width, height) = image.dimensions();
    let dimensions = check_dimensions(width, height)?;
    // The container may be longer than the pixel data it describes.
    let exact = dimensions.pixel_count() * 4;
    let raw = usize::try_from(exact)
        .ok()
        .and_then(|len| image.as_raw().get(..len))
        .ok_or(PipelineError::BufferLengthMismatch {
            width,
            height,
            expected: exact,
            actual: image.as_raw().len() as u64,
        })?;
    let image = RgbaImage::from_raw(width, height, raw.to_vec())
        .ok_or(PipelineError::InvalidDimensions { width, height })?;
    Ok(run(grayscale::into_grayscale(image), dimensions, config))
}

/// Reject zero width or height.
fn check_dimensions(width: u32, height: u32) -> Result<Dimensions, PipelineError> {
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidDimensions { width, height });
    }
    Ok(Dimensions { width, height })
}

/// Run the full pipeline, keeping every intermediate image.
///
/// # Errors
///
/// Same as [`analyze`].
pub fn process_staged(
    pixels: &[u8],
    width: u32,
    height: u32,
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    Ok(Pipeline::new(pixels.to_vec(), width, height, config.clone())
        .grayscale()?
        .detect_edges()
        .classify()
        .into_result())
}

fn run(grayscale: RgbaImage, dimensions: Dimensions, config: &PipelineConfig) -> Analysis {
    let edges = edge::sobel_magnitude(&grayscale, config.parallel);
    let (annotated, crack_pixels) = classify::annotate(&edges, &grayscale, config.threshold);
    let metrics = classify::summarize(crack_pixels, dimensions);
    tracing::debug!(
        width = dimensions.width,
        height = dimensions.height,
        crack_pixels,
        severity = %metrics.severity,
        "analysis complete"
    );
    Analysis { annotated, metrics }
}
