//! Shared types for the crackscan analysis pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference the
/// gradient magnitude map without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can hand over decoded
/// pixel buffers without depending on `image` directly.
pub use image::RgbaImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total pixel count (`width * height`).
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Whether the image has at least one interior pixel, i.e. a pixel
    /// the 3x3 Sobel window fits around.
    #[must_use]
    pub const fn has_interior(self) -> bool {
        self.width >= 3 && self.height >= 3
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {}", self.width, self.height)
    }
}

/// Configuration for the analysis pipeline.
///
/// The default classification is a strict `magnitude > 100` on the
/// 8-bit magnitude scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Crack classification threshold on the clamped 8-bit gradient
    /// magnitude. A pixel is a crack pixel when its magnitude is
    /// strictly greater than this value.
    pub threshold: u8,

    /// Compute the Sobel pass over row ranges in parallel.
    ///
    /// The output is bit-identical to the sequential pass.
    pub parallel: bool,
}

impl PipelineConfig {
    /// Default crack classification threshold.
    pub const DEFAULT_THRESHOLD: u8 = 100;

    /// Default for the parallel Sobel pass.
    pub const DEFAULT_PARALLEL: bool = true;
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            parallel: Self::DEFAULT_PARALLEL,
        }
    }
}

/// Severity tier derived from crack coverage.
///
/// Ordered from least to most severe so tiers can be compared directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Coverage below 1%.
    Minor,
    /// Coverage of at least 1% and below 3%.
    Moderate,
    /// Coverage of 3% or more.
    Critical,
}

impl Severity {
    /// Lower coverage bound (inclusive, percent) of [`Severity::Moderate`].
    pub const MODERATE_FROM: f64 = 1.0;

    /// Lower coverage bound (inclusive, percent) of [`Severity::Critical`].
    pub const CRITICAL_FROM: f64 = 3.0;

    /// Select the tier for a crack coverage given in percent.
    ///
    /// Compares the unrounded numeric value against the breakpoints, so
    /// a coverage of 0.996% is [`Severity::Minor`] even though it is
    /// displayed as `1.00`.
    #[must_use]
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= Self::CRITICAL_FROM {
            Self::Critical
        } else if percentage >= Self::MODERATE_FROM {
            Self::Moderate
        } else {
            Self::Minor
        }
    }

    /// Maintenance recommendation for this tier.
    #[must_use]
    pub const fn recommendation(self) -> &'static str {
        match self {
            Self::Critical => "Immediate repair required",
            Self::Moderate => "Schedule maintenance soon",
            Self::Minor => "Monitor regularly",
        }
    }

    /// Display name of the tier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minor => "Minor",
            Self::Moderate => "Moderate",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary metrics of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Number of pixels classified as crack pixels.
    pub crack_pixel_count: u64,
    /// Total pixel count (`width * height`), always positive.
    pub total_pixels: u64,
    /// Crack coverage in percent, rounded to two decimals.
    pub crack_percentage: f64,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Severity tier, selected from the unrounded coverage.
    pub severity: Severity,
    /// Maintenance recommendation matching `severity`.
    pub recommendation: String,
}

impl Metrics {
    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Coverage formatted with exactly two decimals, e.g. `"0.00"`.
    #[must_use]
    pub fn percentage_label(&self) -> String {
        format!("{:.2}", self.crack_percentage)
    }

    /// Image size formatted as `"W x H"`.
    #[must_use]
    pub fn dimensions_label(&self) -> String {
        self.dimensions().to_string()
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Analysis Report\n{}", "=".repeat(40))?;
        writeln!(f, "{:<18} {}%", "Crack coverage:", self.percentage_label())?;
        writeln!(f, "{:<18} {}", "Severity:", self.severity)?;
        writeln!(f, "{:<18} {}", "Image size:", self.dimensions_label())?;
        writeln!(f, "{:<18} {}", "Crack pixels:", self.crack_pixel_count)?;
        write!(f, "{:<18} {}", "Recommendation:", self.recommendation)
    }
}

/// Output of [`analyze`](crate::analyze): the annotated image and its
/// metrics.
///
/// Crack pixels are painted pure red; every other pixel carries its
/// grayscale luminance. Alpha matches the input.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Annotated RGBA image, same dimensions as the input.
    pub annotated: RgbaImage,
    /// Summary metrics and severity verdict.
    pub metrics: Metrics,
}

/// Result of running the pipeline with all intermediate stage outputs
/// preserved.
///
/// Uses custom `Serialize`/`Deserialize` implementations because
/// `GrayImage` and `RgbaImage` do not implement serde traits. Raster
/// images are serialized as `(width, height, raw_pixels)` tuples.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Stage 0: the caller's image, untouched.
    pub original: RgbaImage,
    /// Stage 1: balanced grayscale (R == G == B), alpha preserved.
    pub grayscale: RgbaImage,
    /// Stage 2: clamped Sobel gradient magnitude, zero on the border.
    pub edges: GrayImage,
    /// Stage 3: grayscale with crack pixels painted red.
    pub annotated: RgbaImage,
    /// Summary metrics and severity verdict.
    pub metrics: Metrics,
}

impl StagedResult {
    /// Drop the intermediates, keeping only what [`analyze`](crate::analyze)
    /// returns.
    #[must_use]
    pub fn into_analysis(self) -> Analysis {
        Analysis {
            annotated: self.annotated,
            metrics: self.metrics,
        }
    }
}

/// Serde-compatible proxy for `StagedResult`.
#[derive(Serialize, Deserialize)]
struct StagedResultProxy {
    original: (u32, u32, Vec<u8>),
    grayscale: (u32, u32, Vec<u8>),
    edges: (u32, u32, Vec<u8>),
    annotated: (u32, u32, Vec<u8>),
    metrics: Metrics,
}

impl Serialize for StagedResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = StagedResultProxy {
            original: (
                self.original.width(),
                self.original.height(),
                self.original.as_raw().clone(),
            ),
            grayscale: (
                self.grayscale.width(),
                self.grayscale.height(),
                self.grayscale.as_raw().clone(),
            ),
            edges: (
                self.edges.width(),
                self.edges.height(),
                self.edges.as_raw().clone(),
            ),
            annotated: (
                self.annotated.width(),
                self.annotated.height(),
                self.annotated.as_raw().clone(),
            ),
            metrics: self.metrics.clone(),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StagedResult {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = StagedResultProxy::deserialize(deserializer)?;

        let original = RgbaImage::from_raw(proxy.original.0, proxy.original.1, proxy.original.2)
            .ok_or_else(|| serde::de::Error::custom("invalid original image dimensions"))?;
        let grayscale =
            RgbaImage::from_raw(proxy.grayscale.0, proxy.grayscale.1, proxy.grayscale.2)
                .ok_or_else(|| serde::de::Error::custom("invalid grayscale image dimensions"))?;
        let edges = GrayImage::from_raw(proxy.edges.0, proxy.edges.1, proxy.edges.2)
            .ok_or_else(|| serde::de::Error::custom("invalid edges image dimensions"))?;
        let annotated =
            RgbaImage::from_raw(proxy.annotated.0, proxy.annotated.1, proxy.annotated.2)
                .ok_or_else(|| serde::de::Error::custom("invalid annotated image dimensions"))?;

        Ok(Self {
            original,
            grayscale,
            edges,
            annotated,
            metrics: proxy.metrics,
        })
    }
}

/// Errors that can occur during analysis.
///
/// Every variant belongs to the invalid-input class: the pipeline
/// checks its preconditions up front and performs no partial work.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum PipelineError {
    /// Width or height is zero.
    #[error("invalid input: image dimensions must be positive, got {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// The pixel buffer length is not `width * height * 4`.
    #[error(
        "invalid input: pixel buffer holds {actual} bytes, expected {expected} for a {width}x{height} RGBA image"
    )]
    BufferLengthMismatch {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// Required byte length.
        expected: u64,
        /// Supplied byte length.
        actual: u64,
    },
}

impl PipelineError {
    /// Whether this error is a rejected precondition on the input.
    ///
    /// Always `true` for the current variants.
    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidDimensions { .. } | Self::BufferLengthMismatch { .. }
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Severity tests ---

    #[test]
    fn severity_tier_boundaries() {
        assert_eq!(Severity::from_percentage(0.0), Severity::Minor);
        assert_eq!(Severity::from_percentage(0.5), Severity::Minor);
        assert_eq!(Severity::from_percentage(0.999), Severity::Minor);
        assert_eq!(Severity::from_percentage(1.0), Severity::Moderate);
        assert_eq!(Severity::from_percentage(2.99), Severity::Moderate);
        assert_eq!(Severity::from_percentage(3.0), Severity::Critical);
        assert_eq!(Severity::from_percentage(50.0), Severity::Critical);
        assert_eq!(Severity::from_percentage(100.0), Severity::Critical);
    }

    #[test]
    fn severity_is_monotonic() {
        let mut previous = Severity::Minor;
        for step in 0..=1000 {
            let pct = f64::from(step) / 100.0;
            let tier = Severity::from_percentage(pct);
            assert!(tier >= previous, "tier dropped at {pct}%");
            previous = tier;
        }
    }

    #[test]
    fn severity_recommendations() {
        assert_eq!(
            Severity::Critical.recommendation(),
            "Immediate repair required"
        );
        assert_eq!(
            Severity::Moderate.recommendation(),
            "Schedule maintenance soon"
        );
        assert_eq!(Severity::Minor.recommendation(), "Monitor regularly");
    }

    #[test]
    fn severity_display_matches_name() {
        assert_eq!(Severity::Minor.to_string(), "Minor");
        assert_eq!(Severity::Critical.to_string(), "Critical");
    }

    // --- Dimensions tests ---

    #[test]
    fn dimensions_pixel_count_does_not_overflow() {
        let dims = Dimensions {
            width: u32::MAX,
            height: 2,
        };
        assert_eq!(dims.pixel_count(), u64::from(u32::MAX) * 2);
    }

    #[test]
    fn dimensions_interior() {
        let small = Dimensions {
            width: 2,
            height: 10,
        };
        let ok = Dimensions {
            width: 3,
            height: 3,
        };
        assert!(!small.has_interior());
        assert!(ok.has_interior());
    }

    // --- Metrics tests ---

    fn sample_metrics() -> Metrics {
        Metrics {
            crack_pixel_count: 1234,
            total_pixels: 10_000,
            crack_percentage: 12.34,
            width: 100,
            height: 100,
            severity: Severity::Critical,
            recommendation: Severity::Critical.recommendation().to_string(),
        }
    }

    #[test]
    fn metrics_labels() {
        let m = sample_metrics();
        assert_eq!(m.percentage_label(), "12.34");
        assert_eq!(m.dimensions_label(), "100 x 100");
    }

    #[test]
    fn percentage_label_pads_zero() {
        let m = Metrics {
            crack_pixel_count: 0,
            crack_percentage: 0.0,
            severity: Severity::Minor,
            ..sample_metrics()
        };
        assert_eq!(m.percentage_label(), "0.00");
    }

    #[test]
    fn metrics_report_lists_all_fields() {
        let report = sample_metrics().to_string();
        assert!(report.contains("Analysis Report"));
        assert!(report.contains("12.34%"));
        assert!(report.contains("Critical"));
        assert!(report.contains("100 x 100"));
        assert!(report.contains("1234"));
        assert!(report.contains("Immediate repair required"));
    }

    #[test]
    fn metrics_serde_round_trip() {
        let m = sample_metrics();
        let json = serde_json::to_string(&m).unwrap();
        let back: Metrics = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }

    // --- PipelineConfig tests ---

    #[test]
    fn config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.threshold, 100);
        assert!(config.parallel);
    }

    #[test]
    fn config_missing_fields_take_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"threshold": 80}"#).unwrap();
        assert_eq!(config.threshold, 80);
        assert_eq!(config.parallel, PipelineConfig::DEFAULT_PARALLEL);
    }

    // --- StagedResult tests ---

    #[test]
    fn staged_result_serde_round_trip() {
        let original = RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        let staged = StagedResult {
            grayscale: original.clone(),
            edges: GrayImage::new(3, 2),
            annotated: original.clone(),
            original,
            metrics: sample_metrics(),
        };
        let json = serde_json::to_string(&staged).unwrap();
        let back: StagedResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.original, staged.original);
        assert_eq!(back.edges, staged.edges);
        assert_eq!(back.metrics, staged.metrics);
    }

    #[test]
    fn staged_result_rejects_bad_raster() {
        let json = r#"{
            "original": [2, 2, [0, 0, 0]],
            "grayscale": [1, 1, [0, 0, 0, 0]],
            "edges": [1, 1, [0]],
            "annotated": [1, 1, [0, 0, 0, 0]],
            "metrics": {
                "crack_pixel_count": 0, "total_pixels": 1, "crack_percentage": 0.0,
                "width": 1, "height": 1, "severity": "Minor",
                "recommendation": "Monitor regularly"
            }
        }"#;
        let result: Result<StagedResult, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    // --- PipelineError tests ---

    #[test]
    fn error_messages_name_the_problem() {
        let err = PipelineError::InvalidDimensions {
            width: 0,
            height: 5,
        };
        assert!(err.to_string().contains("0x5"));
        assert!(err.is_invalid_input());

        let err = PipelineError::BufferLengthMismatch {
            width: 2,
            height: 2,
            expected: 16,
            actual: 12,
        };
        let msg = err.to_string();
        assert!(msg.contains("12 bytes"));
        assert!(msg.contains("expected 16"));
    }

    #[test]
    fn error_serde_round_trip() {
        let err = PipelineError::BufferLengthMismatch {
            width: 3,
            height: 1,
            expected: 12,
            actual: 11,
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
