//! Pipeline diagnostics: timing and per-stage metrics.
//!
//! Every call to [`analyze_with_diagnostics`] collects diagnostics
//! alongside the analysis. Time is read through the [`Clock`] trait so
//! this crate stays free of platform time sources; callers supply
//! `std::time::Instant` (native) or whatever their runtime offers.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::Pipeline;
use crate::types::{GrayImage, PipelineConfig, PipelineError, Severity, StagedResult};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of monotonic time for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: input validation and grayscale conversion.
    pub grayscale: StageDiagnostics,
    /// Stage 2: Sobel gradient magnitude.
    pub edge_detection: StageDiagnostics,
    /// Stage 3: thresholding, annotation and metrics.
    pub classification: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary of the run.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Grayscale conversion metrics.
    Grayscale {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// Sobel edge detection metrics.
    EdgeDetection {
        /// Whether rows were computed in parallel.
        parallel: bool,
        /// Number of pixels the convolution was applied to.
        interior_pixel_count: u64,
        /// Largest stored (clamped) magnitude.
        max_magnitude: u8,
        /// Mean stored magnitude over interior pixels.
        mean_magnitude: f64,
    },
    /// Crack classification metrics.
    Classification {
        /// Threshold the magnitude had to exceed.
        threshold: u8,
        /// Number of crack pixels.
        crack_pixel_count: u64,
        /// Total pixel count.
        total_pixel_count: u64,
    },
}

/// High-level summary for the entire run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Image width in pixels.
    pub image_width: u32,
    /// Image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Number of crack pixels.
    pub crack_pixel_count: u64,
    /// Crack coverage in percent, rounded to two decimals.
    pub crack_percentage: f64,
    /// Severity verdict.
    pub severity: Severity,
}

/// Run the staged pipeline, timing every stage.
///
/// # Errors
///
/// Returns [`PipelineError`] when the input fails validation; no stage
/// after the failure runs.
pub fn analyze_with_diagnostics<C: Clock>(
    pixels: &[u8],
    width: u32,
    height: u32,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let start = clock.now();

    let t = clock.now();
    let grayscaled = Pipeline::new(pixels.to_vec(), width, height, config.clone()).grayscale()?;
    let grayscale = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: grayscaled.stage_metrics(),
    };

    let t = clock.now();
    let edges = grayscaled.detect_edges();
    let edge_detection = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: edges.stage_metrics(),
    };

    let t = clock.now();
    let classified = edges.classify();
    let classification = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: classified.stage_metrics(),
    };

    let staged = classified.into_result();
    let total_duration = clock.elapsed(&start);
    let metrics = &staged.metrics;
    let diagnostics = PipelineDiagnostics {
        grayscale,
        edge_detection,
        classification,
        total_duration,
        summary: PipelineSummary {
            image_width: metrics.width,
            image_height: metrics.height,
            pixel_count: metrics.total_pixels,
            crack_pixel_count: metrics.crack_pixel_count,
            crack_percentage: metrics.crack_percentage,
            severity: metrics.severity,
        },
    };
    tracing::debug!(
        total_ms = duration_ms(total_duration),
        "pipeline diagnostics collected"
    );
    Ok((staged, diagnostics))
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Grayscale", &self.grayscale),
            ("Edge Detection", &self.edge_detection),
            ("Classification", &self.classification),
        ];

        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Crack pixels: {}  |  Coverage: {:.2}%  |  Severity: {}",
            self.summary.crack_pixel_count, self.summary.crack_percentage, self.summary.severity,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Grayscale { width, height } => format!("{width}x{height}"),
        StageMetrics::EdgeDetection {
            parallel,
            interior_pixel_count,
            max_magnitude,
            mean_magnitude,
        } => {
            let mode = if *parallel { "parallel" } else { "sequential" };
            format!(
                "{mode} interior={interior_pixel_count} max={max_magnitude} mean={mean_magnitude:.2}",
            )
        }
        StageMetrics::Classification {
            threshold,
            crack_pixel_count,
            total_pixel_count,
        } => {
            format!("threshold={threshold} cracks={crack_pixel_count}/{total_pixel_count}")
        }
    }
}

/// Summary statistics of a gradient magnitude map.
pub(crate) struct MagnitudeStats {
    /// Number of interior (convolved) pixels.
    pub interior: u64,
    /// Largest magnitude.
    pub max: u8,
    /// Mean magnitude over interior pixels.
    pub mean: f64,
}

/// Compute magnitude statistics over the interior of an edge map.
pub(crate) fn magnitude_stats(edges: &GrayImage) -> MagnitudeStats {
    let (width, height) = edges.dimensions();
    let interior = u64::from(width.saturating_sub(2)) * u64::from(height.saturating_sub(2));
    let max = edges.pixels().map(|p| p.0[0]).max().unwrap_or(0);
    // Border pixels are zero, so summing everything sums the interior.
    let sum: u64 = edges.pixels().map(|p| u64::from(p.0[0])).sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = if interior == 0 {
        0.0
    } else {
        sum as f64 / interior as f64
    };
    MagnitudeStats {
        interior,
        max,
        mean,
    }
}
