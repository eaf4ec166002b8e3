//! crackscan-bench: CLI tool for crack analysis and pipeline diagnostics.
//!
//! Decodes an image file, runs the crack detection pipeline on it and
//! prints the analysis report together with per-stage diagnostics.
//! Useful for:
//!
//! - Grading a single photo of a surface
//! - Tuning the classification threshold
//! - Comparing the parallel and sequential Sobel passes
//! - Measuring per-stage durations to identify bottlenecks
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin crackscan-bench -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use crackscan_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use crackscan_pipeline::{Metrics, PipelineConfig, RgbaImage};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Crack detection and pipeline diagnostics for crackscan.
///
/// Runs the analysis pipeline on a given image and prints the severity
/// report plus per-stage timing diagnostics.
#[derive(Parser)]
#[command(name = "crackscan-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Gradient magnitude a pixel must exceed to count as a crack (0-255).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_THRESHOLD)]
    threshold: u8,

    /// Compute the Sobel pass on a single thread.
    #[arg(long)]
    sequential: bool,

    /// Write the annotated image to this PNG file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output metrics and diagnostics as JSON instead of human-readable
    /// reports.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, `--threshold` and `--sequential` are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        threshold: cli.threshold,
        parallel: !cli.sequential,
    })
}

/// One run's machine-readable output.
#[derive(Serialize)]
struct RunReport<'a> {
    metrics: &'a Metrics,
    diagnostics: &'a PipelineDiagnostics,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn decode(path: &Path) -> Result<RgbaImage, String> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|e| format!("Error decoding {}: {e}", path.display()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            tracing::error!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image = match decode(&cli.image_path) {
        Ok(image) => image,
        Err(msg) => {
            tracing::error!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let (width, height) = image.dimensions();

    tracing::info!(
        path = %cli.image_path.display(),
        width,
        height,
        threshold = config.threshold,
        parallel = config.parallel,
        runs = cli.runs,
        "starting analysis"
    );

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match crackscan_pipeline::analyze_with_diagnostics(
            image.as_raw(),
            width,
            height,
            &config,
            &StdClock,
        ) {
            Ok((staged, diagnostics)) => {
                if cli.json {
                    let report = RunReport {
                        metrics: &staged.metrics,
                        diagnostics: &diagnostics,
                    };
                    match serde_json::to_string_pretty(&report) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            tracing::error!("Error serializing report: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", staged.metrics);
                    println!();
                    println!("{}", diagnostics.report());
                }

                // Write the annotated image on the first run only.
                if run == 0
                    && let Some(ref output) = cli.output
                {
                    match staged
                        .annotated
                        .save_with_format(output, image::ImageFormat::Png)
                    {
                        Ok(()) => {
                            tracing::info!(path = %output.display(), "annotated image written");
                        }
                        Err(e) => {
                            tracing::error!("Error writing {}: {e}", output.display());
                            return ExitCode::FAILURE;
                        }
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                tracing::error!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&PipelineDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Grayscale", |d| d.grayscale.duration),
        ("Edge Detection", |d| d.edge_detection.duration),
        ("Classification", |d| d.classification.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
