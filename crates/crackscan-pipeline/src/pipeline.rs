//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::analyze`] which runs the whole analysis in one call
//! and returns only the annotated image and metrics, [`Pipeline`] lets
//! the caller drive execution one step at a time:
//!
//! ```rust
//! # use crackscan_pipeline::{Pipeline, PipelineConfig, PipelineError};
//! # fn run(pixels: Vec<u8>, width: u32, height: u32) -> Result<(), PipelineError> {
//! let config = PipelineConfig::default();
//! let staged = Pipeline::new(pixels, width, height, config)
//!     .grayscale()?
//!     .detect_edges()
//!     .classify()
//!     .into_result();
//! println!("{}", staged.metrics);
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for the one fallible stage), carrying all previously
//! computed intermediates.

use crate::diagnostics::{StageMetrics, magnitude_stats};
use crate::types::{
    Dimensions, GrayImage, Metrics, PipelineConfig, PipelineError, RgbaImage, StagedResult,
};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// The raw pixel buffer, its claimed dimensions and the config are
/// stored but not yet checked. Call [`grayscale`](Self::grayscale) to
/// advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing -- call .grayscale() to continue"]
pub struct Pending {
    config: PipelineConfig,
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl Pending {
    /// The raw RGBA source bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.pixels
    }

    /// Check the input and convert it to grayscale, advancing to the
    /// [`Grayscaled`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidDimensions`] if width or height
    /// is zero. Returns [`PipelineError::BufferLengthMismatch`] if the
    /// buffer is not `width * height * 4` bytes long.
    pub fn grayscale(self) -> Result<Grayscaled, PipelineError> {
        let dimensions = crate::validate(self.pixels.len(), self.width, self.height)?;
        let original = RgbaImage::from_raw(self.width, self.height, self.pixels).ok_or(
            PipelineError::InvalidDimensions {
                width: self.width,
                height: self.height,
            },
        )?;
        let grayscale = crate::grayscale::to_grayscale(&original);
        tracing::debug!(
            width = dimensions.width,
            height = dimensions.height,
            "grayscale conversion done"
        );
        Ok(Grayscaled {
            config: self.config,
            original,
            grayscale,
            dimensions,
        })
    }
}

// ───────────────────────── Stage 1: Grayscaled ───────────────────────

/// Pipeline state after grayscale conversion.
///
/// Call [`detect_edges`](Self::detect_edges) to advance to the next
/// stage.
#[must_use = "pipeline stages are consumed by advancing -- call .detect_edges() to continue"]
pub struct Grayscaled {
    config: PipelineConfig,
    original: RgbaImage,
    grayscale: RgbaImage,
    dimensions: Dimensions,
}

impl Grayscaled {
    /// The caller's image, untouched.
    #[must_use]
    pub const fn original(&self) -> &RgbaImage {
        &self.original
    }

    /// The balanced grayscale image.
    #[must_use]
    pub const fn grayscale(&self) -> &RgbaImage {
        &self.grayscale
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub(crate) const fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::Grayscale {
            width: self.dimensions.width,
            height: self.dimensions.height,
        }
    }

    /// Advance to the edge detection stage.
    ///
    /// Computes the Sobel gradient magnitude map; the border ring stays
    /// at zero.
    pub fn detect_edges(self) -> EdgesDetected {
        let edges = crate::edge::sobel_magnitude(&self.grayscale, self.config.parallel);
        tracing::debug!(parallel = self.config.parallel, "edge detection done");
        EdgesDetected {
            config: self.config,
            original: self.original,
            grayscale: self.grayscale,
            edges,
            dimensions: self.dimensions,
        }
    }
}

// ───────────────────────── Stage 2: EdgesDetected ────────────────────

/// Pipeline state after Sobel edge detection.
///
/// Call [`classify`](Self::classify) to advance to the final stage.
#[must_use = "pipeline stages are consumed by advancing -- call .classify() to continue"]
pub struct EdgesDetected {
    config: PipelineConfig,
    original: RgbaImage,
    grayscale: RgbaImage,
    edges: GrayImage,
    dimensions: Dimensions,
}

impl EdgesDetected {
    /// The gradient magnitude map.
    #[must_use]
    pub const fn edges(&self) -> &GrayImage {
        &self.edges
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub(crate) fn stage_metrics(&self) -> StageMetrics {
        let stats = magnitude_stats(&self.edges);
        StageMetrics::EdgeDetection {
            parallel: self.config.parallel,
            interior_pixel_count: stats.interior,
            max_magnitude: stats.max,
            mean_magnitude: stats.mean,
        }
    }

    /// Advance to the classification stage.
    ///
    /// Thresholds the magnitude map, paints crack pixels and computes
    /// the summary metrics.
    pub fn classify(self) -> Classified {
        let (annotated, crack_pixels) =
            crate::classify::annotate(&self.edges, &self.grayscale, self.config.threshold);
        let metrics = crate::classify::summarize(crack_pixels, self.dimensions);
        tracing::debug!(
            crack_pixels,
            percentage = metrics.crack_percentage,
            severity = %metrics.severity,
            "classification done"
        );
        Classified {
            config: self.config,
            original: self.original,
            grayscale: self.grayscale,
            edges: self.edges,
            annotated,
            metrics,
        }
    }
}

// ───────────────────────── Stage 3: Classified ───────────────────────

/// Final pipeline state: crack pixels painted and metrics computed.
#[must_use = "call .into_result() to obtain the StagedResult"]
pub struct Classified {
    config: PipelineConfig,
    original: RgbaImage,
    grayscale: RgbaImage,
    edges: GrayImage,
    annotated: RgbaImage,
    metrics: Metrics,
}

impl Classified {
    /// The annotated image.
    #[must_use]
    pub const fn annotated(&self) -> &RgbaImage {
        &self.annotated
    }

    /// Summary metrics and severity verdict.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub(crate) const fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::Classification {
            threshold: self.config.threshold,
            crack_pixel_count: self.metrics.crack_pixel_count,
            total_pixel_count: self.metrics.total_pixels,
        }
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            original: self.original,
            grayscale: self.grayscale,
            edges: self.edges,
            annotated: self.annotated,
            metrics: self.metrics,
        }
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 4;

/// The output produced by a single pipeline stage.
#[must_use]
pub enum StageOutput<'a> {
    /// Source bytes (not yet checked).
    Source {
        /// The raw RGBA bytes.
        bytes: &'a [u8],
    },
    /// Grayscale conversion result.
    Grayscaled {
        /// The balanced grayscale image.
        grayscale: &'a RgbaImage,
    },
    /// Edge detection result.
    EdgesDetected {
        /// The gradient magnitude map.
        edges: &'a GrayImage,
    },
    /// Classification result.
    Classified {
        /// The annotated image.
        annotated: &'a RgbaImage,
        /// The summary metrics.
        metrics: &'a Metrics,
    },
}

/// Trait implemented by every pipeline stage, enabling uniform iteration.
///
/// Both the typed API (individual stage structs) and the dynamic API
/// ([`Stage`] enum) are available. This trait bridges the two.
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage (e.g. `"source"`, `"edges"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Pending through `3` for
    /// Classified).
    const INDEX: usize;

    /// The output this stage produced.
    fn output(&self) -> StageOutput<'_>;

    /// Stage-specific metrics for diagnostics.
    ///
    /// Returns `None` for the initial [`Pending`] stage which has not
    /// yet performed any processing.
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next stage.
    ///
    /// Returns `Ok(Some(stage))` on success, `Ok(None)` if already at
    /// the final stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the input fails validation.
    fn next(self) -> Result<Option<Stage>, PipelineError>;

    /// Run all remaining stages to completion and return the final
    /// [`StagedResult`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the input fails validation.
    fn complete(self) -> Result<StagedResult, PipelineError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Source {
            bytes: &self.pixels,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Grayscaled(self.grayscale()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.grayscale()?.complete()
    }
}

impl PipelineStage for Grayscaled {
    const NAME: &str = "grayscale";
    const INDEX: usize = 1;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Grayscaled {
            grayscale: &self.grayscale,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::EdgesDetected(self.detect_edges())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.detect_edges().complete()
    }
}

impl PipelineStage for EdgesDetected {
    const NAME: &str = "edges";
    const INDEX: usize = 2;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::EdgesDetected { edges: &self.edges }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Classified(self.classify())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.classify().complete()
    }
}

impl PipelineStage for Classified {
    const NAME: &str = "classify";
    const INDEX: usize = 3;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Classified {
            annotated: &self.annotated,
            metrics: &self.metrics,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(None)
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        Ok(self.into_result())
    }
}

/// Enum wrapping all pipeline stages for uniform, loopable access.
///
/// ```rust
/// # use crackscan_pipeline::{Pipeline, PipelineConfig, PipelineError};
/// # use crackscan_pipeline::pipeline::{Stage, Advance};
/// # fn run(pixels: Vec<u8>) -> Result<(), PipelineError> {
/// let mut stage: Stage = Pipeline::new(pixels, 4, 4, PipelineConfig::default()).into();
/// loop {
///     match stage.advance()? {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let result = stage.complete()?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Grayscaled`].
    Grayscaled(Grayscaled),
    /// See [`EdgesDetected`].
    EdgesDetected(EdgesDetected),
    /// See [`Classified`].
    Classified(Classified),
}

/// Compile-time guard: adding a [`Stage`] variant breaks this match,
/// which is the reminder to bump [`STAGE_COUNT`].
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Pending(_)
        | Stage::Grayscaled(_)
        | Stage::EdgesDetected(_)
        | Stage::Classified(_) => {}
    }
}

/// Result of [`Stage::advance`]: either the next stage or the
/// completed final stage returned unchanged.
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this next stage.
    Next(Stage),
    /// The pipeline was already at the final stage.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::Grayscaled(s) => s.$method($($arg),*),
            Self::EdgesDetected(s) => s.$method($($arg),*),
            Self::Classified(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// Human-readable name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// The output this stage produced.
    pub fn output(&self) -> StageOutput<'_> {
        delegate!(self, output)
    }

    /// Stage-specific metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        // `Classified::metrics` is the inherent summary accessor, so the
        // trait method is named explicitly here.
        match self {
            Self::Pending(s) => PipelineStage::metrics(s),
            Self::Grayscaled(s) => PipelineStage::metrics(s),
            Self::EdgesDetected(s) => PipelineStage::metrics(s),
            Self::Classified(s) => PipelineStage::metrics(s),
        }
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Classified(_))
    }

    /// Advance to the next stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the input fails validation.
    pub fn next(self) -> Result<Option<Self>, PipelineError> {
        delegate!(self, next)
    }

    /// Advance to the next stage, returning `self` unchanged if
    /// already complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the input fails validation.
    pub fn advance(self) -> Result<Advance, PipelineError> {
        match self {
            Self::Classified(_) => Ok(Advance::Complete(self)),
            Self::Pending(s) => Ok(Advance::Next(Self::Grayscaled(s.grayscale()?))),
            Self::Grayscaled(s) => Ok(Advance::Next(Self::EdgesDetected(s.detect_edges()))),
            Self::EdgesDetected(s) => Ok(Advance::Next(Self::Classified(s.classify()))),
        }
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the input fails validation.
    pub fn complete(self) -> Result<StagedResult, PipelineError> {
        delegate!(self, complete)
    }
}

// Private helper so the macro can call `.name()` and `.index()` on
// `&self`; associated constants aren't reachable via `self.NAME`.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }
}

impl From<Pending> for Stage {
    fn from(s: Pending) -> Self {
        Self::Pending(s)
    }
}

impl From<Grayscaled> for Stage {
    fn from(s: Grayscaled) -> Self {
        Self::Grayscaled(s)
    }
}

impl From<EdgesDetected> for Stage {
    fn from(s: EdgesDetected) -> Self {
        Self::EdgesDetected(s)
    }
}

impl From<Classified> for Stage {
    fn from(s: Classified) -> Self {
        Self::Classified(s)
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental crack analysis pipeline.
///
/// Created via [`Pipeline::new`] (raw bytes) or [`Pipeline::from_image`]
/// (an already decoded image). Each stage method consumes the current
/// state and returns the next, making it a compile-time error to skip
/// stages or call them out of order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from a raw RGBA buffer and its dimensions.
    ///
    /// Nothing is checked yet; validation happens when advancing to
    /// [`Grayscaled`].
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(pixels: Vec<u8>, width: u32, height: u32, config: PipelineConfig) -> Pending {
        Pending {
            config,
            pixels,
            width,
            height,
        }
    }

    /// Create a new pipeline from a decoded RGBA image.
    pub fn from_image(image: RgbaImage, config: PipelineConfig) -> Pending {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, config)
    }
}
