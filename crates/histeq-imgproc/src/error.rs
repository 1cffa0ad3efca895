use histeq_compute::ComputeError;
use histeq_image::{ImageError, ImageSize};

/// The stages of the equalization pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// histogram accumulation
    Histogram,
    /// inclusive scan of the histogram
    Scan,
    /// normalization into the lookup table
    Normalize,
    /// application of the lookup table
    Remap,
}

impl Stage {
    /// All stages, in execution order.
    pub const ALL: [Stage; 4] = [Stage::Histogram, Stage::Scan, Stage::Normalize, Stage::Remap];
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Histogram => "histogram",
            Stage::Scan => "cumulative histogram",
            Stage::Normalize => "lookup table",
            Stage::Remap => "remap",
        };
        write!(f, "{name}")
    }
}

/// An error type for the equalization pipeline.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// The bin count is outside `1..=256`.
    #[error("invalid histogram bin count {0}, expected 1..=256")]
    InvalidBinCount(usize),

    /// The work-group size of the local histogram strategy is invalid.
    #[error("invalid histogram work-group size {0}")]
    InvalidGroupSize(usize),

    /// The image has no pixels.
    #[error("image has no pixels: {0}")]
    EmptyImage(ImageSize),

    /// The image has more pixels than a 32-bit counter holds.
    #[error("image has {0} pixels, more than a 32-bit counter holds")]
    ImageTooLarge(usize),

    /// The kernels failed to build or could not be found.
    #[error("failed to build the equalization program: {0}")]
    Build(#[source] ComputeError),

    /// A stage failed on the device. Later stages did not run.
    #[error("{stage} stage failed: {source}")]
    StageFailed {
        /// the stage that failed
        stage: Stage,
        /// the device error
        #[source]
        source: ComputeError,
    },

    /// The run was cancelled before the stage started.
    #[error("cancelled before the {0} stage")]
    Cancelled(Stage),

    /// The output image could not be created.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// The configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
