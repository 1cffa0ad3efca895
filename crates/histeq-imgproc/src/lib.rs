#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// pipeline configuration and stage strategies.
pub mod config;

/// error types of the pipeline.
pub mod error;

/// histogram accumulation stage.
pub mod histogram;

/// intensity lookup table normalization stage.
pub mod lut;

/// pipeline orchestration.
pub mod pipeline;

/// lookup table application stage.
pub mod remap;

/// cumulative histogram (inclusive scan) stage.
pub mod scan;

pub use crate::config::{EqualizeConfig, HistogramStrategy, ScanStrategy};
pub use crate::error::{PipelineError, Stage};
pub use crate::pipeline::{equalize, program_source, Equalized, Equalizer, StageOutput, StageTiming};

/// Number of intensity levels of an 8-bit image, and the length of the lookup table.
pub const INTENSITY_LEVELS: usize = 256;
