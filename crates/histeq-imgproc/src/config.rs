use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::INTENSITY_LEVELS;

/// How the histogram is accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistogramStrategy {
    /// One work-item per pixel incrementing the shared histogram atomically.
    #[default]
    Atomic,
    /// Each work-group counts into a private histogram, then merges it into the
    /// shared one. Fewer contended updates on the shared counters.
    Local {
        /// pixels per work-group
        group_size: usize,
    },
}

/// How the cumulative histogram is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStrategy {
    /// Hillis-Steele scan: one dispatch per doubling offset.
    #[default]
    HillisSteele,
    /// Sequential accumulation in a single work-group.
    Serial,
}

/// Configuration of an equalization run.
///
/// # Example
///
/// ```
/// use histeq_imgproc::{EqualizeConfig, HistogramStrategy, ScanStrategy};
///
/// let config = EqualizeConfig::from_json(
///     r#"{ "bins": 64, "histogram": { "local": { "group_size": 1024 } } }"#,
/// ).unwrap();
///
/// assert_eq!(config.bins, 64);
/// assert_eq!(config.histogram, HistogramStrategy::Local { group_size: 1024 });
/// assert_eq!(config.scan, ScanStrategy::HillisSteele);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualizeConfig {
    /// Number of histogram bins, `1..=256`.
    pub bins: usize,
    /// Histogram accumulation strategy.
    pub histogram: HistogramStrategy,
    /// Scan strategy.
    pub scan: ScanStrategy,
}

impl Default for EqualizeConfig {
    fn default() -> Self {
        Self {
            bins: INTENSITY_LEVELS,
            histogram: HistogramStrategy::default(),
            scan: ScanStrategy::default(),
        }
    }
}

impl EqualizeConfig {
    /// A configuration with `bins` bins and default strategies.
    pub fn new(bins: usize) -> Self {
        Self {
            bins,
            ..Default::default()
        }
    }

    /// Set the histogram strategy.
    pub fn with_histogram(mut self, histogram: HistogramStrategy) -> Self {
        self.histogram = histogram;
        self
    }

    /// Set the scan strategy.
    pub fn with_scan(mut self, scan: ScanStrategy) -> Self {
        self.scan = scan;
        self
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the bin count is outside `1..=256` or the local
    /// histogram work-group size is zero.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.bins == 0 || self.bins > INTENSITY_LEVELS {
            return Err(PipelineError::InvalidBinCount(self.bins));
        }

        if let HistogramStrategy::Local { group_size: 0 } = self.histogram {
            return Err(PipelineError::InvalidGroupSize(0));
        }

        Ok(())
    }

    /// Parse and validate a JSON configuration. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
