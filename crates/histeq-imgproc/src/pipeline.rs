use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use histeq_compute::{
    AccessMode, Buffer, ComputeBackend, ComputeError, DeviceElement, Event, Program,
    ProfilingResolution, ProgramSource,
};
use histeq_image::Image;

use crate::config::{EqualizeConfig, HistogramStrategy};
use crate::error::{PipelineError, Stage};
use crate::histogram::{build_histogram, HIST_ATOMIC, HIST_LOCAL};
use crate::lut::{min_nonzero, normalize_lut, LUT_NORMALIZE};
use crate::remap::{remap, REMAP};
use crate::scan::{cumulative_histogram, SCAN_HS_STEP, SCAN_SERIAL};

/// Options the equalization program is built with.
pub const BUILD_OPTIONS: &str = "-Werror";

/// The device result of a stage and the events of its dispatches.
#[derive(Debug)]
pub struct StageOutput<T> {
    /// the buffer produced by the stage
    pub output: T,
    /// one event per dispatch, in submission order
    pub events: Vec<Event>,
}

/// Profiling of one stage of a run.
#[derive(Debug, Clone)]
pub struct StageTiming {
    /// the stage
    pub stage: Stage,
    /// the dispatches of the stage
    pub events: Vec<Event>,
}

impl StageTiming {
    /// Device execution time of the stage, summed over its dispatches.
    pub fn elapsed_ns(&self) -> u64 {
        self.events.iter().map(Event::duration_ns).sum()
    }

    /// One line per dispatch with its full profiling breakdown.
    pub fn report(&self, resolution: ProfilingResolution) -> String {
        self.events
            .iter()
            .map(|event| format!("{}: {}", event.kernel, event.profiling_info(resolution)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The kernels of the equalization pipeline.
pub fn program_source() -> ProgramSource {
    ProgramSource::new()
        .with_kernel(HIST_ATOMIC)
        .with_kernel(HIST_LOCAL)
        .with_kernel(SCAN_HS_STEP)
        .with_kernel(SCAN_SERIAL)
        .with_kernel(LUT_NORMALIZE)
        .with_kernel(REMAP)
}

/// The result of an equalization run.
#[derive(Debug, Clone)]
pub struct Equalized {
    /// The equalized image, same size as the input.
    pub image: Image<u8, 1>,
    /// The histogram, one count per bin.
    pub histogram: Vec<u32>,
    /// The inclusive scan of the histogram.
    pub cumulative: Vec<u32>,
    /// The intensity lookup table, 256 entries.
    pub lut: Vec<u8>,
    /// Profiling of each stage, in execution order.
    pub timings: Vec<StageTiming>,
}

impl Equalized {
    /// Device execution time of the whole run, in nanoseconds.
    pub fn elapsed_ns(&self) -> u64 {
        self.timings.iter().map(StageTiming::elapsed_ns).sum()
    }
}

/// Runs histogram equalization on a compute device.
///
/// The program is built once when the equalizer is created and reused for
/// every run. Each run owns its buffers; stages hand them forward and a
/// barrier separates consecutive stages.
///
/// # Example
///
/// ```
/// use histeq_compute::CpuBackend;
/// use histeq_image::{Image, ImageSize};
/// use histeq_imgproc::{EqualizeConfig, Equalizer};
///
/// let backend = CpuBackend::default_device()?;
/// let equalizer = Equalizer::new(&backend, EqualizeConfig::default())?;
///
/// let image = Image::<u8, 1>::new(
///     ImageSize { width: 2, height: 2 },
///     vec![0, 0, 255, 255],
/// )?;
///
/// let out = equalizer.equalize(&image)?;
/// assert_eq!(out.histogram[0], 2);
/// assert_eq!(out.cumulative[255], 4);
/// assert_eq!(out.image.as_slice(), &[0, 0, 255, 255]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Equalizer<'a, B: ComputeBackend> {
    backend: &'a B,
    program: Program,
    config: EqualizeConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, B: ComputeBackend> Equalizer<'a, B> {
    /// Create an equalizer and build its program on the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the local histogram
    /// work-group is larger than the device accepts, or the program fails to
    /// build. A build failure carries the full build log.
    pub fn new(backend: &'a B, config: EqualizeConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        if let HistogramStrategy::Local { group_size } = config.histogram {
            if group_size > backend.device().max_work_group_size {
                return Err(PipelineError::InvalidGroupSize(group_size));
            }
        }

        let program = backend
            .build_program(&program_source(), BUILD_OPTIONS)
            .map_err(PipelineError::Build)?;

        log::debug!(
            "equalizer ready on {}: {} bins, {:?} histogram, {:?} scan",
            backend.device().name,
            config.bins,
            config.histogram,
            config.scan
        );

        Ok(Self {
            backend,
            program,
            config,
            cancel: None,
        })
    }

    /// Check `flag` at every stage barrier and stop the run once it is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// The configuration of the equalizer.
    pub fn config(&self) -> &EqualizeConfig {
        &self.config
    }

    /// The built program.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Equalize the histogram of a grayscale image.
    ///
    /// Runs histogram, scan, normalization and remap in sequence. The input is
    /// never modified.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is empty or too large, the run was
    /// cancelled, or a stage failed on the device. No partial result is returned.
    pub fn equalize(&self, image: &Image<u8, 1>) -> Result<Equalized, PipelineError> {
        let num_pixels = image.numel();
        if num_pixels == 0 {
            return Err(PipelineError::EmptyImage(image.size()));
        }
        if num_pixels > u32::MAX as usize {
            return Err(PipelineError::ImageTooLarge(num_pixels));
        }

        self.check_cancelled(Stage::Histogram)?;
        let input = self
            .upload(image.as_slice())
            .map_err(|source| PipelineError::StageFailed {
                stage: Stage::Histogram,
                source,
            })?;

        let (hist, histogram, hist_timing) = self.run_stage(Stage::Histogram, || {
            build_histogram(
                self.backend,
                &self.program,
                &input,
                self.config.bins,
                self.config.histogram,
            )
        })?;

        let (cum, cumulative, scan_timing) = self.run_stage(Stage::Scan, || {
            cumulative_histogram(self.backend, &self.program, hist, self.config.scan)
        })?;

        let (lut, lut_host, lut_timing) = self.run_stage(Stage::Normalize, || {
            normalize_lut(self.backend, &self.program, cum)
        })?;

        if cumulative.last().copied().unwrap_or(0) <= min_nonzero(&cumulative) {
            log::warn!("all pixels fall in a single bin, each bin maps to its lower edge");
        }

        let (_, output, remap_timing) = self.run_stage(Stage::Remap, || {
            remap(self.backend, &self.program, &input, lut)
        })?;

        let image = Image::new(image.size(), output)?;
        let timings = vec![hist_timing, scan_timing, lut_timing, remap_timing];

        let equalized = Equalized {
            image,
            histogram,
            cumulative,
            lut: lut_host,
            timings,
        };

        log::info!(
            "equalized {} image in {} us",
            equalized.image.size(),
            equalized.elapsed_ns() / 1_000
        );

        Ok(equalized)
    }

    fn upload(&self, pixels: &[u8]) -> Result<Buffer<u8>, ComputeError> {
        let input = self
            .backend
            .create_buffer::<u8>(AccessMode::ReadOnly, pixels.len())?;
        self.backend.write_buffer(&input, pixels)?;
        Ok(input)
    }

    fn check_cancelled(&self, stage: Stage) -> Result<(), PipelineError> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => {
                log::debug!("cancelled before the {stage} stage");
                Err(PipelineError::Cancelled(stage))
            }
            _ => Ok(()),
        }
    }

    /// Run a stage, wait for it and read its result back to the host.
    fn run_stage<T, F>(
        &self,
        stage: Stage,
        run: F,
    ) -> Result<(Buffer<T>, Vec<T>, StageTiming), PipelineError>
    where
        T: DeviceElement,
        F: FnOnce() -> Result<StageOutput<Buffer<T>>, ComputeError>,
    {
        self.check_cancelled(stage)?;

        let failed = move |source| PipelineError::StageFailed { stage, source };

        let StageOutput { output, events } = run().map_err(failed)?;
        self.backend.finish().map_err(failed)?;
        let host = self.backend.read_buffer(&output).map_err(failed)?;

        let timing = StageTiming { stage, events };
        log::debug!(
            "{stage} stage: {} elements, {} dispatches, {} ns",
            host.len(),
            timing.events.len(),
            timing.elapsed_ns()
        );

        Ok((output, host, timing))
    }
}

/// Equalize the histogram of a grayscale image with `bins` bins.
///
/// Builds an [`Equalizer`] with default strategies and runs it once.
///
/// # Arguments
///
/// * `backend` - The device to run on.
/// * `image` - The input image.
/// * `bins` - The number of histogram bins, `1..=256`.
///
/// # Returns
///
/// The equalized image, its histogram, cumulative histogram and lookup table.
pub fn equalize<B: ComputeBackend>(
    backend: &B,
    image: &Image<u8, 1>,
    bins: usize,
) -> Result<Equalized, PipelineError> {
    Equalizer::new(backend, EqualizeConfig::new(bins))?.equalize(image)
}
