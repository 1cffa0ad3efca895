use std::sync::atomic::Ordering;

use histeq_compute::kernel::cell;
use histeq_compute::{
    AccessMode, Buffer, ComputeBackend, ComputeError, ElementKind, KernelDef, KernelFault,
    NdRange, ParamKind, Program, WorkGroup,
};

use crate::config::HistogramStrategy;
use crate::pipeline::StageOutput;

const PARAMS: &[ParamKind] = &[
    ParamKind::Buffer {
        kind: ElementKind::U8,
        access: AccessMode::ReadOnly,
    },
    ParamKind::Buffer {
        kind: ElementKind::U32,
        access: AccessMode::ReadWrite,
    },
    ParamKind::Scalar,
];

/// One work-item per pixel, incrementing the shared histogram atomically.
///
/// Arguments: image (`u8`), histogram (`u32`, pre-zeroed), bin count.
pub const HIST_ATOMIC: KernelDef = KernelDef {
    name: "hist_atomic",
    params: PARAMS,
    body: hist_atomic,
};

/// Work-groups count into a private histogram and merge it into the shared one.
///
/// Same arguments as [`HIST_ATOMIC`].
pub const HIST_LOCAL: KernelDef = KernelDef {
    name: "hist_local",
    params: PARAMS,
    body: hist_local,
};

/// Map an intensity to its bin when the intensity range is split in `bins` bins.
///
/// With 256 bins every intensity has its own bin.
///
/// # Example
///
/// ```
/// use histeq_imgproc::histogram::bin_index;
///
/// assert_eq!(bin_index(200, 256), 200);
/// assert_eq!(bin_index(85, 3), 0);
/// assert_eq!(bin_index(86, 3), 1);
/// assert_eq!(bin_index(255, 3), 2);
/// ```
#[inline]
pub fn bin_index(intensity: u8, bins: u32) -> usize {
    (intensity as usize * bins as usize) >> 8
}

/// The smallest intensity that falls in `bin` when the range is split in `bins` bins.
///
/// # Example
///
/// ```
/// use histeq_imgproc::histogram::{bin_index, bin_lower_edge};
///
/// assert_eq!(bin_lower_edge(1, 3), 86);
/// assert_eq!(bin_index(86, 3), 1);
/// assert_eq!(bin_lower_edge(200, 256), 200);
/// ```
#[inline]
pub fn bin_lower_edge(bin: usize, bins: u32) -> u8 {
    (bin * 256).div_ceil(bins.max(1) as usize).min(255) as u8
}

fn hist_atomic(group: &WorkGroup<'_>) -> Result<(), KernelFault> {
    let image = group.u8_buffer(0)?;
    let hist = group.u32_buffer(1)?;
    let bins = group.scalar(2)?;

    for gid in group.global_ids() {
        let intensity = cell(image, 0, gid)?.load(Ordering::Relaxed);
        cell(hist, 1, bin_index(intensity, bins))?.fetch_add(1, Ordering::Relaxed);
    }

    Ok(())
}

fn hist_local(group: &WorkGroup<'_>) -> Result<(), KernelFault> {
    let image = group.u8_buffer(0)?;
    let hist = group.u32_buffer(1)?;
    let bins = group.scalar(2)?;

    let mut local = vec![0u32; bins as usize];
    for gid in group.global_ids() {
        let intensity = cell(image, 0, gid)?.load(Ordering::Relaxed);
        let bin = bin_index(intensity, bins);
        *cell_mut(&mut local, bin)? += 1;
    }

    for (bin, &count) in local.iter().enumerate() {
        if count > 0 {
            cell(hist, 1, bin)?.fetch_add(count, Ordering::Relaxed);
        }
    }

    Ok(())
}

fn cell_mut(local: &mut [u32], index: usize) -> Result<&mut u32, KernelFault> {
    let len = local.len();
    local.get_mut(index).ok_or(KernelFault::OutOfBounds {
        arg: 1,
        index,
        len,
    })
}

/// Accumulate the histogram of an image already resident on the device.
///
/// The histogram buffer is allocated and zeroed here; the dispatch is sized by
/// the number of pixels.
///
/// # Arguments
///
/// * `backend` - The device to run on.
/// * `program` - A program holding [`HIST_ATOMIC`] and [`HIST_LOCAL`].
/// * `image` - The pixels of the image.
/// * `bins` - The number of bins, `1..=256`.
/// * `strategy` - How work-items share the histogram.
///
/// # Returns
///
/// The histogram buffer of length `bins` and the dispatch event.
pub fn build_histogram<B: ComputeBackend>(
    backend: &B,
    program: &Program,
    image: &Buffer<u8>,
    bins: usize,
    strategy: HistogramStrategy,
) -> Result<StageOutput<Buffer<u32>>, ComputeError> {
    let hist = backend.create_buffer::<u32>(AccessMode::ReadWrite, bins)?;
    backend.fill_buffer(&hist, 0)?;

    let (kernel, range) = match strategy {
        HistogramStrategy::Atomic => (HIST_ATOMIC.name, NdRange::new(image.len())),
        HistogramStrategy::Local { group_size } => (
            HIST_LOCAL.name,
            NdRange::new(image.len()).with_local(group_size),
        ),
    };

    log::debug!("{kernel}: {} pixels into {bins} bins", image.len());

    let event = backend.enqueue_kernel(
        &program.kernel(kernel)?,
        &[image.into(), (&hist).into(), (bins as u32).into()],
        range,
    )?;

    Ok(StageOutput {
        output: hist,
        events: vec![event],
    })
}
