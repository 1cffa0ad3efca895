use std::sync::atomic::Ordering;

use histeq_compute::kernel::cell;
use histeq_compute::{
    AccessMode, Buffer, ComputeBackend, ComputeError, ElementKind, KernelDef, KernelFault,
    NdRange, ParamKind, Program, WorkGroup,
};

use crate::histogram::{bin_index, bin_lower_edge};
use crate::pipeline::StageOutput;
use crate::INTENSITY_LEVELS;

/// Normalize the cumulative histogram into the lookup table.
///
/// Arguments: cumulative histogram (`u32`, one entry per bin), lookup table
/// (`u8`, one entry per intensity). Work-item `i` writes the entry of intensity `i`.
pub const LUT_NORMALIZE: KernelDef = KernelDef {
    name: "lut_normalize",
    params: &[
        ParamKind::Buffer {
            kind: ElementKind::U32,
            access: AccessMode::ReadOnly,
        },
        ParamKind::Buffer {
            kind: ElementKind::U8,
            access: AccessMode::WriteOnly,
        },
    ],
    body: lut_normalize,
};

/// Rescale a cumulative count to the output range `[0, 255]`.
///
/// Computes `round((value - cmin) / (total - cmin) * 255)`, rounding halves
/// up, where `cmin` is the smallest non-zero cumulative count and `total` the
/// pixel count. Counts below `cmin` map to 0.
///
/// # Returns
///
/// `None` when `total <= cmin`, i.e. every pixel falls in one bin and the
/// rescaling is undefined.
///
/// # Example
///
/// ```
/// use histeq_imgproc::lut::normalize_level;
///
/// assert_eq!(normalize_level(2, 2, 4), Some(0));
/// assert_eq!(normalize_level(3, 2, 4), Some(128));
/// assert_eq!(normalize_level(4, 2, 4), Some(255));
/// assert_eq!(normalize_level(9, 9, 9), None);
/// ```
pub fn normalize_level(value: u32, cmin: u32, total: u32) -> Option<u8> {
    if total <= cmin {
        return None;
    }

    let num = value.saturating_sub(cmin) as u64 * 255;
    let den = (total - cmin) as u64;

    Some(((2 * num + den) / (2 * den)).min(255) as u8)
}

/// The smallest non-zero value of a cumulative histogram, or 0 if it is all zeros.
pub fn min_nonzero(cumulative: &[u32]) -> u32 {
    cumulative.iter().copied().find(|&c| c > 0).unwrap_or(0)
}

fn lut_normalize(group: &WorkGroup<'_>) -> Result<(), KernelFault> {
    let cumulative = group.u32_buffer(0)?;
    let lut = group.u8_buffer(1)?;
    let bins = cumulative.len() as u32;

    // every group finds the range on its own; the histogram is short
    let mut cmin = 0u32;
    for c in cumulative.iter() {
        let c = c.load(Ordering::Relaxed);
        if c > 0 {
            cmin = c;
            break;
        }
    }
    let total = cell(cumulative, 0, cumulative.len().saturating_sub(1))?.load(Ordering::Relaxed);

    for gid in group.global_ids() {
        let intensity = gid as u8;
        let bin = bin_index(intensity, bins);
        let count = cell(cumulative, 0, bin)?.load(Ordering::Relaxed);
        // a single occupied bin: keep the bins apart, one level each
        let level =
            normalize_level(count, cmin, total).unwrap_or_else(|| bin_lower_edge(bin, bins));
        cell(lut, 1, gid)?.store(level, Ordering::Relaxed);
    }

    Ok(())
}

/// Build the lookup table from the cumulative histogram.
///
/// Takes ownership of the cumulative histogram. The dispatch is sized by the
/// lookup table length, one work-item per intensity. When all pixels share one
/// bin every intensity maps to the lower edge of its bin, which is the identity
/// with 256 bins.
///
/// # Returns
///
/// The lookup table buffer of 256 entries and the dispatch event.
pub fn normalize_lut<B: ComputeBackend>(
    backend: &B,
    program: &Program,
    cumulative: Buffer<u32>,
) -> Result<StageOutput<Buffer<u8>>, ComputeError> {
    let lut = backend.create_buffer::<u8>(AccessMode::ReadWrite, INTENSITY_LEVELS)?;

    let event = backend.enqueue_kernel(
        &program.kernel(LUT_NORMALIZE.name)?,
        &[(&cumulative).into(), (&lut).into()],
        NdRange::new(INTENSITY_LEVELS),
    )?;

    Ok(StageOutput {
        output: lut,
        events: vec![event],
    })
}
