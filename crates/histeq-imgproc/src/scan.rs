//! Inclusive scan of the histogram.
//!
//! `cumulative[i] = histogram[0] + ... + histogram[i]`.
//!
//! The Hillis-Steele strategy runs `ceil(log2(n))` dispatches (at least one)
//! over the `n` bins, ping-ponging between two buffers. Step `k` adds the value
//! `2^k` positions to the left; work-items with no such neighbour copy their
//! value, so any length works and no padding to a power of two is needed.
//!
//! The serial strategy accumulates every bin in a single work-group, which is
//! cheaper when the histogram is small.

use std::sync::atomic::Ordering;

use histeq_compute::kernel::cell;
use histeq_compute::{
    AccessMode, Buffer, ComputeBackend, ComputeError, ElementKind, KernelDef, KernelFault,
    NdRange, ParamKind, Program, WorkGroup,
};

use crate::config::ScanStrategy;
use crate::pipeline::StageOutput;

const SRC: ParamKind = ParamKind::Buffer {
    kind: ElementKind::U32,
    access: AccessMode::ReadOnly,
};

const DST: ParamKind = ParamKind::Buffer {
    kind: ElementKind::U32,
    access: AccessMode::WriteOnly,
};

/// One Hillis-Steele step. Arguments: source, destination, offset.
pub const SCAN_HS_STEP: KernelDef = KernelDef {
    name: "scan_hs_step",
    params: &[SRC, DST, ParamKind::Scalar],
    body: scan_hs_step,
};

/// Sequential inclusive scan. Arguments: source, destination.
pub const SCAN_SERIAL: KernelDef = KernelDef {
    name: "scan_serial",
    params: &[SRC, DST],
    body: scan_serial,
};

fn scan_hs_step(group: &WorkGroup<'_>) -> Result<(), KernelFault> {
    let src = group.u32_buffer(0)?;
    let dst = group.u32_buffer(1)?;
    let offset = group.scalar(2)? as usize;

    for gid in group.global_ids() {
        let mut value = cell(src, 0, gid)?.load(Ordering::Relaxed);
        if gid >= offset {
            value += cell(src, 0, gid - offset)?.load(Ordering::Relaxed);
        }
        cell(dst, 1, gid)?.store(value, Ordering::Relaxed);
    }

    Ok(())
}

fn scan_serial(group: &WorkGroup<'_>) -> Result<(), KernelFault> {
    // the first group walks the whole range, the others have nothing to do
    if group.group_id() != 0 {
        return Ok(());
    }

    let src = group.u32_buffer(0)?;
    let dst = group.u32_buffer(1)?;

    let mut sum = 0u32;
    for gid in 0..group.global_size() {
        sum += cell(src, 0, gid)?.load(Ordering::Relaxed);
        cell(dst, 1, gid)?.store(sum, Ordering::Relaxed);
    }

    Ok(())
}

/// Compute the cumulative histogram.
///
/// Takes ownership of the histogram; the dispatches are sized by its length.
///
/// # Returns
///
/// The cumulative histogram buffer and one event per dispatch.
pub fn cumulative_histogram<B: ComputeBackend>(
    backend: &B,
    program: &Program,
    histogram: Buffer<u32>,
    strategy: ScanStrategy,
) -> Result<StageOutput<Buffer<u32>>, ComputeError> {
    let n = histogram.len();

    match strategy {
        ScanStrategy::Serial => {
            let cumulative = backend.create_buffer::<u32>(AccessMode::ReadWrite, n)?;
            let event = backend.enqueue_kernel(
                &program.kernel(SCAN_SERIAL.name)?,
                &[(&histogram).into(), (&cumulative).into()],
                NdRange::new(n).with_local(n),
            )?;

            Ok(StageOutput {
                output: cumulative,
                events: vec![event],
            })
        }
        ScanStrategy::HillisSteele => {
            let kernel = program.kernel(SCAN_HS_STEP.name)?;
            let mut front = backend.create_buffer::<u32>(AccessMode::ReadWrite, n)?;
            let mut back = backend.create_buffer::<u32>(AccessMode::ReadWrite, n)?;

            let mut events = Vec::new();
            events.push(backend.enqueue_kernel(
                &kernel,
                &[(&histogram).into(), (&front).into(), 1u32.into()],
                NdRange::new(n),
            )?);

            let mut offset = 2usize;
            while offset < n {
                events.push(backend.enqueue_kernel(
                    &kernel,
                    &[(&front).into(), (&back).into(), (offset as u32).into()],
                    NdRange::new(n),
                )?);
                std::mem::swap(&mut front, &mut back);
                offset *= 2;
            }

            log::debug!("{}: {} bins in {} steps", kernel.name(), n, events.len());

            Ok(StageOutput {
                output: front,
                events,
            })
        }
    }
}
