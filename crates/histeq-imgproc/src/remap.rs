use std::sync::atomic::Ordering;

use histeq_compute::kernel::cell;
use histeq_compute::{
    AccessMode, Buffer, ComputeBackend, ComputeError, ElementKind, KernelDef, KernelFault,
    NdRange, ParamKind, Program, WorkGroup,
};

use crate::pipeline::StageOutput;

/// Replace every pixel by its lookup table entry.
///
/// Arguments: input image (`u8`), lookup table (`u8`, 256 entries), output image (`u8`).
pub const REMAP: KernelDef = KernelDef {
    name: "remap",
    params: &[
        ParamKind::Buffer {
            kind: ElementKind::U8,
            access: AccessMode::ReadOnly,
        },
        ParamKind::Buffer {
            kind: ElementKind::U8,
            access: AccessMode::ReadOnly,
        },
        ParamKind::Buffer {
            kind: ElementKind::U8,
            access: AccessMode::WriteOnly,
        },
    ],
    body: remap_pixels,
};

fn remap_pixels(group: &WorkGroup<'_>) -> Result<(), KernelFault> {
    let image = group.u8_buffer(0)?;
    let lut = group.u8_buffer(1)?;
    let out = group.u8_buffer(2)?;

    for gid in group.global_ids() {
        let intensity = cell(image, 0, gid)?.load(Ordering::Relaxed);
        let level = cell(lut, 1, intensity as usize)?.load(Ordering::Relaxed);
        cell(out, 2, gid)?.store(level, Ordering::Relaxed);
    }

    Ok(())
}

/// Apply the lookup table to an image resident on the device.
///
/// The input buffer is left untouched; the result goes to a new buffer of the
/// same length. The dispatch is sized by the number of pixels.
///
/// # Arguments
///
/// * `backend` - The device to run on.
/// * `program` - A program holding [`REMAP`].
/// * `image` - The pixels of the input image.
/// * `lut` - The lookup table, consumed by the stage.
///
/// # Returns
///
/// The output pixels and the dispatch event.
pub fn remap<B: ComputeBackend>(
    backend: &B,
    program: &Program,
    image: &Buffer<u8>,
    lut: Buffer<u8>,
) -> Result<StageOutput<Buffer<u8>>, ComputeError> {
    let out = backend.create_buffer::<u8>(AccessMode::WriteOnly, image.len())?;

    let event = backend.enqueue_kernel(
        &program.kernel(REMAP.name)?,
        &[image.into(), (&lut).into(), (&out).into()],
        NdRange::new(image.len()),
    )?;

    Ok(StageOutput {
        output: out,
        events: vec![event],
    })
}
