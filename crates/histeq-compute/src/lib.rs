#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Backend trait defining the operations a compute device exposes.
///
/// See [`backend::ComputeBackend`] for the contract every device implements.
pub mod backend;

/// Device-visible buffers and their element types.
pub mod buffer;

/// Host backend running kernels on a rayon thread pool.
pub mod cpu;

/// Platform and device enumeration.
pub mod device;

/// Error types for the compute module.
pub mod error;

/// Profiling events reported for every dispatched kernel.
pub mod event;

/// Kernels, programs and the work-group execution model.
pub mod kernel;

pub use crate::backend::ComputeBackend;
pub use crate::buffer::{AccessMode, Buffer, DeviceElement, ElementKind};
pub use crate::cpu::CpuBackend;
pub use crate::device::{list_platforms_devices, platforms, DeviceInfo, DeviceKind, PlatformInfo};
pub use crate::error::{ComputeError, KernelFault};
pub use crate::event::{Event, ProfilingResolution};
pub use crate::kernel::{
    BuildLog, BuildStatus, Kernel, KernelArg, KernelDef, NdRange, ParamKind, Program,
    ProgramSource, WorkGroup,
};
