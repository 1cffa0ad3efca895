//! Backend abstraction for device operations.
//!
//! A compute device allocates buffers, moves data between host and device,
//! builds programs and dispatches kernels over a 1-D range. Commands run in
//! submission order; [`ComputeBackend::finish`] blocks until every submitted
//! command has retired and its output is readable.

use crate::buffer::{AccessMode, Buffer, DeviceElement};
use crate::device::DeviceInfo;
use crate::error::ComputeError;
use crate::event::Event;
use crate::kernel::{Kernel, KernelArg, NdRange, Program, ProgramSource};

/// Backend trait defining core device operations.
///
/// Implementations must be `Send + Sync` so a backend can be shared by the
/// threads driving it.
pub trait ComputeBackend: Send + Sync {
    /// Description of the device.
    fn device(&self) -> &DeviceInfo;

    /// Build a program for the device.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::BuildFailed`] with the build log if the program
    /// does not build.
    fn build_program(&self, source: &ProgramSource, options: &str) -> Result<Program, ComputeError>;

    /// Allocate a buffer of `len` zeroed elements.
    fn create_buffer<T: DeviceElement>(
        &self,
        access: AccessMode,
        len: usize,
    ) -> Result<Buffer<T>, ComputeError>;

    /// Copy a host slice into a buffer. Blocks until the copy is done.
    fn write_buffer<T: DeviceElement>(
        &self,
        buffer: &Buffer<T>,
        data: &[T],
    ) -> Result<(), ComputeError>;

    /// Set every element of a buffer to `value`.
    fn fill_buffer<T: DeviceElement>(&self, buffer: &Buffer<T>, value: T)
        -> Result<(), ComputeError>;

    /// Copy a buffer into host memory. Blocks until the copy is done.
    fn read_buffer<T: DeviceElement>(&self, buffer: &Buffer<T>) -> Result<Vec<T>, ComputeError>;

    /// Dispatch a kernel over a 1-D range with bound arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments do not match the kernel signature, the
    /// range is invalid for the device, or the kernel faults.
    fn enqueue_kernel(
        &self,
        kernel: &Kernel,
        args: &[KernelArg],
        range: NdRange,
    ) -> Result<Event, ComputeError>;

    /// Block until every submitted command has retired.
    fn finish(&self) -> Result<(), ComputeError>;
}
