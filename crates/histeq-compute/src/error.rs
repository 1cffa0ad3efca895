use crate::buffer::ElementKind;
use crate::kernel::BuildLog;

/// A fault raised by a kernel body while executing a work-group.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum KernelFault {
    /// The argument at the index is not a buffer of the requested element type.
    #[error("argument {0} is not a {1:?} buffer")]
    BufferArgument(usize, ElementKind),

    /// The argument at the index is not a scalar.
    #[error("argument {0} is not a scalar")]
    ScalarArgument(usize),

    /// A work-item indexed past the end of a buffer argument.
    #[error("index {index} is out of bounds for argument {arg} of length {len}")]
    OutOfBounds {
        /// argument index
        arg: usize,
        /// offending element index
        index: usize,
        /// buffer length
        len: usize,
    },
}

/// An error type for the compute module.
#[derive(thiserror::Error, Debug)]
pub enum ComputeError {
    /// The requested platform does not exist.
    #[error("invalid platform index {platform_id} ({available} available)")]
    InvalidPlatform {
        /// requested platform
        platform_id: usize,
        /// number of platforms
        available: usize,
    },

    /// The requested device does not exist on the platform.
    #[error("invalid device index {device_id} on platform {platform_id} ({available} available)")]
    InvalidDevice {
        /// platform of the request
        platform_id: usize,
        /// requested device
        device_id: usize,
        /// number of devices on the platform
        available: usize,
    },

    /// The thread pool backing a device failed to build.
    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),

    /// The program failed to build. The build log is kept verbatim.
    #[error("program build failed\n{0}")]
    BuildFailed(BuildLog),

    /// No kernel with this name exists in the program.
    #[error("kernel not found: {0}")]
    KernelNotFound(String),

    /// The number of bound arguments does not match the kernel signature.
    #[error("kernel {kernel} expects {expected} arguments, got {actual}")]
    ArgumentCount {
        /// kernel name
        kernel: String,
        /// declared parameters
        expected: usize,
        /// bound arguments
        actual: usize,
    },

    /// A bound argument does not match the declared parameter kind.
    #[error("kernel {kernel}: argument {index} does not match the parameter kind")]
    ArgumentKind {
        /// kernel name
        kernel: String,
        /// argument index
        index: usize,
    },

    /// A read-only buffer was bound to a parameter the kernel writes.
    #[error("kernel {kernel}: argument {index} is read-only but the kernel writes it")]
    AccessViolation {
        /// kernel name
        kernel: String,
        /// argument index
        index: usize,
    },

    /// The global or local work size is not valid for the device.
    #[error("invalid work size: global {global}, local {local:?}")]
    InvalidWorkSize {
        /// global work size
        global: usize,
        /// local work size
        local: Option<usize>,
    },

    /// A buffer with this number of elements cannot be allocated.
    #[error("invalid buffer size: {0} elements")]
    InvalidBufferSize(usize),

    /// A host slice does not match the length of the device buffer.
    #[error("buffer length mismatch: buffer holds {expected} elements, host slice {actual}")]
    BufferLengthMismatch {
        /// buffer length
        expected: usize,
        /// host slice length
        actual: usize,
    },

    /// A kernel faulted while executing.
    #[error("kernel {kernel} faulted: {fault}")]
    KernelFault {
        /// kernel name
        kernel: String,
        /// the fault raised by the kernel body
        #[source]
        fault: KernelFault,
    },

    /// The device reported a failure outside of any kernel.
    #[error("device error: {0}")]
    Device(String),
}
