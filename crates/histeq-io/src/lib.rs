#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types for I/O operations.
pub mod error;

/// High-level image reading and writing functions.
///
/// Images of any format supported by the `image` crate are read as 8-bit
/// grayscale. See [`functional::read_image_any_mono8`].
pub mod functional;

pub use crate::error::IoError;
