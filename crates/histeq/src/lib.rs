#![doc = include_str!("../README.md")]

#[doc(inline)]
pub use histeq_compute as compute;

#[doc(inline)]
pub use histeq_image as image;

#[doc(inline)]
pub use histeq_imgproc as imgproc;

#[doc(inline)]
pub use histeq_io as io;
