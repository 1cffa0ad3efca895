/// An error type for the image module.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ImageError {
    /// Error when the data length does not match the image size.
    #[error("Data length ({0}) does not match the image size ({1})")]
    InvalidChannelShape(usize, usize),

    /// Error when a pixel coordinate is outside the image.
    #[error("Pixel ({0}, {1}) is out of bounds for image of size {2}")]
    PixelIndexOutOfBounds(usize, usize, crate::ImageSize),

    /// Error when a channel index is outside the image.
    #[error("Channel index {0} is out of bounds ({1})")]
    ChannelIndexOutOfBounds(usize, usize),
}
