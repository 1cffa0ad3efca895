use std::path::Path;

use histeq_image::{Image, ImageSize};

use crate::error::IoError;

fn mono8_from_dynamic(img: image::DynamicImage) -> Result<Image<u8, 1>, IoError> {
    let size = ImageSize {
        width: img.width() as usize,
        height: img.height() as usize,
    };

    if img.color() != image::ColorType::L8 {
        log::debug!("converting {:?} image to 8-bit grayscale", img.color());
    }

    Ok(Image::new(size, img.into_luma8().into_raw())?)
}

/// Reads an image from the given file path as 8-bit grayscale.
///
/// The format is guessed from the file contents; any format supported by the
/// image crate is accepted. Color images are converted to luma.
///
/// # Arguments
///
/// * `file_path` - The path to a valid image file.
///
/// # Returns
///
/// A single channel image.
///
/// # Errors
///
/// Returns an error if the file does not exist or cannot be decoded.
pub fn read_image_any_mono8(file_path: impl AsRef<Path>) -> Result<Image<u8, 1>, IoError> {
    let file_path = file_path.as_ref().to_owned();

    // verify the file exists
    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    let img = image::ImageReader::open(&file_path)?
        .with_guessed_format()?
        .decode()?;

    mono8_from_dynamic(img)
}

/// Decodes an encoded image held in memory as 8-bit grayscale.
///
/// # Arguments
///
/// * `bytes` - The encoded image, in any format supported by the image crate.
pub fn decode_image_mono8(bytes: &[u8]) -> Result<Image<u8, 1>, IoError> {
    mono8_from_dynamic(image::load_from_memory(bytes)?)
}

/// Writes a grayscale image to the given file path.
///
/// The format is chosen from the file extension.
///
/// # Arguments
///
/// * `file_path` - The path to the output file.
/// * `image` - The image to write.
pub fn write_image_mono8(file_path: impl AsRef<Path>, image: &Image<u8, 1>) -> Result<(), IoError> {
    let (Ok(width), Ok(height)) = (
        u32::try_from(image.width()),
        u32::try_from(image.height()),
    ) else {
        return Err(IoError::ImageTooLarge(image.size()));
    };

    image::save_buffer(
        file_path.as_ref(),
        image.as_slice(),
        width,
        height,
        image::ExtendedColorType::L8,
    )?;

    Ok(())
}
