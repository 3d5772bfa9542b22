use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageBuffer, Rgb, RgbImage};

use crate::error::FrameError;
use crate::frame::{Frame, PixelFormat};

/// Luminance copy of a frame.
pub fn to_gray(frame: &Frame) -> Result<GrayImage, FrameError> {
    match frame.format() {
        PixelFormat::Gray8 => GrayImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or_else(|| length_error(frame)),
        PixelFormat::Rgb8 => {
            let view = rgb_view(frame)?;
            Ok(imageops::grayscale(&view))
        }
    }
}

fn to_rgb(frame: &Frame) -> Result<RgbImage, FrameError> {
    match frame.format() {
        PixelFormat::Rgb8 => RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or_else(|| length_error(frame)),
        PixelFormat::Gray8 => Ok(DynamicImage::ImageLuma8(to_gray(frame)?).to_rgb8()),
    }
}

/// Shrinks both dimensions by an integer factor, a factor of 1 returns the image unchanged.
pub fn downscale<P>(image: ImageBuffer<P, Vec<u8>>, scale: u32) -> ImageBuffer<P, Vec<u8>>
where
    P: image::Pixel<Subpixel = u8> + 'static,
{
    if scale <= 1 {
        return image;
    }
    let width = (image.width() / scale).max(1);
    let height = (image.height() / scale).max(1);
    imageops::resize(&image, width, height, FilterType::Triangle)
}

/// Converts and shrinks a captured frame into what a media sink consumes.
pub fn prepare_for_stream(frame: &Frame, scale: u32, format: PixelFormat) -> Result<Frame, FrameError> {
    let (width, height, data) = match format {
        PixelFormat::Gray8 => {
            let image = downscale(to_gray(frame)?, scale);
            (image.width(), image.height(), image.into_raw())
        }
        PixelFormat::Rgb8 => {
            let image = downscale(to_rgb(frame)?, scale);
            (image.width(), image.height(), image.into_raw())
        }
    };

    Frame::new(width, height, format, data, frame.sequence(), frame.timestamp())
}

fn rgb_view(frame: &Frame) -> Result<ImageBuffer<Rgb<u8>, &[u8]>, FrameError> {
    ImageBuffer::from_raw(frame.width(), frame.height(), frame.data()).ok_or_else(|| length_error(frame))
}

fn length_error(frame: &Frame) -> FrameError {
    FrameError::BufferLength {
        width: frame.width(),
        height: frame.height(),
        format: frame.format(),
        expected: Frame::expected_len(frame.width(), frame.height(), frame.format()),
        actual: frame.data().len(),
    }
}
