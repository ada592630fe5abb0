//! Conversion of captured frames into displayable images.

use camkit_types::PixelFormat;
use image::{Rgba, RgbaImage};
use tracing::warn;

use crate::error::CaptureError;
use crate::frame::SampleBuffer;
use crate::CaptureResult;

/// Color space of a bitmap view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// Device-dependent RGB.
    DeviceRgb,
}

/// Position and premultiplication of the alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaInfo {
    /// Alpha is the most significant component, color premultiplied.
    PremultipliedFirst,

    /// Alpha is the least significant component, color premultiplied.
    PremultipliedLast,
}

/// Byte order of each 32-bit pixel word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Big-endian words.
    Big32,

    /// Little-endian words.
    Little32,
}

/// Layout of the pixels a bitmap view reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapFormat {
    pub bits_per_component: usize,
    pub bits_per_pixel: usize,
    pub alpha: AlphaInfo,
    pub byte_order: ByteOrder,
    pub color_space: ColorSpace,
}

impl BitmapFormat {
    /// 8 bits per component, premultiplied alpha first in little-endian
    /// words, i.e. B, G, R, A in memory. Matches [`PixelFormat::Bgra32`].
    pub const BGRA_PREMULTIPLIED_FIRST: BitmapFormat = BitmapFormat {
        bits_per_component: 8,
        bits_per_pixel: 32,
        alpha: AlphaInfo::PremultipliedFirst,
        byte_order: ByteOrder::Little32,
        color_space: ColorSpace::DeviceRgb,
    };

    fn bytes_per_pixel(&self) -> usize {
        self.bits_per_pixel / 8
    }

    /// Byte offsets of R, G, B and A within one pixel.
    fn channel_offsets(&self) -> [usize; 4] {
        match (self.alpha, self.byte_order) {
            (AlphaInfo::PremultipliedFirst, ByteOrder::Little32) => [2, 1, 0, 3],
            (AlphaInfo::PremultipliedFirst, ByteOrder::Big32) => [1, 2, 3, 0],
            (AlphaInfo::PremultipliedLast, ByteOrder::Little32) => [3, 2, 1, 0],
            (AlphaInfo::PremultipliedLast, ByteOrder::Big32) => [0, 1, 2, 3],
        }
    }

    /// Whether a pixel buffer of `format` can be viewed with this layout.
    pub fn accepts(&self, format: PixelFormat) -> bool {
        format == PixelFormat::Bgra32 && self.bytes_per_pixel() == format.bytes_per_pixel()
    }
}

/// Read-only bitmap view over borrowed pixel memory.
#[derive(Debug)]
pub struct BitmapContext<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    bytes_per_row: usize,
    format: BitmapFormat,
}

impl<'a> BitmapContext<'a> {
    /// Validate the layout and build a view over `data`.
    pub fn new(
        data: &'a [u8],
        width: u32,
        height: u32,
        bytes_per_row: usize,
        format: BitmapFormat,
    ) -> CaptureResult<Self> {
        if width == 0 || height == 0 {
            return Err(CaptureError::BitmapConstruction(format!(
                "empty bitmap {}x{}",
                width, height
            )));
        }
        if format.bits_per_component != 8 || format.bits_per_pixel != 32 {
            return Err(CaptureError::BitmapConstruction(format!(
                "unsupported layout: {} bits per component, {} bits per pixel",
                format.bits_per_component, format.bits_per_pixel
            )));
        }

        let row_bytes = (width as usize)
            .checked_mul(format.bytes_per_pixel())
            .ok_or_else(|| CaptureError::BitmapConstruction("row size overflow".to_string()))?;
        if bytes_per_row < row_bytes {
            return Err(CaptureError::BitmapConstruction(format!(
                "bytes per row {} too small for width {}",
                bytes_per_row, width
            )));
        }

        let required = bytes_per_row
            .checked_mul(height as usize - 1)
            .and_then(|n| n.checked_add(row_bytes))
            .ok_or_else(|| CaptureError::BitmapConstruction("buffer size overflow".to_string()))?;
        if data.len() < required {
            return Err(CaptureError::BitmapConstruction(format!(
                "buffer holds {} bytes, {} required",
                data.len(),
                required
            )));
        }

        Ok(Self {
            data,
            width,
            height,
            bytes_per_row,
            format,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Copy the view into an owned, straight-alpha RGBA image.
    pub fn make_image(&self) -> RgbaImage {
        let [r, g, b, a] = self.format.channel_offsets();
        let bpp = self.format.bytes_per_pixel();

        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let offset = y as usize * self.bytes_per_row + x as usize * bpp;
            let px = &self.data[offset..offset + bpp];
            let alpha = px[a];
            Rgba([
                unpremultiply(px[r], alpha),
                unpremultiply(px[g], alpha),
                unpremultiply(px[b], alpha),
                alpha,
            ])
        })
    }
}

fn unpremultiply(component: u8, alpha: u8) -> u8 {
    match alpha {
        0 => 0,
        255 => component,
        _ => {
            let value = (component as u32 * 255 + alpha as u32 / 2) / alpha as u32;
            value.min(255) as u8
        }
    }
}

/// Convert a frame into an image, reporting why it could not be read.
///
/// The pixel buffer stays locked until the image has been copied out.
pub fn try_image_from_sample_buffer(sample: &SampleBuffer) -> CaptureResult<RgbaImage> {
    let buffer = sample.image_buffer().ok_or(CaptureError::NoImageBuffer)?;

    let lock = buffer.lock_base_address();
    let base = lock
        .base_address()
        .ok_or(CaptureError::PixelBufferInaccessible)?;

    let format = BitmapFormat::BGRA_PREMULTIPLIED_FIRST;
    if !format.accepts(buffer.format()) {
        return Err(CaptureError::UnsupportedPixelFormat(buffer.format()));
    }

    let context = BitmapContext::new(
        base,
        buffer.width(),
        buffer.height(),
        buffer.bytes_per_row(),
        format,
    )?;
    Ok(context.make_image())
}

/// Convert a frame into an image, or `None` after logging the cause.
pub fn image_from_sample_buffer(sample: &SampleBuffer) -> Option<RgbaImage> {
    match try_image_from_sample_buffer(sample) {
        Ok(image) => Some(image),
        Err(e) => {
            warn!(sequence = sample.sequence(), "Image conversion failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use bytes::Bytes;

    use crate::frame::{CaptureTimestamp, PixelBuffer};

    fn sample_with(buffer: PixelBuffer) -> SampleBuffer {
        SampleBuffer::new(buffer, CaptureTimestamp::since(Instant::now()), 0)
    }

    /// BGRA frame with padded rows, every pixel set to `bgra`.
    fn bgra_buffer(width: u32, height: u32, padding: usize, bgra: [u8; 4]) -> PixelBuffer {
        let bytes_per_row = width as usize * 4 + padding;
        let mut data = vec![0u8; bytes_per_row * height as usize];
        for row in data.chunks_mut(bytes_per_row) {
            for px in row[..width as usize * 4].chunks_mut(4) {
                px.copy_from_slice(&bgra);
            }
        }
        PixelBuffer::new(width, height, bytes_per_row, PixelFormat::Bgra32, Bytes::from(data))
    }

    #[test]
    fn test_image_has_buffer_dimensions() {
        let sample = sample_with(bgra_buffer(16, 9, 0, [10, 20, 30, 255]));
        let image = image_from_sample_buffer(&sample).unwrap();
        assert_eq!(image.dimensions(), (16, 9));
        assert_eq!(image.get_pixel(3, 4), &Rgba([30, 20, 10, 255]));
    }

    #[test]
    fn test_padded_rows() {
        let sample = sample_with(bgra_buffer(5, 3, 12, [0, 0, 255, 255]));
        let image = try_image_from_sample_buffer(&sample).unwrap();
        assert_eq!(image.dimensions(), (5, 3));
        assert!(image.pixels().all(|px| *px == Rgba([255, 0, 0, 255])));
    }

    #[test]
    fn test_premultiplied_alpha_is_undone() {
        // 50% alpha, premultiplied red of 128 is straight red 255.
        let sample = sample_with(bgra_buffer(1, 1, 0, [0, 0, 128, 128]));
        let image = try_image_from_sample_buffer(&sample).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgba([255, 0, 0, 128]));
    }

    #[test]
    fn test_transparent_pixels() {
        let sample = sample_with(bgra_buffer(2, 2, 0, [50, 60, 70, 0]));
        let image = try_image_from_sample_buffer(&sample).unwrap();
        assert_eq!(image.get_pixel(1, 1), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_no_image_buffer() {
        let sample = SampleBuffer::empty(CaptureTimestamp::since(Instant::now()), 0);
        assert!(matches!(
            try_image_from_sample_buffer(&sample),
            Err(CaptureError::NoImageBuffer)
        ));
        assert!(image_from_sample_buffer(&sample).is_none());
    }

    #[test]
    fn test_inaccessible_base_address() {
        let sample = sample_with(PixelBuffer::without_backing(4, 4, 16, PixelFormat::Bgra32));
        let err = try_image_from_sample_buffer(&sample).unwrap_err();
        assert!(matches!(err, CaptureError::PixelBufferInaccessible));

        // The logged diagnostic is the error's display text.
        let message = err.to_string();
        assert!(message.contains("inaccessible"));
        assert_ne!(message, CaptureError::NoImageBuffer.to_string());
        assert!(image_from_sample_buffer(&sample).is_none());
    }

    #[test]
    fn test_stride_too_small() {
        let buffer = PixelBuffer::new(4, 2, 8, PixelFormat::Bgra32, Bytes::from(vec![0u8; 16]));
        assert!(matches!(
            try_image_from_sample_buffer(&sample_with(buffer)),
            Err(CaptureError::BitmapConstruction(_))
        ));
    }

    #[test]
    fn test_short_buffer() {
        let buffer = PixelBuffer::new(4, 4, 16, PixelFormat::Bgra32, Bytes::from(vec![0u8; 40]));
        assert!(matches!(
            try_image_from_sample_buffer(&sample_with(buffer)),
            Err(CaptureError::BitmapConstruction(_))
        ));
    }

    #[test]
    fn test_last_row_needs_no_padding() {
        let buffer = PixelBuffer::new(2, 2, 12, PixelFormat::Bgra32, Bytes::from(vec![255u8; 20]));
        let image = try_image_from_sample_buffer(&sample_with(buffer)).unwrap();
        assert_eq!(image.dimensions(), (2, 2));
    }

    #[test]
    fn test_unsupported_pixel_format() {
        let buffer = PixelBuffer::new(4, 4, 4, PixelFormat::Nv12, Bytes::from(vec![0u8; 24]));
        assert!(matches!(
            try_image_from_sample_buffer(&sample_with(buffer)),
            Err(CaptureError::UnsupportedPixelFormat(PixelFormat::Nv12))
        ));
    }

    #[test]
    fn test_empty_bitmap_rejected() {
        let result = BitmapContext::new(&[], 0, 4, 0, BitmapFormat::BGRA_PREMULTIPLIED_FIRST);
        assert!(matches!(result, Err(CaptureError::BitmapConstruction(_))));
    }

    #[test]
    fn test_big_endian_premultiplied_last() {
        let format = BitmapFormat {
            alpha: AlphaInfo::PremultipliedLast,
            byte_order: ByteOrder::Big32,
            ..BitmapFormat::BGRA_PREMULTIPLIED_FIRST
        };
        let data = [1u8, 2, 3, 255];
        let context = BitmapContext::new(&data, 1, 1, 4, format).unwrap();
        assert_eq!(context.make_image().get_pixel(0, 0), &Rgba([1, 2, 3, 255]));
    }
}
