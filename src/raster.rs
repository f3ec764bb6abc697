//! Interleaved 8-bit pixel grid used as resampler input and output

use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};
use std::path::Path;

use crate::error::{Result, UnwarpError};

/// Row-major, channel-interleaved raster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    channels: usize,
    data: Vec<u8>,
}

impl Raster {
    /// Wrap an existing buffer; its length must be `width * height * channels`
    pub fn new(width: u32, height: u32, channels: usize, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * channels;
        if data.len() != expected {
            return Err(UnwarpError::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Raster filled with zeros (the fill value)
    pub fn zeroed(width: u32, height: u32, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![0u8; width as usize * height as usize * channels],
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Bytes per row
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.channels == 0
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Samples of one pixel; panics when out of bounds
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let offset = y as usize * self.stride() + x as usize * self.channels;
        &self.data[offset..offset + self.channels]
    }

    #[inline]
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [u8] {
        let offset = y as usize * self.stride() + x as usize * self.channels;
        let channels = self.channels;
        &mut self.data[offset..offset + channels]
    }

    /// Convert a decoded image, keeping gray/alpha layouts intact
    ///
    /// 16-bit and float images are reduced to 8-bit RGB(A).
    pub fn from_dynamic(img: DynamicImage) -> Self {
        let (width, height) = (img.width(), img.height());
        let (channels, data) = match img {
            DynamicImage::ImageLuma8(buf) => (1, buf.into_raw()),
            DynamicImage::ImageLumaA8(buf) => (2, buf.into_raw()),
            DynamicImage::ImageRgb8(buf) => (3, buf.into_raw()),
            DynamicImage::ImageRgba8(buf) => (4, buf.into_raw()),
            other if other.color().has_alpha() => (4, other.to_rgba8().into_raw()),
            other => (3, other.to_rgb8().into_raw()),
        };
        Self {
            width,
            height,
            channels,
            data,
        }
    }

    pub fn into_dynamic(self) -> Result<DynamicImage> {
        let (w, h, channels) = (self.width, self.height, self.channels);
        let size_error = |expected: usize, actual: usize| UnwarpError::BufferSize { expected, actual };
        let expected = w as usize * h as usize * channels;
        let actual = self.data.len();
        let img = match channels {
            1 => GrayImage::from_raw(w, h, self.data).map(DynamicImage::ImageLuma8),
            2 => GrayAlphaImage::from_raw(w, h, self.data).map(DynamicImage::ImageLumaA8),
            3 => RgbImage::from_raw(w, h, self.data).map(DynamicImage::ImageRgb8),
            4 => RgbaImage::from_raw(w, h, self.data).map(DynamicImage::ImageRgba8),
            n => return Err(UnwarpError::UnsupportedChannels(n)),
        };
        img.ok_or_else(|| size_error(expected, actual))
    }

    /// RGB copy for drawing previews; alpha is dropped, gray is expanded
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        Ok(self.clone().into_dynamic()?.to_rgb8())
    }

    /// Decode an image file
    pub fn open(path: &Path) -> Result<Self> {
        let img = image::open(path)?;
        tracing::debug!(
            "Decoded {:?}: {}x{} {:?}",
            path,
            img.width(),
            img.height(),
            img.color()
        );
        Ok(Self::from_dynamic(img))
    }

    /// Encode to a file; the format follows the extension
    pub fn save(&self, path: &Path) -> Result<()> {
        let img = self.clone().into_dynamic()?;
        // JPEG has no alpha channel
        let img = match RasterFileKind::from_path(path) {
            RasterFileKind::Jpeg if img.color().has_alpha() => {
                DynamicImage::ImageRgb8(img.to_rgb8())
            }
            _ => img,
        };
        img.save(path)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RasterFileKind {
    Jpeg,
    Other,
}

impl RasterFileKind {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") => {
                RasterFileKind::Jpeg
            }
            _ => RasterFileKind::Other,
        }
    }
}
