use std::sync::Arc;

use image::{DynamicImage, GrayImage};

use crate::common::error::{BarcodeError, BarcodeResult};

// Luminance source
//------------------------------------------------------------------------------

/// Greyscale view of an image, one byte per pixel where 0 is black
pub trait LuminanceSource {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// Copies row `y` into `buf`, resizing it to the width of the source
    fn row(&self, y: usize, buf: &mut Vec<u8>) -> BarcodeResult<()>;

    /// Whole image, row-major
    fn matrix(&self) -> Vec<u8>;

    fn is_crop_supported(&self) -> bool {
        false
    }

    fn crop(&self, _left: usize, _top: usize, _width: usize, _height: usize) -> BarcodeResult<Self>
    where
        Self: Sized,
    {
        Err(BarcodeError::illegal("This luminance source does not support cropping."))
    }

    fn is_rotate_supported(&self) -> bool {
        false
    }

    fn rotate_counter_clockwise(&self) -> BarcodeResult<Self>
    where
        Self: Sized,
    {
        Err(BarcodeError::illegal("This luminance source does not support rotation by 90 degrees."))
    }

    fn invert(&self) -> Self
    where
        Self: Sized;
}

// Luma8 source
//------------------------------------------------------------------------------

/// Eight bit luminance over a shared buffer. Crops and inversions are views over the
/// same buffer, only rotation copies.
#[derive(Debug, Clone)]
pub struct Luma8Source {
    data: Arc<[u8]>,
    data_width: usize,
    left: usize,
    top: usize,
    width: usize,
    height: usize,
    inverted: bool,
}

impl Luma8Source {
    pub fn from_luma(
        data: impl Into<Arc<[u8]>>,
        width: usize,
        height: usize,
    ) -> BarcodeResult<Self> {
        let data = data.into();
        if width == 0 || height == 0 || data.len() != width * height {
            return Err(BarcodeError::illegal(format!(
                "Expected {width}x{height} luminance bytes, but got {}",
                data.len()
            )));
        }
        Ok(Self { data, data_width: width, left: 0, top: 0, width, height, inverted: false })
    }

    pub fn from_rgb(pixels: &[u8], width: usize, height: usize) -> BarcodeResult<Self> {
        Self::from_channels(pixels, width, height, 3)
    }

    /// Fully transparent pixels are read as white
    pub fn from_rgba(pixels: &[u8], width: usize, height: usize) -> BarcodeResult<Self> {
        Self::from_channels(pixels, width, height, 4)
    }

    fn from_channels(
        pixels: &[u8],
        width: usize,
        height: usize,
        channels: usize,
    ) -> BarcodeResult<Self> {
        if pixels.len() != width * height * channels {
            return Err(BarcodeError::illegal(format!(
                "Expected {width}x{height} pixels of {channels} bytes, but got {} bytes",
                pixels.len()
            )));
        }
        let luma = pixels
            .chunks_exact(channels)
            .map(|p| match p {
                [.., 0] if channels == 4 => 0xff,
                [r, g, b, ..] => luminance(*r, *g, *b),
                _ => 0xff,
            })
            .collect::<Vec<_>>();
        Self::from_luma(luma, width, height)
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    fn pixel(&self, x: usize, y: usize) -> u8 {
        let v = self.data[(self.top + y) * self.data_width + self.left + x];
        if self.inverted {
            255 - v
        } else {
            v
        }
    }
}

// Green counts twice, the way the eye weighs it
fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 + 2 * g as u32 + b as u32) / 4) as u8
}

impl LuminanceSource for Luma8Source {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn row(&self, y: usize, buf: &mut Vec<u8>) -> BarcodeResult<()> {
        if y >= self.height {
            return Err(BarcodeError::illegal(format!("Requested row is outside the image: {y}")));
        }
        let offset = (self.top + y) * self.data_width + self.left;
        buf.clear();
        buf.extend_from_slice(&self.data[offset..offset + self.width]);
        if self.inverted {
            buf.iter_mut().for_each(|v| *v = 255 - *v);
        }
        Ok(())
    }

    fn matrix(&self) -> Vec<u8> {
        let mut res = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            let offset = (self.top + y) * self.data_width + self.left;
            res.extend_from_slice(&self.data[offset..offset + self.width]);
        }
        if self.inverted {
            res.iter_mut().for_each(|v| *v = 255 - *v);
        }
        res
    }

    fn is_crop_supported(&self) -> bool {
        true
    }

    fn crop(&self, left: usize, top: usize, width: usize, height: usize) -> BarcodeResult<Self> {
        if width == 0 || height == 0 || left + width > self.width || top + height > self.height {
            return Err(BarcodeError::illegal("Crop rectangle does not fit within image data."));
        }
        Ok(Self {
            data: Arc::clone(&self.data),
            left: self.left + left,
            top: self.top + top,
            width,
            height,
            ..*self
        })
    }

    fn is_rotate_supported(&self) -> bool {
        true
    }

    // The top row of the result is the right column of the source
    fn rotate_counter_clockwise(&self) -> BarcodeResult<Self> {
        let (w, h) = (self.width, self.height);
        let mut rotated = Vec::with_capacity(w * h);
        for x in (0..w).rev() {
            rotated.extend((0..h).map(|y| self.pixel(x, y)));
        }
        Self::from_luma(rotated, h, w)
    }

    fn invert(&self) -> Self {
        Self { data: Arc::clone(&self.data), inverted: !self.inverted, ..*self }
    }
}

impl From<&GrayImage> for Luma8Source {
    fn from(img: &GrayImage) -> Self {
        let (w, h) = img.dimensions();
        Self {
            data: Arc::from(img.as_raw().as_slice()),
            data_width: w as usize,
            left: 0,
            top: 0,
            width: w as usize,
            height: h as usize,
            inverted: false,
        }
    }
}

impl TryFrom<&DynamicImage> for Luma8Source {
    type Error = BarcodeError;

    fn try_from(img: &DynamicImage) -> BarcodeResult<Self> {
        let rgba = img.to_rgba8();
        let (w, h) = rgba.dimensions();
        Self::from_rgba(rgba.as_raw(), w as usize, h as usize)
    }
}
