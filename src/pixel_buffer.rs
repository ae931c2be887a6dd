//! Dense RGBA raster with toroidal reads and bitmap persistence.

use std::fmt;
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba, RgbaImage};

use crate::error::{BuildResult, BuilderError};
use crate::pixel::Pixel;

/// A width x height grid of pixels stored row-major.
///
/// Reads wrap on both axes so a small texture can be sampled across a larger
/// output without bounds checks. Writes are not wrapped.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: usize,
    pub height: usize,
    data: Vec<Pixel>,
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl PixelBuffer {
    /// New buffer filled with transparent black.
    pub fn new(width: usize, height: usize) -> Self {
        Self::new_with(width, height, Pixel::default())
    }

    pub fn new_with(width: usize, height: usize, value: Pixel) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Read a bitmap from disk. Only 24-bit RGB and 32-bit RGBA layouts are accepted.
    pub fn load<P: AsRef<Path>>(path: P) -> BuildResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BuilderError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let image = image::open(path)?;
        match image {
            DynamicImage::ImageRgba8(rgba) => Ok(Self::from_image(&rgba)),
            DynamicImage::ImageRgb8(rgb) => {
                let (width, height) = rgb.dimensions();
                let data = rgb
                    .pixels()
                    .map(|p| Pixel::rgb(p[0], p[1], p[2]))
                    .collect();
                Ok(Self {
                    width: width as usize,
                    height: height as usize,
                    data,
                })
            }
            other => Err(BuilderError::UnsupportedFormat {
                path: path.to_path_buf(),
                format: format!("{:?}", other.color()),
            }),
        }
    }

    pub fn from_image(image: &RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width: width as usize,
            height: height as usize,
            data: image.pixels().map(|p| Pixel::from_rgba(p.0)).collect(),
        }
    }

    pub fn to_image(&self) -> RgbaImage {
        ImageBuffer::from_fn(self.width as u32, self.height as u32, |x, y| {
            Rgba(self.data[y as usize * self.width + x as usize].to_rgba())
        })
    }

    /// Write an uncompressed bitmap, optionally downsampled to a square first.
    pub fn save<P: AsRef<Path>>(&self, path: P, resize_to: Option<usize>) -> BuildResult<()> {
        let mut image = self.to_image();
        if let Some(size) = resize_to {
            if size != self.width || size != self.height {
                image = image::imageops::resize(&image, size as u32, size as u32, FilterType::Triangle);
            }
        }
        image.save_with_format(path, ImageFormat::Bmp)?;
        Ok(())
    }

    fn index(&self, x: usize, y: usize) -> usize {
        let x = x % self.width;
        let y = y % self.height;
        y * self.width + x
    }

    /// Read with wraparound on both axes.
    pub fn get(&self, x: usize, y: usize) -> Pixel {
        self.data[self.index(x, y)]
    }

    /// Write at an exact position. Panics when out of bounds.
    pub fn set(&mut self, x: usize, y: usize, value: Pixel) {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) outside {}x{} buffer",
            self.width,
            self.height
        );
        self.data[y * self.width + x] = value;
    }

    /// Iterate over all pixels with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, Pixel)> + '_ {
        self.data.iter().enumerate().map(move |(idx, &p)| {
            (idx % self.width, idx / self.width, p)
        })
    }

    pub fn as_slice(&self) -> &[Pixel] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Pixel] {
        &mut self.data
    }

    /// Copy out the rectangle starting at (x, y).
    pub fn sub_buffer(&self, x: usize, y: usize, width: usize, height: usize) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for row in y..y + height {
            let start = row * self.width + x;
            data.extend_from_slice(&self.data[start..start + width]);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Copy `source` into this buffer as block (block_x, block_y), counting blocks
    /// from the bottom-right corner: block (0, 0) occupies the last `source.width`
    /// columns and last `source.height` rows.
    pub fn copy_block_into(
        &mut self,
        block_x: usize,
        block_y: usize,
        source: &PixelBuffer,
    ) -> BuildResult<()> {
        let out_of_bounds = || BuilderError::BlockOutOfBounds {
            block_x,
            block_y,
            source_width: source.width,
            source_height: source.height,
            dest_width: self.width,
            dest_height: self.height,
        };

        let dest_x = (block_x + 1)
            .checked_mul(source.width)
            .and_then(|span| self.width.checked_sub(span))
            .ok_or_else(out_of_bounds)?;
        let dest_y = (block_y + 1)
            .checked_mul(source.height)
            .and_then(|span| self.height.checked_sub(span))
            .ok_or_else(out_of_bounds)?;

        for j in 0..source.height {
            let src_start = j * source.width;
            let dst_start = (dest_y + j) * self.width + dest_x;
            self.data[dst_start..dst_start + source.width]
                .copy_from_slice(&source.data[src_start..src_start + source.width]);
        }
        Ok(())
    }
}
