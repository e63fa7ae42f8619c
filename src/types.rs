//! Core data types for the background removal pipeline

use crate::error::{PipelineError, Result};
use image::{imageops, DynamicImage, GenericImageView, ImageBuffer, Luma, RgbaImage};
use std::io::Cursor;
use std::path::Path;

/// Floating point alpha mask produced by a cascade stage
///
/// Values are conceptually in `[0, 1]` but that is only guaranteed after
/// post-processing. The resolution is intrinsic to the network that produced
/// the mask and may differ from both the stage input resolution and the
/// native image resolution, so width and height always travel with the
/// buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaMask {
    /// Row-major scalar values
    pub data: Vec<f32>,
    /// Mask width in pixels
    pub width: u32,
    /// Mask height in pixels
    pub height: u32,
}

impl AlphaMask {
    /// Create a mask from raw values
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Processing` when the buffer length does not
    /// match `width * height`.
    pub fn new(data: Vec<f32>, width: u32, height: u32) -> Result<Self> {
        if data.len() != (width as usize) * (height as usize) {
            return Err(PipelineError::processing(format!(
                "mask buffer length {} does not match {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Mask filled with a constant value
    #[must_use]
    pub fn splat(value: f32, width: u32, height: u32) -> Self {
        Self {
            data: vec![value; (width as usize) * (height as usize)],
            width,
            height,
        }
    }

    /// Convert to an 8-bit grayscale image, clamping values to `[0, 1]`
    ///
    /// Images are used as an intermediate representation purely so the image
    /// crate's resampling can be reused for smoothed mask resizing.
    #[must_use]
    pub fn to_luma_image(&self) -> ImageBuffer<Luma<u8>, Vec<u8>> {
        let pixels = self
            .data
            .iter()
            .map(|&v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        // Length invariant is enforced by the constructors
        ImageBuffer::from_raw(self.width, self.height, pixels)
            .unwrap_or_else(|| ImageBuffer::new(self.width, self.height))
    }

    /// Rebuild a float mask from an 8-bit grayscale image
    #[must_use]
    pub fn from_luma_image(image: &ImageBuffer<Luma<u8>, Vec<u8>>) -> Self {
        let (width, height) = image.dimensions();
        let data = image.as_raw().iter().map(|&v| f32::from(v) / 255.0).collect();
        Self {
            data,
            width,
            height,
        }
    }

    /// Resize the mask to a new resolution with smoothing
    #[must_use]
    pub fn resize_smooth(&self, new_width: u32, new_height: u32) -> Self {
        if new_width == self.width && new_height == self.height {
            return self.clone();
        }
        let resized = imageops::resize(
            &self.to_luma_image(),
            new_width,
            new_height,
            imageops::FilterType::Triangle,
        );
        Self::from_luma_image(&resized)
    }

    /// Number of foreground pixels (value > 0)
    #[must_use]
    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v > 0.0).count()
    }
}

/// One rectangular piece of a grid-split source image
///
/// Created by the split step; the orchestrator fills in `result_alpha` and
/// `result_image` as each tile's cascade completes. Row-major ordering of a
/// tile sequence is significant for deterministic progress reporting and
/// output naming.
#[derive(Debug, Clone)]
pub struct Tile {
    /// Zero-based grid row
    pub row: u32,
    /// Zero-based grid column
    pub col: u32,
    /// The original, unprocessed piece
    pub source: RgbaImage,
    /// Post-processed alpha mask, set once the tile's cascade completes
    pub result_alpha: Option<AlphaMask>,
    /// Source piece with the alpha channel written, set together with
    /// `result_alpha`
    pub result_image: Option<RgbaImage>,
}

impl Tile {
    /// Create an unprocessed tile
    #[must_use]
    pub fn new(row: u32, col: u32, source: RgbaImage) -> Self {
        Self {
            row,
            col,
            source,
            result_alpha: None,
            result_image: None,
        }
    }

    /// Deterministic output file name, `split_{row}_{col}.png` with 1-based
    /// positions
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("split_{}_{}.png", self.row + 1, self.col + 1)
    }

    /// Whether this tile's cascade has completed
    #[must_use]
    pub fn is_processed(&self) -> bool {
        self.result_image.is_some()
    }
}

/// Split an image into a row-major grid of tiles by rectangle copy
///
/// Trailing rows/columns absorb the remainder when the dimensions do not
/// divide evenly.
///
/// # Errors
///
/// Returns `PipelineError::InvalidConfig` when `rows` or `cols` is zero, or
/// when the grid is finer than the image.
pub fn split_image(image: &DynamicImage, rows: u32, cols: u32) -> Result<Vec<Tile>> {
    if rows == 0 || cols == 0 {
        return Err(PipelineError::invalid_config(
            "grid must have at least one row and one column",
        ));
    }
    let (width, height) = image.dimensions();
    if width < cols || height < rows {
        return Err(PipelineError::invalid_config(format!(
            "cannot split {width}x{height} image into {rows}x{cols} grid"
        )));
    }

    let rgba = image.to_rgba8();
    let piece_w = width / cols;
    let piece_h = height / rows;

    let mut tiles = Vec::with_capacity((rows * cols) as usize);
    for r in 0..rows {
        for c in 0..cols {
            let x = c * piece_w;
            let y = r * piece_h;
            let w = if c == cols - 1 { width - x } else { piece_w };
            let h = if r == rows - 1 { height - y } else { piece_h };
            let piece = imageops::crop_imm(&rgba, x, y, w, h).to_image();
            tiles.push(Tile::new(r, c, piece));
        }
    }
    Ok(tiles)
}

/// Outcome of a pipeline run: completed with a value, or cancelled
///
/// Cancellation is a first-class outcome, not an error. A cancelled tiled
/// run leaves already-completed tiles with their processed results and the
/// remaining tiles untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome<T> {
    /// The run completed and produced a value
    Completed(T),
    /// The run observed its cancellation token and unwound early
    Cancelled,
}

impl<T> PipelineOutcome<T> {
    /// Whether the run was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Unwrap the completed value, panicking on cancellation (test helper)
    #[must_use]
    pub fn into_completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Cancelled => None,
        }
    }
}

/// Result of a whole-image background removal run
#[derive(Debug, Clone)]
pub struct RemovalResult {
    /// The native-resolution image with the alpha channel written
    pub image: RgbaImage,
    /// The post-processed mask, at the refiner's output resolution
    pub mask: AlphaMask,
    /// Original image dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl RemovalResult {
    /// Create a new removal result
    #[must_use]
    pub fn new(image: RgbaImage, mask: AlphaMask, dimensions: (u32, u32)) -> Self {
        Self {
            image,
            mask,
            dimensions,
        }
    }

    /// Encode the result as PNG bytes (lossless, alpha-capable)
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Image` on encoding failures.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        DynamicImage::ImageRgba8(self.image.clone())
            .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)?;
        Ok(buffer)
    }

    /// Save the result as a PNG file
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Image` on encoding or IO failures.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}
