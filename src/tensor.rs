//! Image ⇄ tensor and mask conversions for the cascade stages
//!
//! Consolidates the letterbox draw, channel-first float extraction, min-max
//! normalization, and the crop-before-resize reprojection of masks computed
//! on padded square canvases.

use crate::error::{PipelineError, Result};
use crate::geometry::{fit_info, FitInfo};
use crate::types::AlphaMask;
use image::{imageops, ImageBuffer, Rgb, RgbImage, RgbaImage};
use ndarray::Array4;

/// Neutral fill used when letterboxing onto a square stage canvas
pub const LETTERBOX_FILL: [u8; 3] = [128, 128, 128];

/// Letterbox an image onto a square canvas of the given size
///
/// The content is resized with aspect preserved and centered; the padding is
/// the neutral gray fill. Returns the canvas together with the [`FitInfo`]
/// that placed the content, which later stages need to crop the valid
/// region back out of results computed on this canvas.
#[must_use]
pub fn letterbox(image: &RgbaImage, target: u32) -> (RgbImage, FitInfo) {
    let (src_w, src_h) = image.dimensions();
    let fit = fit_info(src_w, src_h, target, target);

    let resized = imageops::resize(
        image,
        fit.new_w,
        fit.new_h,
        imageops::FilterType::Triangle,
    );

    let mut canvas: RgbImage = ImageBuffer::from_pixel(target, target, Rgb(LETTERBOX_FILL));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let canvas_x = x + fit.offset_x;
        let canvas_y = y + fit.offset_y;
        if canvas_x < target && canvas_y < target {
            let [r, g, b, _] = pixel.0;
            canvas.put_pixel(canvas_x, canvas_y, Rgb([r, g, b]));
        }
    }

    (canvas, fit)
}

/// Extract a channel-first float plane set from an RGB image
///
/// Values are scaled to `[0, 1]` by dividing by 255. `channel_order` selects
/// which source channels are emitted and in what order (e.g. `[2, 1, 0]`
/// for BGR models).
#[must_use]
pub fn image_to_chw(image: &RgbImage, channel_order: &[usize]) -> Vec<f32> {
    let (width, height) = image.dimensions();
    let plane = (width as usize) * (height as usize);
    let mut out = Vec::with_capacity(channel_order.len() * plane);
    for &channel in channel_order {
        for pixel in image.pixels() {
            out.push(f32::from(pixel.0.get(channel).copied().unwrap_or(0)) / 255.0);
        }
    }
    out
}

/// Build an NCHW tensor from channel-first planes
///
/// # Errors
///
/// Returns `PipelineError::Processing` when the plane data does not match
/// the requested shape.
pub fn chw_to_tensor(data: Vec<f32>, channels: usize, height: u32, width: u32) -> Result<Array4<f32>> {
    Array4::from_shape_vec((1, channels, height as usize, width as usize), data)
        .map_err(|e| PipelineError::processing(format!("tensor shape mismatch: {e}")))
}

/// Stretch a float buffer so its minimum maps to 0 and its maximum to 1
///
/// A flat input (dynamic range below epsilon) collapses to the constant 0.5,
/// avoiding a division blow-up while keeping a neutral conditioning signal.
#[must_use]
pub fn normalize_min_max(values: &[f32]) -> Vec<f32> {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in values {
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }

    if max - min < 1e-8 {
        return vec![0.5; values.len()];
    }
    let range = max - min;
    values.iter().map(|&v| (v - min) / range).collect()
}

/// Reproject a mask computed on a padded square canvas onto an unpadded target
///
/// Crops the valid (non-pad) region located by `fit` out of the mask, then
/// resizes the crop to `target_w x target_h` with smoothing. Skipping the
/// crop misaligns content with padding borders.
#[must_use]
pub fn reproject_mask(mask: &AlphaMask, fit: FitInfo, target_w: u32, target_h: u32) -> AlphaMask {
    let luma = mask.to_luma_image();
    let valid = imageops::crop_imm(&luma, fit.offset_x, fit.offset_y, fit.new_w, fit.new_h)
        .to_image();
    let resized = imageops::resize(&valid, target_w, target_h, imageops::FilterType::Triangle);
    AlphaMask::from_luma_image(&resized)
}

/// Resize a mask to a square stage canvas without cropping
///
/// Used when mask and image were letterboxed with the same aspect, so the
/// padding regions already line up.
#[must_use]
pub fn resize_mask_to_square(mask: &AlphaMask, target: u32) -> AlphaMask {
    mask.resize_smooth(target, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid_image(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        ImageBuffer::from_pixel(width, height, Rgba(color))
    }

    #[test]
    fn test_letterbox_pads_with_neutral_fill() {
        let image = solid_image(100, 50, [255, 0, 0, 255]);
        let (canvas, fit) = letterbox(&image, 64);

        assert_eq!(canvas.dimensions(), (64, 64));
        assert_eq!(fit.new_w, 64);
        assert_eq!(fit.new_h, 32);
        assert_eq!(fit.offset_y, 16);

        // Padding rows above and below the content keep the neutral fill
        assert_eq!(canvas.get_pixel(0, 0).0, LETTERBOX_FILL);
        assert_eq!(canvas.get_pixel(63, 63).0, LETTERBOX_FILL);
        // Content is centered
        assert_eq!(canvas.get_pixel(32, 32).0, [255, 0, 0]);
    }

    #[test]
    fn test_letterbox_exact_aspect_has_no_padding() {
        let image = solid_image(32, 32, [0, 255, 0, 255]);
        let (canvas, fit) = letterbox(&image, 64);
        assert_eq!(fit.offset_x, 0);
        assert_eq!(fit.offset_y, 0);
        assert_eq!(canvas.get_pixel(0, 0).0, [0, 255, 0]);
        assert_eq!(canvas.get_pixel(63, 63).0, [0, 255, 0]);
    }

    #[test]
    fn test_image_to_chw_scales_and_orders() {
        let mut image: RgbImage = ImageBuffer::new(2, 1);
        image.put_pixel(0, 0, Rgb([255, 0, 51]));
        image.put_pixel(1, 0, Rgb([0, 255, 102]));

        let chw = image_to_chw(&image, &[0, 1, 2]);
        assert_eq!(chw.len(), 6);
        // R plane
        assert_eq!(chw[0], 1.0);
        assert_eq!(chw[1], 0.0);
        // G plane
        assert_eq!(chw[2], 0.0);
        assert_eq!(chw[3], 1.0);
        // B plane
        assert!((chw[4] - 0.2).abs() < 1e-6);
        assert!((chw[5] - 0.4).abs() < 1e-6);

        // Reversed channel order flips the planes
        let bgr = image_to_chw(&image, &[2, 1, 0]);
        assert!((bgr[0] - 0.2).abs() < 1e-6);
        assert_eq!(bgr[4], 1.0);
    }

    #[test]
    fn test_chw_to_tensor_shape() {
        let tensor = chw_to_tensor(vec![0.0; 3 * 4 * 4], 3, 4, 4).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 4, 4]);

        assert!(chw_to_tensor(vec![0.0; 5], 3, 4, 4).is_err());
    }

    #[test]
    fn test_normalize_min_max_stretches() {
        let normalized = normalize_min_max(&[2.0, 4.0, 6.0]);
        assert_eq!(normalized, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_normalize_min_max_flat_collapses_to_half() {
        let normalized = normalize_min_max(&[3.0, 3.0, 3.0]);
        assert_eq!(normalized, vec![0.5, 0.5, 0.5]);

        let nearly_flat = normalize_min_max(&[1.0, 1.0 + 1e-9]);
        assert_eq!(nearly_flat, vec![0.5, 0.5]);
    }

    #[test]
    fn test_reproject_mask_recovers_unpadded_content() {
        // Build a 64x64 "padded" mask whose valid region (a 64x32 center
        // band) is fully foreground and whose padding is background.
        let fit = fit_info(100, 50, 64, 64);
        let mut data = vec![0.0f32; 64 * 64];
        for y in fit.offset_y..fit.offset_y + fit.new_h {
            for x in 0..64u32 {
                data[(y * 64 + x) as usize] = 1.0;
            }
        }
        let mask = AlphaMask::new(data, 64, 64).unwrap();

        let reprojected = reproject_mask(&mask, fit, 100, 50);
        assert_eq!(reprojected.width, 100);
        assert_eq!(reprojected.height, 50);
        // The interior of the reprojected mask is solid foreground; only the
        // resampling at the very border may soften.
        let center = reprojected.data[(25 * 100 + 50) as usize];
        assert!((center - 1.0).abs() < 1e-3);
    }
}
