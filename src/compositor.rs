//! Mask application
//!
//! Writes a finished alpha mask into an image's alpha channel. Color
//! channels are left untouched (straight alpha, no premultiplication).

use crate::types::AlphaMask;
use image::RgbaImage;

/// Apply an alpha mask to an image, returning a new image
///
/// The mask is resized to the image's dimensions when they differ. Mask
/// values are clamped to `[0, 1]` before quantization.
#[must_use]
pub fn apply_mask(image: &RgbaImage, mask: &AlphaMask) -> RgbaImage {
    let (width, height) = image.dimensions();

    let fitted;
    let mask = if mask.width == width && mask.height == height {
        mask
    } else {
        fitted = mask.resize_smooth(width, height);
        &fitted
    };

    let mut output = image.clone();
    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let value = mask.data[(y * width + x) as usize].clamp(0.0, 1.0);
        pixel.0[3] = (value * 255.0).round() as u8;
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn checker_image(width: u32, height: u32) -> RgbaImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([200, 50, 50, 255])
            } else {
                Rgba([50, 50, 200, 255])
            }
        })
    }

    #[test]
    fn test_alpha_written_colors_untouched() {
        let image = checker_image(4, 4);
        let mut data = vec![0.0f32; 16];
        data[5] = 1.0;
        data[6] = 0.5;
        let mask = AlphaMask::new(data, 4, 4).unwrap();

        let result = apply_mask(&image, &mask);

        assert_eq!(result.get_pixel(0, 0).0[3], 0);
        assert_eq!(result.get_pixel(1, 1).0[3], 255);
        assert_eq!(result.get_pixel(2, 1).0[3], 128);
        // Color channels are exactly the source's
        assert_eq!(&result.get_pixel(1, 1).0[..3], &image.get_pixel(1, 1).0[..3]);
        assert_eq!(&result.get_pixel(0, 0).0[..3], &image.get_pixel(0, 0).0[..3]);
    }

    #[test]
    fn test_out_of_range_values_clamp() {
        let image = checker_image(2, 1);
        let mask = AlphaMask::new(vec![-0.5, 1.5], 2, 1).unwrap();

        let result = apply_mask(&image, &mask);
        assert_eq!(result.get_pixel(0, 0).0[3], 0);
        assert_eq!(result.get_pixel(1, 0).0[3], 255);
    }

    #[test]
    fn test_mask_resized_to_image_dimensions() {
        let image = checker_image(8, 8);
        // 4x4 solid mask applied to an 8x8 image
        let mask = AlphaMask::new(vec![1.0; 16], 4, 4).unwrap();

        let result = apply_mask(&image, &mask);
        for pixel in result.pixels() {
            assert_eq!(pixel.0[3], 255);
        }
    }

    #[test]
    fn test_source_image_not_mutated() {
        let image = checker_image(3, 3);
        let mask = AlphaMask::new(vec![0.0; 9], 3, 3).unwrap();

        let _result = apply_mask(&image, &mask);
        assert!(image.pixels().all(|p| p.0[3] == 255));
    }
}
