//! Alpha mask post-processing
//!
//! Applies the user-facing matting settings to a refined mask in a fixed
//! order: morphological expand/erode, then opacity boost, then threshold.
//! The order is load-bearing; reordering changes results.

use crate::config::MattingSettings;
use crate::types::AlphaMask;

/// Apply the full post-processing chain to a mask
#[must_use]
pub fn apply_settings(mask: &AlphaMask, settings: &MattingSettings) -> AlphaMask {
    let mut data = if settings.expand != 0 {
        morph(
            &mask.data,
            mask.width,
            mask.height,
            settings.expand.unsigned_abs(),
            settings.expand > 0,
        )
    } else {
        mask.data.clone()
    };

    boost_opacity(&mut data, settings.opacity_boost);
    apply_threshold(&mut data, settings.threshold);

    AlphaMask {
        data,
        width: mask.width,
        height: mask.height,
    }
}

/// Separable windowed extremum filter
///
/// Two passes (horizontal, then vertical) with a window of `radius` pixels
/// on each side. `dilate` takes the window maximum, erode the minimum.
/// Windows clamp at the buffer edges. This is the brute-force form; cost
/// grows with the radius.
fn morph(data: &[f32], width: u32, height: u32, radius: u32, dilate: bool) -> Vec<f32> {
    let horizontal = morph_pass(data, width, height, radius, dilate, true);
    morph_pass(&horizontal, width, height, radius, dilate, false)
}

fn morph_pass(
    data: &[f32],
    width: u32,
    height: u32,
    radius: u32,
    dilate: bool,
    horizontal: bool,
) -> Vec<f32> {
    let width = width as usize;
    let height = height as usize;
    let radius = radius as usize;
    let mut out = vec![0.0f32; data.len()];

    for y in 0..height {
        for x in 0..width {
            let (pos, limit) = if horizontal { (x, width) } else { (y, height) };
            let lo = pos.saturating_sub(radius);
            let hi = (pos + radius).min(limit - 1);

            let mut extremum = if dilate { f32::NEG_INFINITY } else { f32::INFINITY };
            for k in lo..=hi {
                let idx = if horizontal { y * width + k } else { k * width + x };
                let value = data[idx];
                if dilate {
                    extremum = extremum.max(value);
                } else {
                    extremum = extremum.min(value);
                }
            }
            out[y * width + x] = extremum;
        }
    }

    out
}

/// Multiply non-zero values by the boost factor, clamped to 1
///
/// Exact zeros stay zero so boosting never manufactures foreground out of
/// pure background.
fn boost_opacity(data: &mut [f32], boost: f32) {
    if (boost - 1.0).abs() < f32::EPSILON {
        return;
    }
    for value in data.iter_mut() {
        if *value > 0.0 {
            *value = (*value * boost).min(1.0);
        }
    }
}

/// Force values strictly below the threshold to exactly 0
///
/// Surviving values keep their boosted magnitude; there is no snap to 1.
fn apply_threshold(data: &mut [f32], threshold: f32) {
    if threshold <= 0.0 {
        return;
    }
    for value in data.iter_mut() {
        if *value < threshold {
            *value = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(data: Vec<f32>, width: u32, height: u32) -> AlphaMask {
        AlphaMask::new(data, width, height).unwrap()
    }

    fn neutral_settings() -> MattingSettings {
        MattingSettings {
            threshold: 0.0,
            opacity_boost: 1.0,
            expand: 0,
        }
    }

    #[test]
    fn test_neutral_settings_are_identity() {
        let mask = mask_from(vec![0.0, 0.25, 0.5, 0.75, 1.0, 0.1], 3, 2);
        let result = apply_settings(&mask, &neutral_settings());
        assert_eq!(result.data, mask.data);
    }

    #[test]
    fn test_threshold_hard_cutoff_keeps_surviving_values() {
        let mask = mask_from(vec![0.1, 0.49, 0.5, 0.51, 1.0, 0.0], 3, 2);
        let settings = MattingSettings {
            threshold: 0.5,
            ..neutral_settings()
        };
        let result = apply_settings(&mask, &settings);
        assert_eq!(result.data, vec![0.0, 0.0, 0.5, 0.51, 1.0, 0.0]);
    }

    #[test]
    fn test_threshold_one_keeps_only_exact_ones() {
        let mask = mask_from(vec![0.2, 0.999, 1.0, 0.7], 2, 2);
        let settings = MattingSettings {
            threshold: 1.0,
            ..neutral_settings()
        };
        let result = apply_settings(&mask, &settings);
        assert_eq!(result.data, vec![0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_threshold_is_idempotent() {
        let mask = mask_from(vec![0.1, 0.4, 0.6, 0.9], 2, 2);
        let settings = MattingSettings {
            threshold: 0.55,
            ..neutral_settings()
        };
        let once = apply_settings(&mask, &settings);
        let twice = apply_settings(&once, &settings);
        assert_eq!(once.data, twice.data);
    }

    #[test]
    fn test_boost_clamps_and_preserves_zeros() {
        let mask = mask_from(vec![0.0, 0.3, 0.6, 1.0], 2, 2);
        let settings = MattingSettings {
            opacity_boost: 5.0,
            ..neutral_settings()
        };
        let result = apply_settings(&mask, &settings);
        // 0.3 * 5 clamps to 1.0; zero never becomes foreground
        assert_eq!(result.data, vec![0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_boosted_pixel_survives_default_threshold() {
        let mask = mask_from(vec![0.3], 1, 1);
        let settings = MattingSettings {
            threshold: 0.5,
            opacity_boost: 5.0,
            expand: 0,
        };
        let result = apply_settings(&mask, &settings);
        assert_eq!(result.data, vec![1.0]);
    }

    #[test]
    fn test_dilation_grows_single_pixel() {
        // Single foreground pixel in the center of a 5x5 mask
        let mut data = vec![0.0f32; 25];
        data[12] = 1.0;
        let mask = mask_from(data, 5, 5);

        let settings = MattingSettings {
            expand: 1,
            ..neutral_settings()
        };
        let result = apply_settings(&mask, &settings);

        // Separable passes turn the point into a 3x3 block
        for y in 1..=3u32 {
            for x in 1..=3u32 {
                assert_eq!(result.data[(y * 5 + x) as usize], 1.0, "at ({x},{y})");
            }
        }
        assert_eq!(result.foreground_count(), 9);
    }

    #[test]
    fn test_erosion_shrinks_block() {
        // 3x3 foreground block in a 5x5 mask
        let mut data = vec![0.0f32; 25];
        for y in 1..=3u32 {
            for x in 1..=3u32 {
                data[(y * 5 + x) as usize] = 1.0;
            }
        }
        let mask = mask_from(data, 5, 5);

        let settings = MattingSettings {
            expand: -1,
            ..neutral_settings()
        };
        let result = apply_settings(&mask, &settings);

        // Only the center survives a radius-1 erosion
        assert_eq!(result.foreground_count(), 1);
        assert_eq!(result.data[12], 1.0);
    }

    #[test]
    fn test_morphology_monotonic_foreground_count() {
        let mut data = vec![0.0f32; 64];
        for idx in [9, 10, 18, 27, 36, 45] {
            data[idx] = 0.8;
        }
        let mask = mask_from(data, 8, 8);
        let base_count = mask.foreground_count();

        for k in 1..=3 {
            let dilated = apply_settings(
                &mask,
                &MattingSettings {
                    expand: k,
                    ..neutral_settings()
                },
            );
            assert!(dilated.foreground_count() >= base_count);

            let eroded = apply_settings(
                &mask,
                &MattingSettings {
                    expand: -k,
                    ..neutral_settings()
                },
            );
            assert!(eroded.foreground_count() <= base_count);
        }
    }

    #[test]
    fn test_morphology_clamps_at_borders() {
        // Foreground pixel in the corner; dilation must not wrap
        let mut data = vec![0.0f32; 16];
        data[0] = 1.0;
        let mask = mask_from(data, 4, 4);

        let settings = MattingSettings {
            expand: 1,
            ..neutral_settings()
        };
        let result = apply_settings(&mask, &settings);

        assert_eq!(result.data[0], 1.0);
        assert_eq!(result.data[1], 1.0);
        assert_eq!(result.data[4], 1.0);
        assert_eq!(result.data[5], 1.0);
        // Opposite corner untouched
        assert_eq!(result.data[15], 0.0);
        assert_eq!(result.foreground_count(), 4);
    }
}
