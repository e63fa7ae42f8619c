//! Aspect-preserving fit and letterbox math shared by all cascade stages
//!
//! Every stage that letterboxes an image onto a fixed square canvas, and
//! every stage that later needs to crop the valid (non-pad) region back out
//! again, goes through [`FitInfo`]. Threading the same record through both
//! directions is what keeps the mask content registered with the image
//! content; recomputing offsets ad hoc is how misalignment bugs happen.

/// Placement of a source rectangle letterboxed into a target rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitInfo {
    /// Uniform scale factor applied to the source
    pub scale: f32,
    /// Scaled content width
    pub new_w: u32,
    /// Scaled content height
    pub new_h: u32,
    /// Horizontal offset of the content inside the target
    pub offset_x: u32,
    /// Vertical offset of the content inside the target
    pub offset_y: u32,
}

/// Compute the aspect-preserving placement of `src` inside `target`
///
/// `scale = min(target_w / src_w, target_h / src_h)`; the scaled content is
/// centered, with offsets floored. The same record locates the valid region
/// of a letterboxed intermediate when cropping it back out.
#[must_use]
pub fn fit_info(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> FitInfo {
    let scale = (target_w as f32 / src_w as f32).min(target_h as f32 / src_h as f32);
    let new_w = (src_w as f32 * scale).round() as u32;
    let new_h = (src_h as f32 * scale).round() as u32;
    // Integer division floors, matching floor((target - new) / 2)
    let offset_x = target_w.saturating_sub(new_w) / 2;
    let offset_y = target_h.saturating_sub(new_h) / 2;

    FitInfo {
        scale,
        new_w,
        new_h,
        offset_x,
        offset_y,
    }
}
