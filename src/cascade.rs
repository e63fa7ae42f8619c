//! The three-stage matting cascade
//!
//! Depth estimation conditions the matting model, whose coarse alpha is then
//! refined at native resolution:
//!
//! 1. Depth: RGB letterboxed to 518x518, output min-max normalized.
//! 2. Matting: RGB letterboxed to 256x256 plus the depth plane resized to
//!    match, 4 input channels, producing a coarse alpha.
//! 3. Refinement: RGB at native size plus the depth and coarse alpha planes
//!    reprojected (crop valid region, then resize) to native size, 5 input
//!    channels, producing the final alpha.
//!
//! Each network is free to emit at a resolution other than its input canvas;
//! every stage reads the actual width and height from the output tensor and
//! carries a [`FitInfo`] describing the source image's placement inside that
//! output grid, so downstream consumers never assume dimensions.
//!
//! Cancellation is checked after each stage announcement and after each
//! stage completes; a cancelled run unwinds with
//! `PipelineError::Cancelled` and the orchestrator turns that into a
//! distinguished outcome.

use crate::error::{PipelineError, Result};
use crate::geometry::{fit_info, FitInfo};
use crate::models::ModelKind;
use crate::services::progress::CascadeStage;
use crate::sessions::SessionManager;
use crate::tensor;
use crate::types::AlphaMask;
use image::RgbaImage;
use ndarray::Array4;
use tokio_util::sync::CancellationToken;

/// Run the full cascade on one image, producing its alpha mask
///
/// The mask comes back at the refiner's own output resolution, which is
/// expected to closely match the image but is not guaranteed to; callers
/// resize when applying it.
///
/// `on_stage` fires as each stage begins, in order. The token is observed
/// again right after each `on_stage` call, so a caller cancelling from its
/// progress handler stops the run before the announced stage does any work.
///
/// # Errors
/// - `Cancelled` when the token fires between stages
/// - Session load or inference failures from any stage
pub async fn run_cascade(
    sessions: &SessionManager,
    image: &RgbaImage,
    cancel: &CancellationToken,
    mut on_stage: impl FnMut(CascadeStage),
) -> Result<AlphaMask> {
    check_cancelled(cancel)?;

    on_stage(CascadeStage::Depth);
    check_cancelled(cancel)?;
    let depth = depth_stage(sessions, image).await?;
    check_cancelled(cancel)?;

    on_stage(CascadeStage::Matting);
    check_cancelled(cancel)?;
    let coarse = matting_stage(sessions, image, &depth.mask).await?;
    check_cancelled(cancel)?;

    on_stage(CascadeStage::Refining);
    check_cancelled(cancel)?;
    let refined = refinement_stage(sessions, image, &depth, &coarse).await?;
    check_cancelled(cancel)?;

    Ok(refined)
}

/// An intermediate conditioning plane paired with the placement of the
/// source image inside it
///
/// The fit travels with the buffer it describes; consumers crop and resize
/// through this record rather than recomputing offsets from assumed canvas
/// sizes.
struct StagePlane {
    mask: AlphaMask,
    fit: FitInfo,
}

impl StagePlane {
    /// Build a plane from a network output, reusing the letterbox fit when
    /// the network emitted at canvas resolution and deriving a fresh one
    /// from the output's own dimensions otherwise
    fn new(mask: AlphaMask, canvas: u32, canvas_fit: FitInfo, source: &RgbaImage) -> Self {
        let fit = if (mask.width, mask.height) == (canvas, canvas) {
            canvas_fit
        } else {
            let (src_w, src_h) = source.dimensions();
            fit_info(src_w, src_h, mask.width, mask.height)
        };
        Self { mask, fit }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

/// Stage 1: depth estimation on a 518x518 letterboxed canvas
///
/// The raw depth output is min-max normalized so downstream stages see a
/// consistent `[0, 1]` conditioning signal regardless of the scene's
/// absolute depth range.
async fn depth_stage(sessions: &SessionManager, image: &RgbaImage) -> Result<StagePlane> {
    let size = ModelKind::Depth
        .input_size()
        .ok_or_else(|| PipelineError::internal("depth model has no fixed input size"))?;
    let (canvas, canvas_fit) = tensor::letterbox(image, size);

    let chw = tensor::image_to_chw(&canvas, &[0, 1, 2]);
    let input = tensor::chw_to_tensor(chw, 3, size, size)?;

    let output = sessions.infer(ModelKind::Depth, &input).await?;
    let (plane, out_w, out_h) = plane_data(&output)?;
    let normalized = tensor::normalize_min_max(&plane);

    let mask = AlphaMask::new(normalized, out_w, out_h)?;
    Ok(StagePlane::new(mask, size, canvas_fit, image))
}

/// Stage 2: coarse matting conditioned on depth
///
/// The depth plane computed on the 518 canvas is resized straight to the
/// 256 canvas. Both canvases letterbox with the same aspect, so content and
/// padding line up without a crop.
async fn matting_stage(
    sessions: &SessionManager,
    image: &RgbaImage,
    depth: &AlphaMask,
) -> Result<StagePlane> {
    let size = ModelKind::Matting
        .input_size()
        .ok_or_else(|| PipelineError::internal("matting model has no fixed input size"))?;
    let (canvas, canvas_fit) = tensor::letterbox(image, size);

    let depth_small = tensor::resize_mask_to_square(depth, size);

    let mut chw = tensor::image_to_chw(&canvas, &[0, 1, 2]);
    chw.extend_from_slice(&depth_small.data);
    let input = tensor::chw_to_tensor(chw, 4, size, size)?;

    let output = sessions.infer(ModelKind::Matting, &input).await?;
    let (plane, out_w, out_h) = plane_data(&output)?;

    let mask = AlphaMask::new(plane, out_w, out_h)?;
    Ok(StagePlane::new(mask, size, canvas_fit, image))
}

/// Stage 3: edge refinement at native resolution
///
/// Depth and coarse alpha were computed on padded square canvases, so each
/// is cropped to its valid region (via the fit that traveled with it)
/// before resizing to native size. The five input channels are RGB, depth,
/// coarse alpha, in that order.
async fn refinement_stage(
    sessions: &SessionManager,
    image: &RgbaImage,
    depth: &StagePlane,
    coarse: &StagePlane,
) -> Result<AlphaMask> {
    let (width, height) = image.dimensions();

    let depth_native = tensor::reproject_mask(&depth.mask, depth.fit, width, height);
    let alpha_native = tensor::reproject_mask(&coarse.mask, coarse.fit, width, height);

    let mut chw = rgba_to_rgb_chw(image);
    chw.extend_from_slice(&depth_native.data);
    chw.extend_from_slice(&alpha_native.data);
    let input = tensor::chw_to_tensor(chw, 5, height, width)?;

    let output = sessions.infer(ModelKind::Refiner, &input).await?;
    let (plane, out_w, out_h) = plane_data(&output)?;

    AlphaMask::new(plane, out_w, out_h)
}

/// Pull the single-channel plane out of an NCHW output together with the
/// spatial size the network actually emitted
fn plane_data(output: &Array4<f32>) -> Result<(Vec<f32>, u32, u32)> {
    let shape = output.shape();
    if shape[0] != 1 || shape[1] != 1 {
        return Err(PipelineError::inference(format!(
            "expected single-channel output, got shape {shape:?}"
        )));
    }
    let width = u32::try_from(shape[3])
        .map_err(|_| PipelineError::inference(format!("output width out of range: {shape:?}")))?;
    let height = u32::try_from(shape[2])
        .map_err(|_| PipelineError::inference(format!("output height out of range: {shape:?}")))?;
    Ok((output.iter().copied().collect(), width, height))
}

/// RGB planes of an RGBA image, scaled to `[0, 1]`, alpha dropped
fn rgba_to_rgb_chw(image: &RgbaImage) -> Vec<f32> {
    let (width, height) = image.dimensions();
    let plane = (width as usize) * (height as usize);
    let mut out = Vec::with_capacity(3 * plane);
    for channel in 0..3 {
        for pixel in image.pixels() {
            out.push(f32::from(pixel.0[channel]) / 255.0);
        }
    }
    out
}
