#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Grid-splitting background removal
//!
//! Local background removal built on a three-stage neural cascade (depth
//! estimation → matting → edge refinement) running on ONNX Runtime, with
//! grid splitting for tiled processing, cancellable orchestration, and
//! milestone progress reporting.
//!
//! ## Features
//!
//! - **Three-stage cascade**: depth conditioning, coarse matting, and
//!   native-resolution edge refinement
//! - **Grid splitting**: slice an image into tiles and process them in
//!   row-major order with per-tile result publication
//! - **Hardware acceleration**: CUDA and `CoreML` execution providers with
//!   automatic CPU fallback
//! - **Model management**: automatic downloading and caching of the cascade
//!   models from `HuggingFace`
//! - **Cancellation**: runs observe a `CancellationToken` between stages
//!   and between tiles; a cancelled run is a distinguished outcome, not an
//!   error
//! - **Progress reporting**: stable milestone percentages per stage, with a
//!   global percentage across tiles in tiled runs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gridcut_bgremove::{
//!     BackgroundRemovalPipeline, PipelineConfig, PipelineOutcome,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = PipelineConfig::builder()
//!     .threshold(0.5)
//!     .build()?;
//! let pipeline = BackgroundRemovalPipeline::new(config)?;
//!
//! let image = image::open("input.png")?;
//! let cancel = CancellationToken::new();
//!
//! match pipeline.remove_background(&image, &cancel).await? {
//!     PipelineOutcome::Completed(result) => result.save_png("output.png")?,
//!     PipelineOutcome::Cancelled => println!("cancelled"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Tiled processing
//!
//! ```rust,no_run
//! use gridcut_bgremove::{BackgroundRemovalPipeline, PipelineConfig, PipelineOutcome};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pipeline = BackgroundRemovalPipeline::new(PipelineConfig::default())?;
//! let image = image::open("input.png")?;
//!
//! if let PipelineOutcome::Completed(tiles) = pipeline
//!     .process_grid(&image, 4, 4, &CancellationToken::new())
//!     .await?
//! {
//!     for tile in &tiles {
//!         tile.result_image
//!             .as_ref()
//!             .expect("completed run processes every tile")
//!             .save(tile.file_name())?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod cascade;
pub mod compositor;
pub mod config;
pub mod download;
pub mod error;
pub mod geometry;
pub mod inference;
pub mod models;
pub mod postprocess;
pub mod processor;
pub mod services;
pub mod sessions;
pub mod tensor;
pub mod types;

// Public API exports
#[cfg(feature = "onnx")]
pub use backends::{is_accelerated_provider_available, OnnxBackend};
pub use config::{ExecutionProvider, MattingSettings, PipelineConfig, PipelineConfigBuilder};
pub use download::ModelDownloader;
pub use error::{PipelineError, Result};
pub use geometry::{fit_info, FitInfo};
pub use inference::{BackendFactory, InferenceBackend};
#[cfg(feature = "onnx")]
pub use inference::DefaultBackendFactory;
pub use models::ModelKind;
pub use processor::BackgroundRemovalPipeline;
pub use services::{
    CascadeStage, ConsoleProgressReporter, NoOpProgressReporter, ProgressReporter,
    ProgressTracker, ProgressUpdate,
};
pub use sessions::SessionManager;
pub use types::{split_image, AlphaMask, PipelineOutcome, RemovalResult, Tile};

/// Remove the background from an image provided as encoded bytes
///
/// Decodes the bytes, builds a pipeline from the given configuration, and
/// runs the cascade once. For repeated runs construct a
/// [`BackgroundRemovalPipeline`] and reuse it so model sessions stay warm.
#[cfg(feature = "onnx")]
pub async fn remove_background_from_bytes(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<PipelineOutcome<RemovalResult>> {
    let image = image::load_from_memory(image_bytes)
        .map_err(|e| PipelineError::processing(format!("Failed to decode image bytes: {e}")))?;
    remove_background_from_image(&image, config).await
}

/// Remove the background from a `DynamicImage` directly
///
/// One-shot convenience over [`BackgroundRemovalPipeline`]; the run cannot
/// be cancelled since the token never leaves this function.
#[cfg(feature = "onnx")]
pub async fn remove_background_from_image(
    image: &image::DynamicImage,
    config: &PipelineConfig,
) -> Result<PipelineOutcome<RemovalResult>> {
    let pipeline = BackgroundRemovalPipeline::new(config.clone())?;
    let cancel = tokio_util::sync::CancellationToken::new();
    pipeline.remove_background(image, &cancel).await
}
