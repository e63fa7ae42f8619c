//! Background removal pipeline orchestration
//!
//! This module provides the main `BackgroundRemovalPipeline` that runs the
//! cascade over a whole image or a grid of tiles, reports milestone
//! progress, and honors cancellation. One pipeline admits one run at a
//! time; a second submission while a run is active is rejected rather than
//! queued.

use crate::cascade;
use crate::compositor;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::inference::BackendFactory;
use crate::postprocess;
use crate::services::progress::{CascadeStage, ProgressReporter, ProgressTracker};
use crate::sessions::SessionManager;
use crate::types::{split_image, PipelineOutcome, RemovalResult, Tile};
use image::DynamicImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Releases the run-admission flag when the run finishes, however it ends
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Background removal pipeline over the depth/matting/refinement cascade
///
/// The pipeline is cheap to construct; model sessions are loaded lazily on
/// first use and reused across runs.
pub struct BackgroundRemovalPipeline {
    config: PipelineConfig,
    sessions: SessionManager,
    reporter: Arc<dyn ProgressReporter>,
    active: AtomicBool,
}

impl BackgroundRemovalPipeline {
    /// Create a pipeline using the default ONNX Runtime backend
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Cache directory setup failures
    #[cfg(feature = "onnx")]
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_factory(config, Arc::new(crate::inference::DefaultBackendFactory))
    }

    /// Create a pipeline with a custom backend factory
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Cache directory setup failures
    pub fn with_factory(config: PipelineConfig, factory: Arc<dyn BackendFactory>) -> Result<Self> {
        config.validate()?;
        let sessions = SessionManager::with_factory(config.clone(), factory)?;
        Ok(Self {
            config,
            sessions,
            reporter: Arc::new(crate::services::progress::NoOpProgressReporter),
            active: AtomicBool::new(false),
        })
    }

    /// Replace the progress reporter for subsequent runs
    pub fn set_progress_reporter(&mut self, reporter: Arc<dyn ProgressReporter>) {
        self.reporter = reporter;
    }

    /// The configuration this pipeline was built with
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Download any missing model files ahead of the first run
    ///
    /// # Errors
    /// - Network or file system errors during download
    pub async fn prefetch_models(&self) -> Result<()> {
        self.sessions.prefetch_models().await
    }

    /// Remove the background from a single image
    ///
    /// Returns `PipelineOutcome::Cancelled` when the token fires before the
    /// run finishes; partial work is discarded. A run submitted while
    /// another is active fails with `RunInProgress`.
    ///
    /// # Errors
    /// - `RunInProgress` when another run is active
    /// - Session load, inference, or image processing failures
    pub async fn remove_background(
        &self,
        image: &DynamicImage,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome<RemovalResult>> {
        let _guard = self.admit()?;
        let mut tracker = ProgressTracker::new(self.reporter.clone());

        let span = tracing::info_span!(
            "remove_background",
            width = image.width(),
            height = image.height()
        );
        let result = self
            .run_single(image, cancel, &mut tracker)
            .instrument(span)
            .await;
        self.conclude(result, &tracker)
    }

    async fn run_single(
        &self,
        image: &DynamicImage,
        cancel: &CancellationToken,
        tracker: &mut ProgressTracker,
    ) -> Result<RemovalResult> {
        tracker.report_stage(CascadeStage::Initializing);
        let rgba = image.to_rgba8();
        let dimensions = rgba.dimensions();

        let mask = cascade::run_cascade(&self.sessions, &rgba, cancel, |stage| {
            tracker.report_stage(stage);
        })
        .await?;

        tracker.report_stage(CascadeStage::Finalizing);
        let mask = postprocess::apply_settings(&mask, &self.config.settings);
        let output = compositor::apply_mask(&rgba, &mask);

        tracker.report_stage(CascadeStage::Done);
        Ok(RemovalResult::new(output, mask, dimensions))
    }

    /// Remove the background from every tile of a grid, in row-major order
    ///
    /// Results are published per tile: each tile's `result_alpha` and
    /// `result_image` are set as soon as that tile's cascade completes, so
    /// a cancelled run keeps the tiles already finished. The pipeline pauses
    /// for `tile_yield` before and after each tile's work so cancellation
    /// and UI updates get a chance to land.
    ///
    /// # Errors
    /// - `RunInProgress` when another run is active
    /// - Session load, inference, or image processing failures; tiles
    ///   finished before the failure keep their results
    pub async fn remove_background_tiled(
        &self,
        tiles: &mut [Tile],
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome<()>> {
        let _guard = self.admit()?;
        let mut tracker = ProgressTracker::new(self.reporter.clone());

        let span = tracing::info_span!("remove_background_tiled", tiles = tiles.len());
        let result = self
            .run_tiled(tiles, cancel, &mut tracker)
            .instrument(span)
            .await;
        self.conclude(result, &tracker)
    }

    async fn run_tiled(
        &self,
        tiles: &mut [Tile],
        cancel: &CancellationToken,
        tracker: &mut ProgressTracker,
    ) -> Result<()> {
        let total = tiles.len();

        for (index, tile) in tiles.iter_mut().enumerate() {
            // Yield before the tile's work so the caller's rendering and
            // cancellation loop runs, then observe the flag
            tokio::time::sleep(self.config.tile_yield).await;
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            tracker.report_tile_stage(CascadeStage::Initializing, index, total);
            log::debug!(
                "Processing tile {n}/{total} ({file})",
                n = index + 1,
                file = tile.file_name()
            );

            let mask = cascade::run_cascade(&self.sessions, &tile.source, cancel, |stage| {
                tracker.report_tile_stage(stage, index, total);
            })
            .await?;

            tracker.report_tile_stage(CascadeStage::Finalizing, index, total);
            let mask = postprocess::apply_settings(&mask, &self.config.settings);
            let output = compositor::apply_mask(&tile.source, &mask);

            tile.result_alpha = Some(mask);
            tile.result_image = Some(output);
            tracker.report_tile_stage(CascadeStage::Done, index, total);

            // Yield again after publication so observers see the tile land
            tokio::time::sleep(self.config.tile_yield).await;
        }

        Ok(())
    }

    /// Split an image into a grid and remove the background from every tile
    ///
    /// Convenience over [`split_image`] plus
    /// [`remove_background_tiled`](Self::remove_background_tiled). The tile
    /// vector is returned even when the run is cancelled partway, carrying
    /// whatever tiles finished.
    ///
    /// # Errors
    /// - Invalid grid dimensions
    /// - `RunInProgress` when another run is active
    /// - Session load, inference, or image processing failures
    pub async fn process_grid(
        &self,
        image: &DynamicImage,
        rows: u32,
        cols: u32,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome<Vec<Tile>>> {
        let mut tiles = split_image(image, rows, cols)?;
        match self.remove_background_tiled(&mut tiles, cancel).await? {
            PipelineOutcome::Completed(()) => Ok(PipelineOutcome::Completed(tiles)),
            PipelineOutcome::Cancelled => Ok(PipelineOutcome::Cancelled),
        }
    }

    /// Admit a run, rejecting if one is already active
    fn admit(&self) -> Result<RunGuard<'_>> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PipelineError::RunInProgress)?;
        Ok(RunGuard(&self.active))
    }

    /// Convert the internal result into the public outcome
    ///
    /// Cancellation unwinds through the cascade as an error for `?` but is
    /// a distinguished outcome to callers, never a failure.
    fn conclude<T>(
        &self,
        result: Result<T>,
        tracker: &ProgressTracker,
    ) -> Result<PipelineOutcome<T>> {
        match result {
            Ok(value) => Ok(PipelineOutcome::Completed(value)),
            Err(PipelineError::Cancelled) => {
                tracker.report_cancelled();
                log::info!("Run cancelled after {ms}ms", ms = tracker.elapsed_ms());
                Ok(PipelineOutcome::Cancelled)
            },
            Err(e) => {
                tracker.report_error(&e.to_string());
                Err(e)
            },
        }
    }
}
