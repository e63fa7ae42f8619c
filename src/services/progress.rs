//! Progress reporting service
//!
//! This module separates progress reporting concerns from the cascade and
//! orchestration logic, allowing different frontends to implement their own
//! progress handling. Milestone percentages are part of the pipeline's
//! contract and must stay stable across releases.

use instant::Instant;
use std::sync::Arc;

/// Progress stages during a background removal run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeStage {
    /// Run admitted, sessions about to warm up
    Initializing,
    /// Running depth estimation
    Depth,
    /// Running coarse matting
    Matting,
    /// Running edge refinement
    Refining,
    /// Post-processing and compositing the result
    Finalizing,
    /// Run completed
    Done,
}

impl CascadeStage {
    /// Get a human-readable description of the stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            CascadeStage::Initializing => "Initializing...",
            CascadeStage::Depth => "Processing Depth...",
            CascadeStage::Matting => "Processing Matting...",
            CascadeStage::Refining => "Refining Edges...",
            CascadeStage::Finalizing => "Finalizing...",
            CascadeStage::Done => "Done",
        }
    }

    /// Milestone percentage for this stage within a single image run
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            CascadeStage::Initializing => 0,
            CascadeStage::Depth => 10,
            CascadeStage::Matting => 40,
            CascadeStage::Refining => 70,
            CascadeStage::Finalizing => 90,
            CascadeStage::Done => 100,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current processing stage
    pub stage: CascadeStage,
    /// Overall progress percentage (0-100); in tiled runs this is the
    /// global percentage across all tiles, not the current tile's
    pub progress: u8,
    /// Human-readable stage description
    pub description: String,
    /// Tile position as (index, total) when part of a tiled run
    pub tile: Option<(usize, usize)>,
    /// Elapsed time since the run started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    /// Create a progress update for a whole-image run
    #[must_use]
    pub fn new(stage: CascadeStage, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            tile: None,
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
        }
    }

    /// Create a progress update for one tile of a tiled run
    ///
    /// The global percentage interleaves per-tile stage milestones:
    /// `((index * 100) + stage_percent) / total`.
    #[must_use]
    pub fn for_tile(stage: CascadeStage, index: usize, total: usize, start_time: Instant) -> Self {
        let total = total.max(1);
        let global = (index * 100 + usize::from(stage.progress_percentage())) / total;
        Self {
            progress: global.min(100) as u8,
            description: stage.description().to_string(),
            tile: Some((index, total)),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
        }
    }
}

/// Trait for reporting progress during background removal runs
pub trait ProgressReporter: Send + Sync {
    /// Report a progress update
    fn report_progress(&self, update: ProgressUpdate);

    /// Report an error during processing
    fn report_error(&self, stage: CascadeStage, error: &str);

    /// Report that the run was cancelled
    fn report_cancelled(&self) {
        // Default implementation does nothing
    }
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {
        // Intentionally empty - discards progress updates
    }

    fn report_error(&self, _stage: CascadeStage, _error: &str) {
        // Intentionally empty - discards error reports
    }
}

/// Console progress reporter that logs progress via the `log` facade
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some((index, total)) = update.tile {
            log::info!(
                "[{progress}%] tile {n}/{total}: {description}",
                progress = update.progress,
                n = index + 1,
                total = total,
                description = update.description
            );
        } else if self.verbose {
            log::info!(
                "[{progress}%] {description} ({elapsed}ms elapsed)",
                progress = update.progress,
                description = update.description,
                elapsed = update.elapsed_ms
            );
        } else {
            log::info!(
                "[{progress}%] {description}",
                progress = update.progress,
                description = update.description
            );
        }
    }

    fn report_error(&self, stage: CascadeStage, error: &str) {
        log::error!(
            "❌ Error during {stage}: {error}",
            stage = stage.description()
        );
    }

    fn report_cancelled(&self) {
        log::info!("Run cancelled");
    }
}

/// Progress tracker that manages timing and milestone reporting for one run
pub struct ProgressTracker {
    reporter: Arc<dyn ProgressReporter>,
    start_time: Instant,
    current_stage: Option<CascadeStage>,
}

impl ProgressTracker {
    /// Create a new progress tracker with the specified reporter
    #[must_use]
    pub fn new(reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
        }
    }

    /// Create a progress tracker with no-op reporter
    #[must_use]
    pub fn no_op() -> Self {
        Self::new(Arc::new(NoOpProgressReporter))
    }

    /// Create a progress tracker with console reporter
    #[must_use]
    pub fn console(verbose: bool) -> Self {
        Self::new(Arc::new(ConsoleProgressReporter::new(verbose)))
    }

    /// Report a milestone for a whole-image run
    pub fn report_stage(&mut self, stage: CascadeStage) {
        self.current_stage = Some(stage);
        self.reporter
            .report_progress(ProgressUpdate::new(stage, self.start_time));
    }

    /// Report a milestone for one tile of a tiled run
    pub fn report_tile_stage(&mut self, stage: CascadeStage, index: usize, total: usize) {
        self.current_stage = Some(stage);
        self.reporter
            .report_progress(ProgressUpdate::for_tile(stage, index, total, self.start_time));
    }

    /// Report an error at the current stage
    pub fn report_error(&self, error: &str) {
        let stage = self.current_stage.unwrap_or(CascadeStage::Initializing);
        self.reporter.report_error(stage, error);
    }

    /// Report cancellation
    pub fn report_cancelled(&self) {
        self.reporter.report_cancelled();
    }

    /// Get the elapsed time since tracking started
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Get the current stage
    #[must_use]
    pub fn current_stage(&self) -> Option<CascadeStage> {
        self.current_stage
    }
}
