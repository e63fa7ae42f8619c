//! Configuration types for background removal operations

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl Default for ExecutionProvider {
    fn default() -> Self {
        // Default to auto-detection for best performance
        Self::Auto
    }
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Mask shaping settings, immutable for the duration of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MattingSettings {
    /// Hard alpha cutoff in `[0, 1]`; values strictly below it become 0.0
    pub threshold: f32,

    /// Alpha multiplier `>= 1.0` applied to non-zero values, clamped to 1.0
    pub opacity_boost: f32,

    /// Signed morphological radius in pixels: positive dilates the mask,
    /// negative erodes it, zero is a no-op
    pub expand: i32,
}

impl Default for MattingSettings {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            opacity_boost: 1.0,
            expand: 0,
        }
    }
}

impl MattingSettings {
    /// Validate setting ranges
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvalidConfig` when `threshold` is outside
    /// `[0, 1]` or `opacity_boost` is below 1.0.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(PipelineError::invalid_config(format!(
                "threshold must be in [0, 1], got {}",
                self.threshold
            )));
        }
        if self.opacity_boost < 1.0 {
            return Err(PipelineError::invalid_config(format!(
                "opacity_boost must be >= 1.0, got {}",
                self.opacity_boost
            )));
        }
        Ok(())
    }
}

/// Configuration for the background removal pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Mask shaping settings applied after the refiner stage
    pub settings: MattingSettings,

    /// Execution provider for ONNX Runtime; acceleration is attempted first
    /// and the pipeline falls back to CPU internally on failure
    pub execution_provider: ExecutionProvider,

    /// Directory holding the three ONNX models; `None` uses the shared
    /// download cache under the user cache directory
    pub model_dir: Option<PathBuf>,

    /// Pause inserted before and after each tile in tile mode, to hand
    /// control back to the caller's rendering/cancellation loop
    #[serde(skip, default = "default_tile_yield")]
    pub tile_yield: Duration,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,

    /// Enable debug mode (additional logging and validation)
    pub debug: bool,
}

fn default_tile_yield() -> Duration {
    Duration::from_millis(20)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            settings: MattingSettings::default(),
            execution_provider: ExecutionProvider::default(),
            model_dir: None,
            tile_yield: default_tile_yield(),
            intra_threads: 0,
            inter_threads: 0,
            debug: false,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvalidConfig` when the matting settings are
    /// out of range.
    pub fn validate(&self) -> Result<()> {
        self.settings.validate()
    }

    /// Load and validate a configuration from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read, is not valid JSON, or
    /// fails [`validate`](Self::validate).
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| PipelineError::invalid_config(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to pretty-printed JSON
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvalidConfig` when serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::invalid_config(format!("config serialization: {e}")))
    }
}

/// Builder for [`PipelineConfig`]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    #[must_use]
    pub fn settings(mut self, settings: MattingSettings) -> Self {
        self.config.settings = settings;
        self
    }

    #[must_use]
    pub fn threshold(mut self, threshold: f32) -> Self {
        self.config.settings.threshold = threshold;
        self
    }

    #[must_use]
    pub fn opacity_boost(mut self, boost: f32) -> Self {
        self.config.settings.opacity_boost = boost;
        self
    }

    #[must_use]
    pub fn expand(mut self, expand: i32) -> Self {
        self.config.settings.expand = expand;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn model_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.model_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn tile_yield(mut self, pause: Duration) -> Self {
        self.config.tile_yield = pause;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build the pipeline configuration
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvalidConfig` when the mask settings fail
    /// validation.
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.settings.validate()?;
        Ok(self.config)
    }
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
