//! Inference backend abstraction
//!
//! Each backend wraps a single model session. The factory seam lets the
//! session layer construct backends lazily and lets tests inject mocks
//! without touching a real runtime.

use crate::{config::PipelineConfig, error::Result, models::ModelKind};
use ndarray::Array4;
use std::path::PathBuf;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Trait for per-model inference backends
pub trait InferenceBackend: Send {
    /// Initialize the backend with the given configuration
    ///
    /// Returns the model load time when a session was actually created, or
    /// `None` when the backend was already initialized.
    ///
    /// # Errors
    /// - Backend initialization failures
    /// - Model loading or validation errors
    fn initialize(&mut self, config: &PipelineConfig) -> Result<Option<Duration>>;

    /// Run inference on the input tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Tensor conversion or shape errors
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Which model this backend serves
    fn kind(&self) -> ModelKind;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;
}

/// Factory for creating inference backends
///
/// The session layer holds one of these and asks for a backend the first
/// time a model is needed. Tests pass a factory producing mocks.
pub trait BackendFactory: Send + Sync {
    /// Create an uninitialized backend for the given model file
    ///
    /// # Errors
    /// - Backend construction failures (e.g. runtime unavailable)
    fn create_backend(
        &self,
        kind: ModelKind,
        model_path: PathBuf,
    ) -> Result<Box<dyn InferenceBackend>>;
}

/// Factory producing ONNX Runtime backends
#[cfg(feature = "onnx")]
pub struct DefaultBackendFactory;

#[cfg(feature = "onnx")]
impl BackendFactory for DefaultBackendFactory {
    fn create_backend(
        &self,
        kind: ModelKind,
        model_path: PathBuf,
    ) -> Result<Box<dyn InferenceBackend>> {
        Ok(Box::new(crate::backends::OnnxBackend::new(
            kind, model_path,
        )))
    }
}
