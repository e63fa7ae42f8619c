//! Test utilities and mock backends for testing inference functionality
//!
//! Mock implementations of the `InferenceBackend` trait enable testing of
//! the session and cascade layers without model files or ONNX Runtime.

use crate::{
    config::PipelineConfig,
    error::{PipelineError, Result},
    inference::{BackendFactory, InferenceBackend},
    models::ModelKind,
};
use instant::Duration;
use ndarray::Array4;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Mock backend producing synthetic single-channel outputs
#[derive(Debug, Clone)]
pub struct MockBackend {
    kind: ModelKind,
    initialized: bool,
    /// Call history for verification in tests
    call_history: Arc<Mutex<Vec<String>>>,
    /// Whether to simulate initialization failure
    should_fail_init: bool,
    /// Whether to simulate inference failure
    should_fail_inference: bool,
}

impl MockBackend {
    #[must_use]
    pub fn new(kind: ModelKind) -> Self {
        Self {
            kind,
            initialized: false,
            call_history: Arc::new(Mutex::new(Vec::new())),
            should_fail_init: false,
            should_fail_inference: false,
        }
    }

    /// Create a mock backend that will fail during initialization
    #[must_use]
    pub fn new_failing_init(kind: ModelKind) -> Self {
        let mut backend = Self::new(kind);
        backend.should_fail_init = true;
        backend
    }

    /// Create a mock backend that will fail during inference
    #[must_use]
    pub fn new_failing_inference(kind: ModelKind) -> Self {
        let mut backend = Self::new(kind);
        backend.should_fail_inference = true;
        backend
    }

    /// Get the call history for verification in tests
    pub fn get_call_history(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }

    /// Generate a synthetic output tensor matching the input's spatial size
    ///
    /// Depth outputs are a vertical gradient so min-max normalization has a
    /// real dynamic range to stretch. Matting and refiner outputs are a soft
    /// centered disc, a plausible foreground mask.
    fn generate_mock_output(&self, input: &Array4<f32>) -> Array4<f32> {
        let shape = input.shape();
        let (batch, height, width) = (shape[0], shape[2], shape[3]);
        let mut output = Array4::<f32>::zeros((batch, 1, height, width));

        match self.kind {
            ModelKind::Depth => {
                for b in 0..batch {
                    for y in 0..height {
                        let value = y as f32 / (height.max(2) - 1) as f32;
                        for x in 0..width {
                            output[[b, 0, y, x]] = value;
                        }
                    }
                }
            },
            ModelKind::Matting | ModelKind::Refiner => {
                let center_x = width as f32 / 2.0;
                let center_y = height as f32 / 2.0;
                let radius = (width.min(height) as f32 / 3.0).max(1.0);
                for b in 0..batch {
                    for y in 0..height {
                        for x in 0..width {
                            let dx = x as f32 - center_x;
                            let dy = y as f32 - center_y;
                            let distance = (dx * dx + dy * dy).sqrt();
                            let value = if distance < radius {
                                ((radius - distance) / radius).clamp(0.0, 1.0)
                            } else {
                                0.0
                            };
                            output[[b, 0, y, x]] = value;
                        }
                    }
                }
            },
        }

        output
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &PipelineConfig) -> Result<Option<Duration>> {
        self.record_call("initialize");
        if self.should_fail_init {
            return Err(PipelineError::session_load(
                self.kind,
                "mock initialization failure",
            ));
        }
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.record_call("infer");
        if !self.initialized {
            return Err(PipelineError::internal("Backend not initialized"));
        }
        if self.should_fail_inference {
            return Err(PipelineError::inference("mock inference failure"));
        }

        let expected_channels = self.kind.input_channels();
        if input.shape()[1] != expected_channels {
            return Err(PipelineError::inference(format!(
                "expected {expected_channels} input channels, got {got}",
                got = input.shape()[1]
            )));
        }

        Ok(self.generate_mock_output(input))
    }

    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Factory producing [`MockBackend`] instances
pub struct MockBackendFactory {
    fail_init_for: Option<ModelKind>,
    fail_inference_for: Option<ModelKind>,
}

impl MockBackendFactory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            fail_init_for: None,
            fail_inference_for: None,
        }
    }

    /// Factory whose backends for `kind` fail to initialize
    #[must_use]
    pub fn failing_init(kind: ModelKind) -> Self {
        Self {
            fail_init_for: Some(kind),
            fail_inference_for: None,
        }
    }

    /// Factory whose backends for `kind` fail at inference time
    #[must_use]
    pub fn failing_inference(kind: ModelKind) -> Self {
        Self {
            fail_init_for: None,
            fail_inference_for: Some(kind),
        }
    }
}

impl Default for MockBackendFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendFactory for MockBackendFactory {
    fn create_backend(
        &self,
        kind: ModelKind,
        _model_path: PathBuf,
    ) -> Result<Box<dyn InferenceBackend>> {
        if self.fail_init_for == Some(kind) {
            return Ok(Box::new(MockBackend::new_failing_init(kind)));
        }
        if self.fail_inference_for == Some(kind) {
            return Ok(Box::new(MockBackend::new_failing_inference(kind)));
        }
        Ok(Box::new(MockBackend::new(kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_output_matches_input_spatial_size() {
        let config = PipelineConfig::default();
        let mut backend = MockBackend::new(ModelKind::Depth);
        backend.initialize(&config).unwrap();

        let input = Array4::<f32>::zeros((1, 3, 32, 48));
        let output = backend.infer(&input).unwrap();
        assert_eq!(output.shape(), &[1, 1, 32, 48]);

        // Vertical gradient covers the full range
        assert_eq!(output[[0, 0, 0, 0]], 0.0);
        assert!(output[[0, 0, 31, 0]] > 0.9);
    }

    #[test]
    fn test_mock_rejects_wrong_channel_count() {
        let config = PipelineConfig::default();
        let mut backend = MockBackend::new(ModelKind::Refiner);
        backend.initialize(&config).unwrap();

        // Refiner expects 5 channels
        let input = Array4::<f32>::zeros((1, 3, 16, 16));
        assert!(backend.infer(&input).is_err());

        let input = Array4::<f32>::zeros((1, 5, 16, 16));
        assert!(backend.infer(&input).is_ok());
    }

    #[test]
    fn test_failing_init_backend() {
        let config = PipelineConfig::default();
        let mut backend = MockBackend::new_failing_init(ModelKind::Matting);
        let result = backend.initialize(&config);
        assert!(result.is_err());
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_call_history_records_methods() {
        let config = PipelineConfig::default();
        let mut backend = MockBackend::new(ModelKind::Matting);
        backend.initialize(&config).unwrap();
        let input = Array4::<f32>::zeros((1, 4, 8, 8));
        let _ = backend.infer(&input);

        assert_eq!(backend.get_call_history(), vec!["initialize", "infer"]);
    }
}
