//! ONNX Runtime backend for the cascade models
//!
//! One backend instance wraps one model session. Execution providers are
//! chosen from the pipeline configuration: `Auto` prefers CUDA and CoreML
//! when available and falls back to CPU, `Cpu` pins inference to the CPU
//! (the session layer uses this for its acceleration fallback retry).

use crate::config::{ExecutionProvider, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::inference::InferenceBackend;
use crate::models::ModelKind;
use instant::Duration;
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::{self, value::Value};
use std::path::PathBuf;

/// Check whether any hardware-accelerated execution provider is usable
///
/// Returns `true` when CUDA or CoreML would be picked up by an `Auto`
/// session, `false` when only CPU inference is possible.
#[must_use]
pub fn is_accelerated_provider_available() -> bool {
    let cuda =
        OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
    let coreml =
        OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default()).unwrap_or(false);
    log::debug!("Accelerated provider check: cuda={cuda}, coreml={coreml}");
    cuda || coreml
}

/// ONNX Runtime backend serving a single cascade model
pub struct OnnxBackend {
    kind: ModelKind,
    model_path: PathBuf,
    session: Option<Session>,
    initialized: bool,
}

impl OnnxBackend {
    /// Create a backend for the given model file, without loading it yet
    #[must_use]
    pub fn new(kind: ModelKind, model_path: PathBuf) -> Self {
        Self {
            kind,
            model_path,
            session: None,
            initialized: false,
        }
    }

    /// Load the model into an ONNX Runtime session
    fn load_model(&mut self, config: &PipelineConfig) -> Result<Duration> {
        let model_load_start = instant::Instant::now();

        let mut session_builder = Session::builder()
            .map_err(|e| {
                PipelineError::inference(format!("Failed to create session builder: {e}"))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                PipelineError::inference(format!("Failed to set optimization level: {e}"))
            })?;

        // Configure execution providers with availability checking
        session_builder = match config.execution_provider {
            ExecutionProvider::Auto => {
                let mut providers = Vec::new();

                let cuda_provider = CUDAExecutionProvider::default();
                if OrtExecutionProvider::is_available(&cuda_provider).unwrap_or(false) {
                    log::info!("🚀 CUDA execution provider is available and will be used");
                    providers.push(cuda_provider.build());
                } else {
                    log::debug!("CUDA execution provider is not available");
                }

                let coreml_provider = CoreMLExecutionProvider::default();
                if OrtExecutionProvider::is_available(&coreml_provider).unwrap_or(false) {
                    log::info!("🍎 CoreML execution provider is available and will be used");
                    // Subgraph support noticeably improves cascade model throughput
                    let coreml_provider = CoreMLExecutionProvider::default().with_subgraphs(true);
                    providers.push(coreml_provider.build());
                } else {
                    log::debug!("CoreML execution provider is not available");
                }

                if providers.is_empty() {
                    log::warn!("No hardware acceleration available, falling back to CPU");
                    session_builder
                } else {
                    session_builder
                        .with_execution_providers(providers)
                        .map_err(|e| {
                            PipelineError::inference(format!(
                                "Failed to set auto execution providers: {e}"
                            ))
                        })?
                }
            },
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
                session_builder
            },
            ExecutionProvider::Cuda => {
                let cuda_provider = CUDAExecutionProvider::default();
                if OrtExecutionProvider::is_available(&cuda_provider).unwrap_or(false) {
                    log::info!("Using CUDA execution provider");
                    session_builder
                        .with_execution_providers([cuda_provider.build()])
                        .map_err(|e| {
                            PipelineError::inference(format!(
                                "Failed to set CUDA execution provider: {e}"
                            ))
                        })?
                } else {
                    log::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                    session_builder
                }
            },
            ExecutionProvider::CoreMl => {
                let coreml_provider = CoreMLExecutionProvider::default();
                if OrtExecutionProvider::is_available(&coreml_provider).unwrap_or(false) {
                    log::info!("Using CoreML execution provider");
                    let enhanced = CoreMLExecutionProvider::default().with_subgraphs(true);
                    session_builder
                        .with_execution_providers([enhanced.build()])
                        .map_err(|e| {
                            PipelineError::inference(format!(
                                "Failed to set CoreML execution provider: {e}"
                            ))
                        })?
                } else {
                    log::warn!(
                        "CoreML execution provider requested but not available, falling back to CPU"
                    );
                    session_builder
                }
            },
        };

        // Calculate optimal threading if auto-detect (0)
        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(8)
        };

        let inter_threads = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(8)
                / 4)
            .max(1)
        };

        let session = session_builder
            .with_parallel_execution(true)
            .map_err(|e| {
                PipelineError::inference(format!("Failed to enable parallel execution: {e}"))
            })?
            .with_intra_threads(intra_threads)
            .map_err(|e| PipelineError::inference(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| PipelineError::inference(format!("Failed to set inter threads: {e}")))?
            .commit_from_file(&self.model_path)
            .map_err(|e| {
                PipelineError::session_load(
                    self.kind,
                    format!(
                        "Failed to create session from {path}: {e}",
                        path = self.model_path.display()
                    ),
                )
            })?;

        log::debug!(
            "✅ ONNX session ready: model={model}, provider={provider}, threads={intra_threads}/{inter_threads}",
            model = self.kind,
            provider = config.execution_provider,
        );

        self.session = Some(session);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "📊 {model} model loading complete: {ms:.0}ms",
            model = self.kind,
            ms = model_load_time.as_secs_f64() * 1000.0
        );

        Ok(model_load_time)
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &PipelineConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(PipelineError::internal("Backend not initialized"));
        }

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| PipelineError::internal("ONNX session not initialized"))?;

        let inference_start = instant::Instant::now();
        log::debug!(
            "🧠 Running {model} inference with input shape: {shape:?}",
            model = self.kind,
            shape = input.dim()
        );

        let input_value = Value::from_array(input.clone())
            .map_err(|e| PipelineError::inference(format!("Failed to convert input tensor: {e}")))?;

        // Positional inputs avoid per-model tensor name dependencies
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| PipelineError::inference(format!("ONNX inference failed: {e}")))?;

        let output_tensor = {
            let keys: Vec<_> = outputs.keys().collect();
            let first_key = keys.first().ok_or_else(|| {
                PipelineError::inference("No output tensors found".to_string())
            })?;
            outputs
                .get(first_key)
                .ok_or_else(|| {
                    PipelineError::inference("First output tensor not found".to_string())
                })?
                .try_extract_array::<f32>()
                .map_err(|e| {
                    PipelineError::inference(format!("Failed to extract output tensor: {e}"))
                })?
        };

        // Reshape to NCHW; depth models emit [N, H, W] without a channel axis
        let output_shape = output_tensor.shape().to_vec();
        let output_data: Vec<f32> = output_tensor.iter().copied().collect();
        let result = match output_shape.len() {
            4 => Array4::from_shape_vec(
                (
                    output_shape[0],
                    output_shape[1],
                    output_shape[2],
                    output_shape[3],
                ),
                output_data,
            ),
            3 => Array4::from_shape_vec(
                (output_shape[0], 1, output_shape[1], output_shape[2]),
                output_data,
            ),
            _ => {
                return Err(PipelineError::inference(format!(
                    "Unexpected output rank {rank} from {model} model",
                    rank = output_shape.len(),
                    model = self.kind
                )))
            },
        }
        .map_err(|e| PipelineError::inference(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "⚡ {model} inference: {ms:.2}ms",
            model = self.kind,
            ms = inference_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(result)
    }

    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
