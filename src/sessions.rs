//! Per-model session management
//!
//! Each cascade model gets one session slot with a small lifecycle: it
//! starts unloaded, is initialized at most once on first use, and a load
//! failure is sticky. Initialization first tries the configured (possibly
//! accelerated) execution provider and retries once on CPU before giving
//! up, so a broken GPU stack degrades to slow inference instead of a
//! failed run.

use crate::config::{ExecutionProvider, PipelineConfig};
use crate::download::ModelDownloader;
use crate::error::{PipelineError, Result};
use crate::inference::{BackendFactory, InferenceBackend};
use crate::models::ModelKind;
use ndarray::Array4;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Lifecycle of a single model session
enum SessionState {
    /// No load attempt yet
    Unloaded,
    /// Session initialized and usable
    Ready(Box<dyn InferenceBackend>),
    /// Both load attempts failed; the reason is replayed on every later use
    Failed(String),
}

/// Manages the three cascade model sessions
///
/// Locking is per model, so initializing one session never blocks inference
/// on another that is already ready.
pub struct SessionManager {
    factory: Arc<dyn BackendFactory>,
    downloader: ModelDownloader,
    config: PipelineConfig,
    cells: [(ModelKind, Mutex<SessionState>); 3],
}

impl SessionManager {
    /// Create a session manager with the given backend factory
    ///
    /// # Errors
    /// - Cache directory setup failures
    pub fn with_factory(config: PipelineConfig, factory: Arc<dyn BackendFactory>) -> Result<Self> {
        let downloader = ModelDownloader::new(config.model_dir.clone())?;
        Ok(Self {
            factory,
            downloader,
            config,
            cells: [
                (ModelKind::Depth, Mutex::new(SessionState::Unloaded)),
                (ModelKind::Matting, Mutex::new(SessionState::Unloaded)),
                (ModelKind::Refiner, Mutex::new(SessionState::Unloaded)),
            ],
        })
    }

    /// Create a session manager using the default ONNX Runtime factory
    ///
    /// # Errors
    /// - Cache directory setup failures
    #[cfg(feature = "onnx")]
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_factory(config, Arc::new(crate::inference::DefaultBackendFactory))
    }

    fn cell(&self, kind: ModelKind) -> &Mutex<SessionState> {
        // The array is keyed in ModelKind::ALL order
        &self.cells[kind as usize].1
    }

    /// Run inference on the given model, initializing its session on first use
    ///
    /// # Errors
    /// - `SessionLoad` when the session cannot be initialized (sticky)
    /// - `Inference` when the model run itself fails
    pub async fn infer(&self, kind: ModelKind, input: &Array4<f32>) -> Result<Array4<f32>> {
        let mut state = self.cell(kind).lock().await;

        if matches!(*state, SessionState::Unloaded) {
            *state = match self.load_session(kind).await {
                Ok(backend) => SessionState::Ready(backend),
                Err(e) => {
                    let reason = e.to_string();
                    log::error!("{kind} session load failed permanently: {reason}");
                    SessionState::Failed(reason)
                },
            };
        }

        match *state {
            SessionState::Ready(ref mut backend) => backend.infer(input),
            SessionState::Failed(ref reason) => {
                Err(PipelineError::session_load(kind, reason.clone()))
            },
            SessionState::Unloaded => Err(PipelineError::internal("session state not advanced")),
        }
    }

    /// Whether the given model's session is currently ready
    pub async fn is_ready(&self, kind: ModelKind) -> bool {
        matches!(*self.cell(kind).lock().await, SessionState::Ready(_))
    }

    /// Download any missing model files without initializing sessions
    ///
    /// # Errors
    /// - Network or file system errors during download
    pub async fn prefetch_models(&self) -> Result<()> {
        self.downloader.ensure_all().await
    }

    /// Initialize a backend, retrying once on CPU when acceleration fails
    async fn load_session(&self, kind: ModelKind) -> Result<Box<dyn InferenceBackend>> {
        let model_path = self.downloader.ensure_model(kind).await?;

        let mut backend = self.factory.create_backend(kind, model_path.clone())?;
        match backend.initialize(&self.config) {
            Ok(_) => return Ok(backend),
            Err(e) => {
                if self.config.execution_provider == ExecutionProvider::Cpu {
                    return Err(e);
                }
                log::warn!(
                    "{kind} session failed on {provider} provider, retrying on CPU: {e}",
                    provider = self.config.execution_provider
                );
            },
        }

        let mut fallback_config = self.config.clone();
        fallback_config.execution_provider = ExecutionProvider::Cpu;

        let mut backend = self.factory.create_backend(kind, model_path)?;
        backend.initialize(&fallback_config)?;
        Ok(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockBackendFactory;
    use std::fs;
    use tempfile::TempDir;

    fn seeded_manager(factory: MockBackendFactory) -> (SessionManager, TempDir) {
        let dir = TempDir::new().unwrap();
        // Pre-seed the cache so no download is attempted
        for kind in ModelKind::ALL {
            fs::write(dir.path().join(kind.file_name()), b"mock model").unwrap();
        }
        let config = PipelineConfig::builder()
            .model_dir(dir.path().to_path_buf())
            .build()
            .unwrap();
        let manager = SessionManager::with_factory(config, Arc::new(factory)).unwrap();
        (manager, dir)
    }

    #[tokio::test]
    async fn test_session_initialized_on_first_use() {
        let (manager, _dir) = seeded_manager(MockBackendFactory::new());

        assert!(!manager.is_ready(ModelKind::Depth).await);

        let input = Array4::<f32>::zeros((1, 3, 16, 16));
        let output = manager.infer(ModelKind::Depth, &input).await.unwrap();
        assert_eq!(output.shape(), &[1, 1, 16, 16]);

        assert!(manager.is_ready(ModelKind::Depth).await);
        // Other sessions remain untouched
        assert!(!manager.is_ready(ModelKind::Matting).await);
    }

    #[tokio::test]
    async fn test_failed_session_is_sticky() {
        let (manager, _dir) = seeded_manager(MockBackendFactory::failing_init(ModelKind::Matting));

        let input = Array4::<f32>::zeros((1, 4, 16, 16));
        let first = manager.infer(ModelKind::Matting, &input).await;
        assert!(matches!(
            first,
            Err(PipelineError::SessionLoad {
                kind: ModelKind::Matting,
                ..
            })
        ));

        // A later call replays the failure without another load attempt
        let second = manager.infer(ModelKind::Matting, &input).await;
        assert!(matches!(second, Err(PipelineError::SessionLoad { .. })));

        // Sibling sessions are unaffected
        let depth_input = Array4::<f32>::zeros((1, 3, 16, 16));
        assert!(manager.infer(ModelKind::Depth, &depth_input).await.is_ok());
    }

    #[tokio::test]
    async fn test_inference_failure_is_not_sticky() {
        let (manager, _dir) =
            seeded_manager(MockBackendFactory::failing_inference(ModelKind::Depth));

        let input = Array4::<f32>::zeros((1, 3, 16, 16));
        let result = manager.infer(ModelKind::Depth, &input).await;
        assert!(matches!(result, Err(PipelineError::Inference(_))));

        // The session itself loaded fine and stays ready
        assert!(manager.is_ready(ModelKind::Depth).await);
    }
}
