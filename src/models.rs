//! Catalogue of the three cascade networks
//!
//! The pipeline is a fixed three-stage cascade: a depth estimator conditions
//! a matting network, whose coarse alpha conditions an edge refiner. Each
//! network has a fixed download URL and a stage-specific input contract.

use serde::{Deserialize, Serialize};

/// Base URL for the published cascade models
const MODEL_BASE_URL: &str = "https://huggingface.co/withoutbg/snap/resolve/main";

/// The three networks of the cascade, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    /// Monocular depth estimator (stage 1)
    Depth,
    /// Trimap-free matting network conditioned on depth (stage 2)
    Matting,
    /// Edge refiner conditioned on depth and coarse alpha (stage 3)
    Refiner,
}

impl ModelKind {
    /// All kinds in cascade order
    pub const ALL: [ModelKind; 3] = [ModelKind::Depth, ModelKind::Matting, ModelKind::Refiner];

    /// File name of the ONNX artifact in the model repository
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            ModelKind::Depth => "depth_anything_v2_vits_slim.onnx",
            ModelKind::Matting => "snap_matting_0.1.0.onnx",
            ModelKind::Refiner => "snap_refiner_0.1.0.onnx",
        }
    }

    /// Download URL of the ONNX artifact
    #[must_use]
    pub fn url(self) -> String {
        format!("{MODEL_BASE_URL}/{}", self.file_name())
    }

    /// Square letterbox input size, or `None` for native-resolution input
    ///
    /// The depth and matting networks consume a fixed square canvas; the
    /// refiner consumes the image at its native, unpadded resolution.
    #[must_use]
    pub fn input_size(self) -> Option<u32> {
        match self {
            ModelKind::Depth => Some(518),
            ModelKind::Matting => Some(256),
            ModelKind::Refiner => None,
        }
    }

    /// Number of input channels the network expects
    ///
    /// Depth takes RGB; matting takes RGB + depth; the refiner takes
    /// RGB + depth + coarse alpha.
    #[must_use]
    pub fn input_channels(self) -> usize {
        match self {
            ModelKind::Depth => 3,
            ModelKind::Matting => 4,
            ModelKind::Refiner => 5,
        }
    }

    /// Short name for logging and error messages
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Depth => "depth",
            ModelKind::Matting => "matting",
            ModelKind::Refiner => "refiner",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
