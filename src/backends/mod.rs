//! Backend implementations for inference engines
//!
//! Currently a single ONNX Runtime backend, with execution providers
//! selecting between hardware acceleration and CPU inference.

#[cfg(feature = "onnx")]
pub mod onnx;

// Test utilities for backend testing
#[cfg(test)]
pub mod test_utils;

// Re-export backends based on enabled features
#[cfg(feature = "onnx")]
pub use self::onnx::{is_accelerated_provider_available, OnnxBackend};
