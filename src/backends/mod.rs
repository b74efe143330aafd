//! Inference backends
//!
//! - Tract backend (pure Rust ONNX inference)
//! - Mock backend (deterministic masks for tests and benchmarks)

pub mod mock;

#[cfg(feature = "tract")]
pub mod tract;

pub use self::mock::{MockBackend, MockMask};

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;
