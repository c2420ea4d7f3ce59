//! Inference endpoint access.
//!
//! This module contains the [`InferenceClient`] seam, the shared retry
//! policy, and the bundled OpenAI-compatible client.

#[cfg(feature = "openai")]
pub mod openai;
pub mod retry;
pub mod traits;

#[cfg(feature = "openai")]
pub use openai::OpenAiClient;
pub use retry::{RetryConfig, with_retry};
pub use traits::{InferenceClient, InferenceRequest};
