//! Inference client trait.
//!
//! The broker treats the model endpoint as a black box: it hands over a
//! fully resolved [`InferenceRequest`] and gets back completion text or a
//! typed error. Implementations must bound their own call time and map
//! failures so that [`KibitzError::is_retryable()`](crate::KibitzError::is_retryable)
//! tells transient problems from fatal ones:
//!
//! - credentials rejected → `AuthenticationFailed`
//! - malformed request → `InvalidRequest`
//! - call exceeded its time → `Timeout`
//! - connection failure, 5xx, 429, empty body → transient variants
//!
//! # Example
//!
//! ```ignore
//! struct Canned;
//!
//! #[async_trait]
//! impl InferenceClient for Canned {
//!     fn name(&self) -> &str { "canned" }
//!     async fn complete(&self, _request: &InferenceRequest) -> Result<String> {
//!         Ok("Action: fold\nReason: dominated".into())
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde::Serialize;

use crate::Result;
use crate::types::Message;

/// A fully resolved call to the inference endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
}

/// Performs the network call for one completion.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Client name for logging/debugging.
    fn name(&self) -> &str;

    /// Run one completion and return its text.
    async fn complete(&self, request: &InferenceRequest) -> Result<String>;
}
