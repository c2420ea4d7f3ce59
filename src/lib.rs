//! Kibitz - request broker for LLM-backed poker advice
//!
//! Sits between a strategy layer and an OpenAI-compatible chat endpoint.
//! Callers submit prompts with a priority; the broker answers from a
//! three-tier response cache when it can and otherwise dispatches the
//! prompt in small concurrent batches under a fixed-window rate limit,
//! with bounded retries and response validation.
//!
//! # Example
//!
//! ```rust,no_run
//! use kibitz::{Kibitz, SubmitOptions};
//!
//! #[tokio::main]
//! async fn main() -> kibitz::Result<()> {
//!     let broker = Kibitz::builder().openai("sk-your-key")?.build()?;
//!
//!     let advice = broker
//!         .ask(
//!             "Street: flop\nPosition: BTN\nHand: AhKd\nBoard: Ks7c2d",
//!             SubmitOptions::new().priority(5),
//!         )
//!         .await?;
//!
//!     println!("[{}] {}", advice.source.as_str(), advice.content);
//!     Ok(())
//! }
//! ```
//!
//! # Custom collaborators
//!
//! Everything that talks to the outside world or encodes poker knowledge is
//! a trait ([`InferenceClient`], [`FeatureExtractor`], [`ResponseValidator`],
//! [`RateLimiter`]) and can be replaced on the builder.

pub mod broker;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod error;
pub mod limiter;
pub mod poker;
pub mod providers;
pub mod telemetry;
pub mod traits;
pub mod types;

// Re-export main types at crate root
pub use broker::{Broker, BrokerBuilder, BrokerConfig, Kibitz, PendingResponse};
pub use cache::{CacheConfig, CacheEntry, ResponseCache};
pub use error::{ErrorKind, KibitzError, Result};
pub use limiter::{RateLimitConfig, WindowRateLimiter};
pub use poker::{PokerAdviceValidator, PokerFeatureExtractor};
#[cfg(feature = "openai")]
pub use providers::OpenAiClient;
pub use providers::{InferenceClient, InferenceRequest, RetryConfig};
pub use traits::{FeatureExtractor, RateLimiter, ResponseValidator};

// Re-export all types
pub use types::{
    BucketKey, CacheStats, Completion, DEFAULT_PRIORITY, FeatureSet, Message, PredictionKey,
    RateLimitStats, ResponseSource, Role, SubmitOptions,
};

/// Crate version, as reported by the CLI.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
