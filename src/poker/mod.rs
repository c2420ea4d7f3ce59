//! Default strategy-layer collaborators.
//!
//! The broker itself knows nothing about poker. These implementations of
//! [`FeatureExtractor`](crate::traits::FeatureExtractor) and
//! [`ResponseValidator`](crate::traits::ResponseValidator) understand the
//! prompt and answer formats used by the advisory layer and are installed
//! by [`BrokerBuilder`](crate::BrokerBuilder) unless replaced.

mod advice;
mod features;

pub use advice::PokerAdviceValidator;
pub use features::PokerFeatureExtractor;

/// System message sent ahead of every prompt unless overridden.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a poker strategy assistant. Analyze the \
current situation and provide a clear action (fold/call/raise) with a brief explanation. \
Always reference the specific cards and board in your response.";
