//! Broker response types

use serde::{Deserialize, Serialize};

/// Where a completion was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Prediction,
    Similarity,
    Exact,
    Network,
}

impl ResponseSource {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prediction => "prediction",
            Self::Similarity => "similarity",
            Self::Exact => "exact",
            Self::Network => "network",
        }
    }

    /// Whether the inference endpoint was skipped.
    pub fn is_cached(&self) -> bool {
        !matches!(self, Self::Network)
    }
}

/// A resolved submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    pub source: ResponseSource,
}

impl Completion {
    pub fn new(content: impl Into<String>, source: ResponseSource) -> Self {
        Self {
            content: content.into(),
            source,
        }
    }
}
