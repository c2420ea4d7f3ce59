//! Per-submission options

use serde::{Deserialize, Serialize};

use crate::{KibitzError, Result};

/// Priority given to submissions that do not set one.
pub const DEFAULT_PRIORITY: u32 = 1;

/// Options for a single broker submission.
///
/// Sampling parameters left as `None` fall back to the broker's configured
/// defaults. Higher `priority` values are dispatched first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// Skip every cache tier on lookup. Successful responses are still cached.
    #[serde(default)]
    pub bypass_cache: bool,
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_priority() -> u32 {
    DEFAULT_PRIORITY
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: None,
            max_tokens: None,
            presence_penalty: None,
            frequency_penalty: None,
            bypass_cache: false,
            priority: DEFAULT_PRIORITY,
        }
    }
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn presence_penalty(mut self, penalty: f32) -> Self {
        self.presence_penalty = Some(penalty);
        self
    }

    pub fn frequency_penalty(mut self, penalty: f32) -> Self {
        self.frequency_penalty = Some(penalty);
        self
    }

    pub fn bypass_cache(mut self, bypass: bool) -> Self {
        self.bypass_cache = bypass;
        self
    }

    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Reject option values the inference endpoint would refuse anyway.
    pub fn validate(&self) -> Result<()> {
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(KibitzError::InvalidInput(format!(
                    "temperature {t} outside [0, 2]"
                )));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(KibitzError::InvalidInput(
                "max_tokens must be positive".into(),
            ));
        }
        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                return Err(KibitzError::InvalidInput("model name is empty".into()));
            }
        }
        Ok(())
    }
}
