//! Domain features extracted from a prompt and the keys derived from them

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tags describing the poker situation a prompt is about.
///
/// Every field is optional; extraction fills in whatever the prompt states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl FeatureSet {
    pub fn street(mut self, street: impl Into<String>) -> Self {
        self.street = Some(street.into());
        self
    }

    pub fn position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }

    pub fn hand(mut self, hand: impl Into<String>) -> Self {
        self.hand = Some(hand.into());
        self
    }

    pub fn board(mut self, board: impl Into<String>) -> Self {
        self.board = Some(board.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Whether two feature sets describe the same situation.
    ///
    /// Every field must agree: equal values when present on both sides, and
    /// absent on both sides otherwise. A field present on only one side is a
    /// mismatch.
    pub fn matches(&self, other: &FeatureSet) -> bool {
        self == other
    }

    /// Key of the similarity bucket this prompt belongs to.
    pub fn bucket_key(&self) -> BucketKey {
        BucketKey {
            street: self.street.as_deref().map(str::to_lowercase),
            position: self.position.as_deref().map(str::to_lowercase),
        }
    }

    /// Key into the prediction store.
    ///
    /// Only derived when street, position and action are all known; a partial
    /// key would lump unrelated situations together.
    pub fn prediction_key(&self) -> Option<PredictionKey> {
        Some(PredictionKey {
            street: self.street.as_deref()?.to_lowercase(),
            position: self.position.as_deref()?.to_lowercase(),
            action: self.action.as_deref()?.to_lowercase(),
        })
    }
}

/// `(street, position)` grouping used by the similarity index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub street: Option<String>,
    pub position: Option<String>,
}

/// Compact `street_position_action` key used by the prediction store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PredictionKey {
    pub street: String,
    pub position: String,
    pub action: String,
}

impl fmt::Display for PredictionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.street, self.position, self.action)
    }
}
