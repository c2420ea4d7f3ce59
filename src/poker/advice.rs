//! Sanity check for completions that are supposed to be poker advice.

use std::sync::LazyLock;

use regex::Regex;

use crate::traits::ResponseValidator;
use crate::{KibitzError, Result};

static ACTION_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:fold|call|rais|check|bet)(?:e|es|ed|s|ing|ting)?\b")
        .expect("action verb pattern")
});
static REASONING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\breason(?:ing)?\s*:").expect("reasoning pattern"));
static CARDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:[2-9TJQKA][hdcs])+\b").expect("card pattern"));

/// Default [`ResponseValidator`].
///
/// Content is accepted when it names an action (fold, call, raise, check or
/// bet, inflected forms such as "raising" or "checked" included) and either
/// carries a `Reason:` marker or references a card such as `Ah` or `Td9d`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PokerAdviceValidator;

impl PokerAdviceValidator {
    pub fn new() -> Self {
        Self
    }
}

impl ResponseValidator for PokerAdviceValidator {
    fn validate(&self, content: &str) -> Result<()> {
        if !ACTION_VERB.is_match(content) {
            return Err(KibitzError::InvalidResponse(
                "no recognizable action".into(),
            ));
        }
        if !REASONING.is_match(content) && !CARDS.is_match(content) {
            return Err(KibitzError::InvalidResponse(
                "no reasoning or card reference".into(),
            ));
        }
        Ok(())
    }
}
