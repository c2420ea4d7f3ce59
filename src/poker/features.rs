//! Pattern-based feature extraction for poker prompts.
//!
//! Prompts produced by the strategy layer carry labelled lines such as
//! `Street: flop`, `Position: BTN`, `Hand: AhKd`, `Board: Qs Jh 2c` and
//! `Suggested Action: raise`. The extractor picks those up; anything it
//! cannot find is left as `None`.

use std::sync::LazyLock;

use regex::Regex;

use crate::traits::FeatureExtractor;
use crate::types::FeatureSet;

static STREET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Street:\s*(\w+)").expect("street pattern"));
static POSITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Position:\s*(\w+)").expect("position pattern"));
// Card ranks are upper case and suits lower case; keep this one case sensitive.
static HAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Hand:\s*([2-9TJQKA][hdcs][2-9TJQKA][hdcs])").expect("hand pattern")
});
static BOARD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Board:[ \t]*((?:[2-9TJQKA][hdcs][ \t]*)+)").expect("board pattern")
});
static ACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Suggested Action:\s*(\w+)").expect("action pattern"));

/// Default [`FeatureExtractor`] for prompts built by the poker strategy layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PokerFeatureExtractor;

impl PokerFeatureExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl FeatureExtractor for PokerFeatureExtractor {
    fn extract(&self, prompt: &str) -> FeatureSet {
        FeatureSet {
            street: capture(&STREET, prompt),
            position: capture(&POSITION, prompt),
            hand: capture(&HAND, prompt),
            board: capture(&BOARD, prompt)
                .map(|b| b.split_whitespace().collect::<Vec<_>>().join(" ")),
            action: capture(&ACTION, prompt),
        }
    }
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}
