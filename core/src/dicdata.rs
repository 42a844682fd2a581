//! Dictionary entries and the admission threshold shared by every search.
//!
//! Public API:
//! - `DicdataElement` - one dictionary word with class ids and score
//! - `DicdataMetadata` - where an entry came from
//! - `DicdataRecord` - on-disk payload form of an entry
//! - `penalty_of`, `should_be_removed`, `should_be_removed_value` - pruning rule
use serde::{Deserialize, Serialize};

use crate::word_class::{cid, mid};

/// Maximum reading length looked up from one start position.
pub const MAX_LENGTH: usize = 20;

/// Values below this (after the length allowance) are pruned.
pub const THRESHOLD: f32 = -17.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DicdataMetadata {
    #[default]
    System,
    UserDictionary,
    Learned,
    /// Entries imported at runtime through the dynamic user dictionary.
    Dynamic,
}

/// A dictionary word.
///
/// `ruby` is the katakana reading. `lcid`/`rcid` are the left/right
/// connection class ids and `mid` the meaning id. Scores are log-probability
/// like: closer to zero is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DicdataElement {
    pub word: String,
    pub ruby: String,
    pub lcid: usize,
    pub rcid: usize,
    pub mid: usize,
    base_value: f32,
    adjust: f32,
    pub metadata: DicdataMetadata,
}

impl DicdataElement {
    pub fn new(
        word: impl Into<String>,
        ruby: impl Into<String>,
        lcid: usize,
        rcid: usize,
        mid: usize,
        value: f32,
    ) -> Self {
        Self {
            word: word.into(),
            ruby: ruby.into(),
            lcid,
            rcid,
            mid,
            base_value: value,
            adjust: 0.0,
            metadata: DicdataMetadata::System,
        }
    }

    /// Entry whose word equals its reading and whose class ids coincide.
    pub fn with_cid(ruby: impl Into<String>, cid: usize, mid: usize, value: f32) -> Self {
        let ruby = ruby.into();
        Self::new(ruby.clone(), ruby, cid, cid, mid, value)
    }

    /// Same as [`with_cid`](Self::with_cid) with a distinct surface word.
    pub fn word_with_cid(
        word: impl Into<String>,
        ruby: impl Into<String>,
        cid: usize,
        mid: usize,
        value: f32,
    ) -> Self {
        Self::new(word, ruby, cid, cid, mid, value)
    }

    pub fn bos() -> Self {
        Self::new("", "", cid::BOS, cid::BOS, mid::EOS, 0.0)
    }

    pub fn eos() -> Self {
        Self::new("", "", cid::EOS, cid::EOS, mid::EOS, 0.0)
    }

    pub fn with_metadata(mut self, metadata: DicdataMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Effective score, never above zero.
    pub fn value(&self) -> f32 {
        (self.base_value + self.adjust).min(0.0)
    }

    pub fn base_value(&self) -> f32 {
        self.base_value
    }

    /// A copy with `delta` added to the adjustment.
    pub fn adjusted(&self, delta: f32) -> Self {
        let mut e = self.clone();
        e.adjust += delta;
        e
    }

    pub fn is_from_user_dictionary(&self) -> bool {
        matches!(
            self.metadata,
            DicdataMetadata::UserDictionary | DicdataMetadata::Dynamic
        )
    }

    pub fn ruby_count(&self) -> usize {
        self.ruby.chars().count()
    }
}

/// Serialized payload entry stored in `*.bin` files next to each trie.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DicdataRecord {
    pub ruby: String,
    pub word: String,
    pub lcid: u16,
    pub rcid: u16,
    pub mid: u16,
    pub value: f32,
}

impl DicdataRecord {
    pub fn to_element(&self) -> DicdataElement {
        DicdataElement::new(
            self.word.clone(),
            self.ruby.clone(),
            self.lcid as usize,
            self.rcid as usize,
            self.mid as usize,
            self.value,
        )
    }
}

impl From<&DicdataElement> for DicdataRecord {
    fn from(e: &DicdataElement) -> Self {
        Self {
            ruby: e.ruby.clone(),
            word: e.word.clone(),
            lcid: e.lcid as u16,
            rcid: e.rcid as u16,
            mid: e.mid as u16,
            value: e.value(),
        }
    }
}

/// Length allowance of a word: `-2 / chars(word)`.
pub fn penalty_of(word: &str) -> f32 {
    -2.0 / word.chars().count().max(1) as f32
}

/// Pruning rule for a raw value against a reading of `word_count` characters.
pub fn should_be_removed_value(value: f32, word_count: usize) -> bool {
    let d = value - THRESHOLD;
    if d < 0.0 {
        return true;
    }
    -2.0 / (word_count.max(1) as f32) < -d
}

/// Pruning rule for an entry, using the length allowance of its word.
pub fn should_be_removed(data: &DicdataElement) -> bool {
    let d = data.value() - THRESHOLD;
    if d < 0.0 {
        return true;
    }
    penalty_of(&data.word) < -d
}

/// Typo-penalized copy of `data` if it survives pruning.
pub fn penalized(data: &DicdataElement, ruby_count: usize, penalty: f32) -> Option<DicdataElement> {
    if penalty == 0.0 {
        return Some(data.clone());
    }
    let adjust = penalty_of(&data.word) / 2.0 * penalty * crate::word_class::penalty_ratio(data.lcid);
    if should_be_removed_value(data.value() + adjust, ruby_count) {
        None
    } else {
        Some(data.adjusted(adjust))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_is_clamped_to_zero() {
        let e = DicdataElement::with_cid("ア", 1288, 501, -1.0);
        assert_eq!(e.value(), -1.0);
        assert_eq!(e.adjusted(3.0).value(), 0.0);
        assert_eq!(e.adjusted(-2.0).value(), -3.0);
        assert_eq!(e.base_value(), -1.0);
    }

    #[test]
    fn threshold_admission() {
        // d < 0
        assert!(should_be_removed_value(-18.0, 3));
        // d = 1, -2/3 < -1 is false
        assert!(!should_be_removed_value(-16.0, 3));
        // d = 0.5, -2/1 < -0.5 is true
        assert!(should_be_removed_value(-16.5, 1));
        let e = DicdataElement::new("今日", "キョウ", 1285, 1285, 501, -10.0);
        assert!(!should_be_removed(&e));
    }

    #[test]
    fn penalized_applies_adjustment() {
        let e = DicdataElement::new("今日", "キョウ", 1285, 1285, 501, -8.0);
        let p = penalized(&e, 3, 3.5).expect("survives");
        // -2/2 / 2 * 3.5 * 1.0
        assert!((p.value() - (-8.0 - 1.75)).abs() < 1e-6);
        assert_eq!(penalized(&e, 3, 0.0), Some(e.clone()));
        let weak = DicdataElement::new("今日", "キョウ", 1285, 1285, 501, -16.5);
        assert!(penalized(&weak, 3, 10.5).is_none());
    }

    #[test]
    fn user_dictionary_provenance() {
        let e = DicdataElement::with_cid("ア", 1288, 501, -1.0);
        assert!(!e.is_from_user_dictionary());
        assert!(e.clone().with_metadata(DicdataMetadata::Dynamic).is_from_user_dictionary());
        assert!(!e.with_metadata(DicdataMetadata::Learned).is_from_user_dictionary());
    }
}
