//! Per-session dictionary state: keyboard language, dynamic user
//! dictionary, learning memory and the lazily loaded session tries.
use crate::candidate::Candidate;
use crate::converter::{PostCompositionPredictionCandidate, PredictionType};
use crate::dicdata::{DicdataElement, DicdataMetadata};
use crate::learning::{LearningConfig, LearningManager, LearningStore};
use crate::options::KeyboardLanguage;
use crate::prefix_trie::{CharIds, FstTrie};
use crate::utils;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loaded trie, or `None` when loading failed. The outer `Option` is
/// "not loaded yet".
type Memo = Option<Option<Arc<FstTrie>>>;

#[derive(Debug)]
pub struct DicdataStoreState {
    pub keyboard_language: KeyboardLanguage,
    dynamic_user_dictionary: Vec<DicdataElement>,
    learning: LearningManager,
    user_dictionary_dir: Option<PathBuf>,
    user: Memo,
    user_shortcuts: Memo,
    memory: Memo,
}

fn load_user_trie(dir: Option<&Path>, name: &str) -> Option<Arc<FstTrie>> {
    let dir = dir?;
    match FstTrie::load(dir.join(name), DicdataMetadata::UserDictionary) {
        Ok(trie) => Some(Arc::new(trie)),
        Err(e) => {
            tracing::debug!("{} trie unavailable: {:#}", name, e);
            None
        }
    }
}

impl DicdataStoreState {
    pub fn new(char_ids: Arc<CharIds>) -> Self {
        Self {
            keyboard_language: KeyboardLanguage::JaJp,
            dynamic_user_dictionary: Vec::new(),
            learning: LearningManager::new(char_ids),
            user_dictionary_dir: None,
            user: None,
            user_shortcuts: None,
            memory: None,
        }
    }

    pub fn learning(&self) -> &LearningManager {
        &self.learning
    }

    pub fn user_dictionary_dir(&self) -> Option<&Path> {
        self.user_dictionary_dir.as_deref()
    }

    pub fn dynamic_user_dictionary(&self) -> &[DicdataElement] {
        &self.dynamic_user_dictionary
    }

    pub fn update_user_dictionary_dir(&mut self, dir: Option<PathBuf>, force_reload: bool) {
        if self.user_dictionary_dir != dir || force_reload {
            self.user_dictionary_dir = dir;
            self.user = None;
            self.user_shortcuts = None;
        }
    }

    pub fn update_keyboard_language(&mut self, language: KeyboardLanguage) {
        self.keyboard_language = language;
    }

    pub fn update_learning_config(&mut self, config: LearningConfig) {
        if self.learning.config() != &config && self.learning.update_config(config) {
            self.memory = None;
        }
    }

    /// Replace the dynamic user dictionary. Readings are stored in katakana.
    pub fn import_dynamic_user_dictionary(&mut self, data: Vec<DicdataElement>) {
        self.dynamic_user_dictionary = data
            .into_iter()
            .map(|mut e| {
                e.ruby = utils::to_katakana(&e.ruby);
                e.with_metadata(DicdataMetadata::Dynamic)
            })
            .collect();
    }

    pub fn user_trie(&mut self) -> Option<Arc<FstTrie>> {
        let dir = self.user_dictionary_dir.as_deref();
        self.user
            .get_or_insert_with(|| load_user_trie(dir, "user"))
            .clone()
    }

    pub fn user_shortcuts_trie(&mut self) -> Option<Arc<FstTrie>> {
        let dir = self.user_dictionary_dir.as_deref();
        self.user_shortcuts
            .get_or_insert_with(|| load_user_trie(dir, "user_shortcuts"))
            .clone()
    }

    pub fn memory_trie(&mut self) -> Option<Arc<FstTrie>> {
        let learning = &self.learning;
        self.memory
            .get_or_insert_with(|| learning.memory_trie().map(Arc::new))
            .clone()
    }

    pub fn save_memory(&mut self) {
        self.learning.save();
        self.memory = None;
    }

    pub fn reset_memory(&mut self) {
        self.learning.reset();
        self.memory = None;
    }

    pub fn forget_memory(&mut self, candidate: &Candidate) {
        self.learning.forget(&candidate.data);
        self.memory = None;
    }

    /// Learn an accepted candidate, optionally preceded by the word accepted
    /// before it.
    pub fn update_learning_data(&mut self, candidate: &Candidate, previous: Option<&DicdataElement>) {
        if !candidate.is_learning_target {
            return;
        }
        match previous {
            Some(previous) => {
                let mut data = Vec::with_capacity(candidate.data.len() + 1);
                data.push(previous.clone());
                data.extend(candidate.data.iter().cloned());
                self.learning.update(&data);
            }
            None => self.learning.update(&candidate.data),
        }
    }

    /// Learn an accepted post-composition prediction following `candidate`.
    pub fn update_learning_data_with_prediction(
        &mut self,
        candidate: &Candidate,
        prediction: &PostCompositionPredictionCandidate,
    ) {
        if !candidate.is_learning_target {
            return;
        }
        match &prediction.kind {
            PredictionType::Additional(data) => {
                self.learning.update_with_replacement(&candidate.data, data);
            }
            PredictionType::Replacement { target, replacement } => {
                let keep = candidate.data.len().saturating_sub(target.len());
                self.learning
                    .update_with_replacement(&candidate.data[..keep], replacement);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::ComposingCount;
    use crate::word_class::{cid, mid};

    fn state() -> DicdataStoreState {
        DicdataStoreState::new(Arc::new(
            CharIds::from_chars("アイウエオカキクケコ").expect("char ids"),
        ))
    }

    fn candidate(word: &str, ruby: &str) -> Candidate {
        let data = DicdataElement::new(word, ruby, cid::GENERAL_NOUN, cid::GENERAL_NOUN, mid::GENERAL, -8.0);
        Candidate::new(word, -8.0, ComposingCount::SurfaceCount(ruby.chars().count()), mid::GENERAL, vec![data])
    }

    #[test]
    fn dynamic_dictionary_is_katakana_and_tagged() {
        let mut state = state();
        state.import_dynamic_user_dictionary(vec![DicdataElement::with_cid("かき", cid::GENERAL_NOUN, mid::GENERAL, -5.0)]);
        let stored = &state.dynamic_user_dictionary()[0];
        assert_eq!(stored.ruby, "カキ");
        assert_eq!(stored.metadata, DicdataMetadata::Dynamic);
    }

    #[test]
    fn learning_skips_non_targets() {
        let mut state = state();
        state.update_learning_data(&candidate("柿", "カキ").not_learning_target(), None);
        assert!(state.learning().pending_counts().is_empty());
        state.update_learning_data(&candidate("柿", "カキ"), None);
        assert_eq!(state.learning().pending_counts().len(), 1);
    }

    #[test]
    fn replacement_prediction_learns_the_tail() {
        let mut state = state();
        let base = candidate("柿", "カキ");
        let replacement = vec![DicdataElement::new("池", "イケ", cid::GENERAL_NOUN, cid::GENERAL_NOUN, mid::GENERAL, -8.0)];
        let prediction = PostCompositionPredictionCandidate {
            text: "池".to_string(),
            value: -8.0,
            kind: PredictionType::Replacement {
                target: base.data.clone(),
                replacement: replacement.clone(),
            },
        };
        state.update_learning_data_with_prediction(&base, &prediction);
        let counts = state.learning().pending_counts();
        assert!(counts.contains_key(&("イケ".to_string(), "池".to_string())));
        assert!(!counts.contains_key(&("カキ".to_string(), "柿".to_string())));
    }

    #[test]
    fn missing_user_dictionary_is_memoized() {
        let mut state = state();
        assert!(state.user_trie().is_none());
        state.update_user_dictionary_dir(Some(std::env::temp_dir().join("kanakanji_no_user_dict")), false);
        assert!(state.user_trie().is_none());
        assert!(state.user_shortcuts_trie().is_none());
    }
}
