//! Per-request conversion options.
//!
//! Public API:
//! - `ConvertRequestOptions` - everything a `request_candidates` call reads
//! - `KeyboardLanguage` - layout the input comes from
//! - `RequestQuery` - normal or exact-match request
//! - `Metadata` - host application information
//! - `SpellChecker` - foreign word completion hook
use crate::learning::{LearningConfig, LearningType};
use crate::special::{self, SpecialCandidateProvider};
use crate::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum KeyboardLanguage {
    EnUs,
    #[default]
    JaJp,
    ElGr,
    None,
}

impl KeyboardLanguage {
    /// Language code handed to the spell checker.
    pub fn spell_check_language(&self) -> Option<&'static str> {
        match self {
            KeyboardLanguage::EnUs => Some("en-US"),
            KeyboardLanguage::ElGr => Some("el_GR"),
            KeyboardLanguage::JaJp | KeyboardLanguage::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestQuery {
    #[default]
    Default,
    /// Only whole-input conversions and exact user shortcuts.
    ExactMatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Full version line, e.g. `"MyIME Version 0.7.1"`.
    pub version_string: String,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            version_string: format!("kanakanji {}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Completion source for foreign words typed on a non-Japanese layout.
pub trait SpellChecker: Send + Sync {
    /// Completions of the partial word `word`.
    fn completions(&self, word: &str, language: &str) -> Vec<String>;
}

#[derive(Clone)]
pub struct ConvertRequestOptions {
    pub n_best: usize,
    /// `None` lets the converter decide from the keyboard layout.
    pub need_typo_correction: Option<bool>,
    pub require_japanese_prediction: bool,
    pub require_english_prediction: bool,
    pub keyboard_language: KeyboardLanguage,
    pub english_candidate_in_roman2kana_input: bool,
    pub full_width_roman_candidate: bool,
    pub half_width_kana_candidate: bool,
    pub learning_type: LearningType,
    pub max_memory_count: usize,
    pub memory_dir: Option<PathBuf>,
    /// Directory holding the user dictionary tries.
    pub shared_container_dir: Option<PathBuf>,
    pub special_candidate_providers: Vec<Arc<dyn SpecialCandidateProvider>>,
    pub spell_checker: Option<Arc<dyn SpellChecker>>,
    pub metadata: Option<Metadata>,
    pub request_query: RequestQuery,
}

impl std::fmt::Debug for ConvertRequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvertRequestOptions")
            .field("n_best", &self.n_best)
            .field("need_typo_correction", &self.need_typo_correction)
            .field("keyboard_language", &self.keyboard_language)
            .field("learning_type", &self.learning_type)
            .field("memory_dir", &self.memory_dir)
            .field("shared_container_dir", &self.shared_container_dir)
            .field(
                "special_candidate_providers",
                &self.special_candidate_providers.len(),
            )
            .field("request_query", &self.request_query)
            .finish()
    }
}

impl Default for ConvertRequestOptions {
    fn default() -> Self {
        Self {
            n_best: 10,
            need_typo_correction: None,
            require_japanese_prediction: true,
            require_english_prediction: true,
            keyboard_language: KeyboardLanguage::JaJp,
            english_candidate_in_roman2kana_input: true,
            full_width_roman_candidate: false,
            half_width_kana_candidate: false,
            learning_type: LearningType::InputAndOutput,
            max_memory_count: 65536,
            memory_dir: None,
            shared_container_dir: None,
            special_candidate_providers: special::default_providers(),
            spell_checker: None,
            metadata: None,
            request_query: RequestQuery::Default,
        }
    }
}

impl ConvertRequestOptions {
    /// Options carrying the defaults of an engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            n_best: config.n_best,
            need_typo_correction: Some(config.need_typo_correction),
            require_japanese_prediction: config.require_japanese_prediction,
            require_english_prediction: config.require_english_prediction,
            keyboard_language: config.keyboard_language,
            english_candidate_in_roman2kana_input: config.english_candidate_in_roman2kana_input,
            full_width_roman_candidate: config.full_width_roman_candidate,
            half_width_kana_candidate: config.half_width_kana_candidate,
            learning_type: config.learning_type,
            max_memory_count: config.max_memory_count,
            memory_dir: config.memory_dir.clone(),
            shared_container_dir: config.user_dictionary_dir.clone(),
            ..Self::default()
        }
    }

    pub fn learning_config(&self) -> LearningConfig {
        LearningConfig {
            learning_type: self.learning_type,
            max_memory_count: self.max_memory_count,
            memory_dir: self.memory_dir.clone(),
        }
    }

    /// Typo correction is on by default for Japanese layouts only.
    pub fn typo_correction_enabled(&self) -> bool {
        self.need_typo_correction
            .unwrap_or(self.keyboard_language == KeyboardLanguage::JaJp)
    }

    pub fn version_string(&self) -> String {
        self.metadata.clone().unwrap_or_default().version_string
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_config() {
        let config = EngineConfig {
            n_best: 4,
            need_typo_correction: true,
            learning_type: LearningType::OnlyOutput,
            memory_dir: Some(PathBuf::from("/tmp/m")),
            ..EngineConfig::default()
        };
        let options = ConvertRequestOptions::from_config(&config);
        assert_eq!(options.n_best, 4);
        assert!(options.typo_correction_enabled());
        let learning = options.learning_config();
        assert_eq!(learning.learning_type, LearningType::OnlyOutput);
        assert_eq!(learning.memory_dir, Some(PathBuf::from("/tmp/m")));
        assert!(!options.special_candidate_providers.is_empty());
    }

    #[test]
    fn typo_correction_default_depends_on_layout() {
        let mut options = ConvertRequestOptions::default();
        assert!(options.typo_correction_enabled());
        options.keyboard_language = KeyboardLanguage::EnUs;
        assert!(!options.typo_correction_enabled());
        options.need_typo_correction = Some(true);
        assert!(options.typo_correction_enabled());
    }
}
