//! kanakanji-core
//!
//! Incremental kana-kanji conversion: a composing buffer that keeps raw
//! keystrokes and derived kana in sync, dictionary search over FST prefix
//! tries with typo correction, an arena lattice that is reused between
//! keystrokes, and candidate ranking.
//!
//! Dictionaries are FST maps with bincode payloads; the learning store
//! persists to redb.
//!
//! Public API:
//! - `ComposingText` - editable keystroke/kana buffer
//! - `KanaKanjiConverter` - conversion session (`request_candidates`)
//! - `DicdataStore` - shared dictionary handle
//! - `ConvertRequestOptions` - per-request options
//! - `Candidate` / `ConversionResult` - ranked results
//! - `LearningManager` - local learning store
//! - `DictionaryBuilder` - writes dictionary directories
//! - `EngineConfig` - configuration loaded from TOML
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod input_piece;
pub use input_piece::{InputElement, InputPiece, InputStyle, InputTableId};

pub mod input_table;
pub use input_table::InputTable;

pub mod romaji;

pub mod input_style_manager;
pub use input_style_manager::{InputStyleManager, TableFormatError};

pub mod composing_text;
pub use composing_text::ComposingText;

pub mod word_class;

pub mod dicdata;
pub use dicdata::{DicdataElement, DicdataMetadata};

pub mod template;

pub mod candidate;
pub use candidate::{Candidate, CompleteAction, ComposingCount};

pub mod prefix_trie;
pub use prefix_trie::{FstTrie, PrefixTrie};

pub mod dictionary_builder;
pub use dictionary_builder::DictionaryBuilder;

pub mod learning;
pub use learning::{LearningConfig, LearningManager, LearningStore, LearningType};

pub mod dictionary;
pub use dictionary::{DicdataStore, DicdataStoreState};

pub mod lattice;

pub mod kana2kanji;

pub mod options;
pub use options::{ConvertRequestOptions, KeyboardLanguage, RequestQuery, SpellChecker};

pub mod special;
pub use special::SpecialCandidateProvider;

pub mod converter;
pub use converter::{ConversionResult, KanaKanjiConverter, PostCompositionPredictionCandidate};

/// Engine configuration.
///
/// Holds the dictionary locations and the defaults used to build
/// [`ConvertRequestOptions`] through [`ConvertRequestOptions::from_config`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// System dictionary directory (`charID.chid`, `louds/`, `cb/`, `mm.binary`, `p/`).
    pub dictionary_dir: PathBuf,
    /// Directory holding `user.fst` / `user_shortcuts.fst`.
    pub user_dictionary_dir: Option<PathBuf>,
    /// Directory of the learning database.
    pub memory_dir: Option<PathBuf>,

    /// Number of best paths kept per lattice node.
    pub n_best: usize,
    /// Search typo-corrected readings as well as the literal input.
    pub need_typo_correction: bool,

    pub learning_type: LearningType,
    /// Learned entries kept on disk; lowest counts are evicted first.
    pub max_memory_count: usize,

    pub keyboard_language: KeyboardLanguage,
    pub require_japanese_prediction: bool,
    pub require_english_prediction: bool,
    pub english_candidate_in_roman2kana_input: bool,
    pub full_width_roman_candidate: bool,
    pub half_width_kana_candidate: bool,

    /// Connection cost rows kept in memory.
    pub connection_cache_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dictionary_dir: PathBuf::from("dictionary"),
            user_dictionary_dir: None,
            memory_dir: None,
            // Ten paths per node is plenty for five visible sentences
            n_best: 10,
            need_typo_correction: false,
            learning_type: LearningType::InputAndOutput,
            max_memory_count: 65536,
            keyboard_language: KeyboardLanguage::JaJp,
            require_japanese_prediction: true,
            require_english_prediction: false,
            english_candidate_in_roman2kana_input: false,
            full_width_roman_candidate: false,
            half_width_kana_candidate: false,
            connection_cache_size: 512,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(
        path: P,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Kana and width helpers.
pub mod utils {
    /// Normalize input strings (NFC) and trim whitespace.
    pub fn normalize(s: &str) -> String {
        use unicode_normalization::UnicodeNormalization;
        s.nfc().collect::<String>().trim().to_string()
    }

    /// Convert ASCII characters to full-width equivalents.
    ///
    /// Space becomes the ideographic space; non-ASCII passes through.
    pub fn to_fullwidth(s: &str) -> String {
        s.chars()
            .map(|ch| match ch {
                ' ' => '\u{3000}',
                // ASCII printable range (0x21-0x7E) -> Full-width (0xFF01-0xFF5E)
                '!'..='~' => char::from_u32(ch as u32 - 0x21 + 0xFF01).unwrap_or(ch),
                _ => ch,
            })
            .collect()
    }

    /// Convert full-width ASCII back to half-width.
    pub fn to_halfwidth(s: &str) -> String {
        s.chars()
            .map(|ch| match ch {
                '\u{3000}' => ' ',
                '\u{FF01}'..='\u{FF5E}' => char::from_u32(ch as u32 - 0xFF01 + 0x21).unwrap_or(ch),
                _ => ch,
            })
            .collect()
    }

    pub fn to_katakana_char(c: char) -> char {
        match c {
            '\u{3041}'..='\u{3096}' | '\u{309D}'..='\u{309E}' => {
                char::from_u32(c as u32 + 0x60).unwrap_or(c)
            }
            _ => c,
        }
    }

    pub fn to_hiragana_char(c: char) -> char {
        match c {
            '\u{30A1}'..='\u{30F6}' | '\u{30FD}'..='\u{30FE}' => {
                char::from_u32(c as u32 - 0x60).unwrap_or(c)
            }
            _ => c,
        }
    }

    /// Hiragana to katakana; everything else is kept.
    pub fn to_katakana(s: &str) -> String {
        s.chars().map(to_katakana_char).collect()
    }

    /// Katakana to hiragana; everything else is kept.
    pub fn to_hiragana(s: &str) -> String {
        s.chars().map(to_hiragana_char).collect()
    }

    const HALFWIDTH_KANA: &[(char, &str)] = &[
        ('ア', "ｱ"), ('イ', "ｲ"), ('ウ', "ｳ"), ('エ', "ｴ"), ('オ', "ｵ"),
        ('カ', "ｶ"), ('キ', "ｷ"), ('ク', "ｸ"), ('ケ', "ｹ"), ('コ', "ｺ"),
        ('サ', "ｻ"), ('シ', "ｼ"), ('ス', "ｽ"), ('セ', "ｾ"), ('ソ', "ｿ"),
        ('タ', "ﾀ"), ('チ', "ﾁ"), ('ツ', "ﾂ"), ('テ', "ﾃ"), ('ト', "ﾄ"),
        ('ナ', "ﾅ"), ('ニ', "ﾆ"), ('ヌ', "ﾇ"), ('ネ', "ﾈ"), ('ノ', "ﾉ"),
        ('ハ', "ﾊ"), ('ヒ', "ﾋ"), ('フ', "ﾌ"), ('ヘ', "ﾍ"), ('ホ', "ﾎ"),
        ('マ', "ﾏ"), ('ミ', "ﾐ"), ('ム', "ﾑ"), ('メ', "ﾒ"), ('モ', "ﾓ"),
        ('ヤ', "ﾔ"), ('ユ', "ﾕ"), ('ヨ', "ﾖ"),
        ('ラ', "ﾗ"), ('リ', "ﾘ"), ('ル', "ﾙ"), ('レ', "ﾚ"), ('ロ', "ﾛ"),
        ('ワ', "ﾜ"), ('ヲ', "ｦ"), ('ン', "ﾝ"),
        ('ァ', "ｧ"), ('ィ', "ｨ"), ('ゥ', "ｩ"), ('ェ', "ｪ"), ('ォ', "ｫ"),
        ('ャ', "ｬ"), ('ュ', "ｭ"), ('ョ', "ｮ"), ('ッ', "ｯ"),
        ('ガ', "ｶﾞ"), ('ギ', "ｷﾞ"), ('グ', "ｸﾞ"), ('ゲ', "ｹﾞ"), ('ゴ', "ｺﾞ"),
        ('ザ', "ｻﾞ"), ('ジ', "ｼﾞ"), ('ズ', "ｽﾞ"), ('ゼ', "ｾﾞ"), ('ゾ', "ｿﾞ"),
        ('ダ', "ﾀﾞ"), ('ヂ', "ﾁﾞ"), ('ヅ', "ﾂﾞ"), ('デ', "ﾃﾞ"), ('ド', "ﾄﾞ"),
        ('バ', "ﾊﾞ"), ('ビ', "ﾋﾞ"), ('ブ', "ﾌﾞ"), ('ベ', "ﾍﾞ"), ('ボ', "ﾎﾞ"),
        ('パ', "ﾊﾟ"), ('ピ', "ﾋﾟ"), ('プ', "ﾌﾟ"), ('ペ', "ﾍﾟ"), ('ポ', "ﾎﾟ"),
        ('ヴ', "ｳﾞ"), ('ー', "ｰ"), ('。', "｡"), ('「', "｢"), ('」', "｣"),
        ('、', "､"), ('・', "･"),
    ];

    /// Full-width katakana and ASCII to their half-width forms.
    pub fn to_halfwidth_katakana(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for c in to_halfwidth(s).chars() {
            match HALFWIDTH_KANA.iter().find(|(k, _)| *k == c) {
                Some((_, h)) => out.push_str(h),
                None => out.push(c),
            }
        }
        out
    }

    /// Non-empty and made only of ASCII letters.
    pub fn only_roman_alphabet(s: &str) -> bool {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic())
    }

    /// Non-empty and made only of ASCII letters, digits and hyphens/underscores/dots.
    pub fn only_roman_alphabet_or_number(s: &str) -> bool {
        !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    }

    pub fn is_katakana(c: char) -> bool {
        ('\u{30A1}'..='\u{30FA}').contains(&c) || c == 'ー'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = EngineConfig::default();
        config.n_best = 7;
        config.memory_dir = Some(PathBuf::from("/tmp/memory"));
        let text = config.to_toml_string().expect("serialize");
        let back = EngineConfig::from_toml_str(&text).expect("parse");
        assert_eq!(back.n_best, 7);
        assert_eq!(back.memory_dir, Some(PathBuf::from("/tmp/memory")));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str("n_best = 3\n").expect("parse");
        assert_eq!(config.n_best, 3);
        assert_eq!(config.max_memory_count, 65536);
        assert_eq!(config.learning_type, LearningType::InputAndOutput);
    }

    #[test]
    fn kana_conversions() {
        assert_eq!(utils::to_katakana("きょうはいい"), "キョウハイイ");
        assert_eq!(utils::to_hiragana("キョウ"), "きょう");
        assert_eq!(utils::to_katakana("abc"), "abc");
        assert_eq!(utils::to_halfwidth_katakana("ガッコウ"), "ｶﾞｯｺｳ");
        assert_eq!(utils::to_fullwidth("ab1"), "ａｂ１");
        assert_eq!(utils::to_halfwidth("ａｂ１"), "ab1");
        assert!(utils::only_roman_alphabet("Hello"));
        assert!(!utils::only_roman_alphabet("he1lo"));
        assert!(!utils::only_roman_alphabet(""));
    }
}
