//! Keystroke model shared by the composing buffer and the transliteration tables.
//!
//! Public API:
//! - `InputPiece` - one keystroke (character, composition separator or raw key)
//! - `InputStyle` - how a keystroke is transliterated (direct, romaji, mapped table)
//! - `InputTableId` - identifies a registered transliteration table
//! - `InputElement` - a keystroke tagged with its style
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Modifier keys that can be part of a key signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Modifier {
    Shift,
}

/// A single unit of user input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InputPiece {
    /// A plain character.
    Character(char),
    /// Boundary marker that stops transliteration rules from spanning it.
    CompositionSeparator,
    /// A physical key press. `intention` is the character the key stands for
    /// in the current layout; `input` is the raw key.
    Key {
        intention: Option<char>,
        input: char,
        modifiers: BTreeSet<Modifier>,
    },
}

impl InputPiece {
    /// Shorthand for a shifted key whose intention equals its input.
    pub fn shifted(c: char) -> Self {
        InputPiece::Key {
            intention: Some(c),
            input: c,
            modifiers: [Modifier::Shift].into_iter().collect(),
        }
    }

    /// The character this piece contributes when no table rule applies.
    pub fn raw_char(&self) -> Option<char> {
        match self {
            InputPiece::Character(c) => Some(*c),
            InputPiece::CompositionSeparator => None,
            InputPiece::Key {
                intention, input, ..
            } => Some(intention.unwrap_or(*input)),
        }
    }
}

/// Identifier of a transliteration table held by the style registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InputTableId {
    DefaultRomanToKana,
    Empty,
    Named(String),
}

impl fmt::Display for InputTableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputTableId::DefaultRomanToKana => write!(f, "default-roman-to-kana"),
            InputTableId::Empty => write!(f, "empty"),
            InputTableId::Named(name) => write!(f, "{}", name),
        }
    }
}

/// How a keystroke is turned into kana.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InputStyle {
    /// Characters are taken as typed.
    Direct,
    /// Romaji transliterated by the built-in table.
    Roman2Kana,
    /// Transliterated by a table from the registry.
    Mapped(InputTableId),
}

impl InputStyle {
    /// Text that has already been resolved and must not be re-transliterated.
    pub const FROZEN: InputStyle = InputStyle::Mapped(InputTableId::Empty);

    pub fn is_frozen(&self) -> bool {
        *self == Self::FROZEN
    }

    /// Whether this style goes through the default romaji table.
    pub fn is_roman2kana(&self) -> bool {
        matches!(
            self,
            InputStyle::Roman2Kana | InputStyle::Mapped(InputTableId::DefaultRomanToKana)
        )
    }
}

/// A keystroke tagged with the style it was typed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputElement {
    pub piece: InputPiece,
    pub style: InputStyle,
}

impl InputElement {
    pub fn new(piece: InputPiece, style: InputStyle) -> Self {
        Self { piece, style }
    }

    pub fn character(c: char, style: InputStyle) -> Self {
        Self {
            piece: InputPiece::Character(c),
            style,
        }
    }

    pub fn separator(style: InputStyle) -> Self {
        Self {
            piece: InputPiece::CompositionSeparator,
            style,
        }
    }

    /// Frozen separator inserted by the buffer to block rules across an edit.
    pub fn frozen_separator() -> Self {
        Self::separator(InputStyle::FROZEN)
    }

    pub fn is_frozen_separator(&self) -> bool {
        self.piece == InputPiece::CompositionSeparator && self.style.is_frozen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frozen_is_mapped_empty() {
        assert_eq!(InputStyle::FROZEN, InputStyle::Mapped(InputTableId::Empty));
        assert!(InputStyle::FROZEN.is_frozen());
        assert!(!InputStyle::Roman2Kana.is_frozen());
    }

    #[test]
    fn raw_char_prefers_intention() {
        let key = InputPiece::Key {
            intention: Some('あ'),
            input: '3',
            modifiers: BTreeSet::new(),
        };
        assert_eq!(key.raw_char(), Some('あ'));
        assert_eq!(InputPiece::CompositionSeparator.raw_char(), None);
        assert_eq!(InputPiece::shifted('0').raw_char(), Some('0'));
    }

    #[test]
    fn frozen_separator_detection() {
        assert!(InputElement::frozen_separator().is_frozen_separator());
        assert!(!InputElement::separator(InputStyle::Roman2Kana).is_frozen_separator());
        assert!(!InputElement::character('a', InputStyle::FROZEN).is_frozen_separator());
    }
}
