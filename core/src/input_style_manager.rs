//! Registry of transliteration tables and the custom table file format.
//!
//! Table files are UTF-8, one rule per line: `key<TAB>value`. Blank lines and
//! lines starting with `#` are ignored. Brace tokens:
//! - key side: `{composition-separator}`, `{any character}`, `{lbracket}`,
//!   `{rbracket}`, `{shift 0}`, `{shift _}`
//! - value side: `{any character}`, `{lbracket}`, `{rbracket}`
use crate::input_piece::{InputPiece, InputTableId};
use crate::input_table::{InputTable, KeyElement, ValueElement};
use crate::romaji;
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Which side of a rule a token appeared on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Key,
    Value,
}

/// A problem found in a table file. Line numbers are 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum TableFormatError {
    #[error("line {line}: expected exactly one tab, found {found}")]
    InvalidTabCount { line: usize, found: usize },
    #[error("line {line}: unknown token {{{token}}} on the {side:?} side")]
    UnknownBraceToken {
        line: usize,
        token: String,
        side: Side,
    },
    #[error("line {line}: unclosed brace")]
    UnclosedBrace { line: usize },
    #[error("line {line}: {{{token}}} must be the last key element")]
    ShiftTokenNotAtTail { line: usize, token: String },
    #[error("line {line}: duplicate rule, first defined at line {first_defined_at}")]
    DuplicateRule { line: usize, first_defined_at: usize },
}

/// Failure to export a table in the text format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    #[error("key element {0:?} has no text representation")]
    UnsupportedKeyElement(KeyElement),
}

const KEY_TOKENS: [&str; 6] = [
    "composition-separator",
    "any character",
    "lbracket",
    "rbracket",
    "shift 0",
    "shift _",
];
const VALUE_TOKENS: [&str; 3] = ["any character", "lbracket", "rbracket"];

static DEFAULT_ROMAN_TO_KANA: Lazy<Arc<InputTable>> =
    Lazy::new(|| Arc::new(romaji::default_roman_to_kana()));
static EMPTY: Lazy<Arc<InputTable>> = Lazy::new(|| Arc::new(InputTable::default()));
static CUSTOM_TABLES: Lazy<RwLock<HashMap<String, Arc<InputTable>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Process-wide table registry.
pub struct InputStyleManager;

impl InputStyleManager {
    /// Resolve a table id. Unknown names resolve to the empty table.
    pub fn table(id: &InputTableId) -> Arc<InputTable> {
        match id {
            InputTableId::DefaultRomanToKana => DEFAULT_ROMAN_TO_KANA.clone(),
            InputTableId::Empty => EMPTY.clone(),
            InputTableId::Named(name) => {
                let found = CUSTOM_TABLES
                    .read()
                    .ok()
                    .and_then(|tables| tables.get(name).cloned());
                match found {
                    Some(table) => table,
                    None => {
                        tracing::warn!(table = %name, "input table not registered; using the empty table");
                        EMPTY.clone()
                    }
                }
            }
        }
    }

    /// Register (or replace) a named table.
    pub fn register(name: &str, table: InputTable) {
        if let Ok(mut tables) = CUSTOM_TABLES.write() {
            tables.insert(name.to_string(), Arc::new(table));
        }
    }

    /// Parse table text into a table. Malformed lines with fewer than two
    /// columns are skipped; later duplicates replace earlier ones.
    pub fn parse_table(content: &str) -> InputTable {
        let mut mapping = BTreeMap::new();
        for line in content.lines() {
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let cols: Vec<&str> = line.split('\t').filter(|c| !c.is_empty()).collect();
            if cols.len() < 2 {
                continue;
            }
            mapping.insert(parse_key(cols[0]), parse_value(cols[1]));
        }
        InputTable::new(mapping)
    }

    /// Load a table file from disk.
    pub fn load_table<P: AsRef<Path>>(path: P) -> anyhow::Result<InputTable> {
        use anyhow::Context;
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read input table {}", path.display()))?;
        Ok(Self::parse_table(&content))
    }

    /// Serialize a table back into the text format.
    pub fn export_table(table: &InputTable) -> Result<String, ExportError> {
        let mut lines = Vec::with_capacity(table.mapping().len());
        for (key, value) in table.mapping() {
            let mut line = String::new();
            for element in key {
                line.push_str(&encode_key_element(element)?);
            }
            line.push('\t');
            for element in value {
                match element {
                    ValueElement::Character(c) => line.push_str(&encode_char(*c)),
                    ValueElement::Any1 => line.push_str("{any character}"),
                }
            }
            lines.push(line);
        }
        Ok(lines.join("\n"))
    }

    /// Validate table text. Returns every problem found.
    pub fn check_format(content: &str) -> Result<(), Vec<TableFormatError>> {
        let mut errors = Vec::new();
        let mut first_seen: HashMap<Vec<KeyElement>, usize> = HashMap::new();

        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let tab_count = line.matches('\t').count();
            if tab_count != 1 {
                errors.push(TableFormatError::InvalidTabCount {
                    line: line_no,
                    found: tab_count,
                });
            }
            let Some((key_str, value_str)) = line.split_once('\t') else {
                continue;
            };

            let shift_not_at_tail = scan_braces(key_str, Side::Key, line_no, &mut errors);
            scan_braces(value_str, Side::Value, line_no, &mut errors);
            if let Some(token) = shift_not_at_tail {
                errors.push(TableFormatError::ShiftTokenNotAtTail {
                    line: line_no,
                    token,
                });
            }

            let key = parse_key(key_str);
            match first_seen.get(&key) {
                Some(first) => errors.push(TableFormatError::DuplicateRule {
                    line: line_no,
                    first_defined_at: *first,
                }),
                None => {
                    first_seen.insert(key, line_no);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Split `s` into plain characters and `{token}` groups. Unclosed braces are
/// returned as plain characters.
fn tokenize(s: &str) -> Vec<Result<char, &str>> {
    let mut out = Vec::new();
    let mut rest = s;
    while let Some(c) = rest.chars().next() {
        if c == '{' {
            if let Some(end) = rest.find('}') {
                out.push(Err(&rest[1..end]));
                rest = &rest[end + 1..];
                continue;
            }
        }
        out.push(Ok(c));
        rest = &rest[c.len_utf8()..];
    }
    out
}

fn parse_key(s: &str) -> Vec<KeyElement> {
    let mut result = Vec::new();
    for token in tokenize(s) {
        match token {
            Ok(c) => result.push(KeyElement::Piece(InputPiece::Character(c))),
            Err("composition-separator") => {
                result.push(KeyElement::Piece(InputPiece::CompositionSeparator))
            }
            Err("any character") => result.push(KeyElement::Any1),
            Err("lbracket") => result.push(KeyElement::Piece(InputPiece::Character('{'))),
            Err("rbracket") => result.push(KeyElement::Piece(InputPiece::Character('}'))),
            Err("shift 0") => result.push(KeyElement::Piece(InputPiece::shifted('0'))),
            Err("shift _") => result.push(KeyElement::Piece(InputPiece::shifted('_'))),
            Err(other) => result.extend(
                format!("{{{}}}", other)
                    .chars()
                    .map(|c| KeyElement::Piece(InputPiece::Character(c))),
            ),
        }
    }
    result
}

fn parse_value(s: &str) -> Vec<ValueElement> {
    let mut result = Vec::new();
    for token in tokenize(s) {
        match token {
            Ok(c) => result.push(ValueElement::Character(c)),
            Err("any character") => result.push(ValueElement::Any1),
            Err("lbracket") => result.push(ValueElement::Character('{')),
            Err("rbracket") => result.push(ValueElement::Character('}')),
            Err(other) => result.extend(format!("{{{}}}", other).chars().map(ValueElement::Character)),
        }
    }
    result
}

/// Check brace tokens on one side. Returns the shift token name when a shift
/// token is followed by more key elements.
fn scan_braces(
    s: &str,
    side: Side,
    line: usize,
    errors: &mut Vec<TableFormatError>,
) -> Option<String> {
    let known: &[&str] = match side {
        Side::Key => &KEY_TOKENS,
        Side::Value => &VALUE_TOKENS,
    };
    let mut misplaced_shift = None;
    let mut idx = 0;
    while let Some(offset) = s[idx..].find('{') {
        let start = idx + offset;
        let Some(end_offset) = s[start..].find('}') else {
            errors.push(TableFormatError::UnclosedBrace { line });
            break;
        };
        let end = start + end_offset;
        let token = &s[start + 1..end];
        if token.contains('{') {
            errors.push(TableFormatError::UnclosedBrace { line });
        } else {
            if !known.contains(&token) {
                errors.push(TableFormatError::UnknownBraceToken {
                    line,
                    token: token.to_string(),
                    side,
                });
            }
            if side == Side::Key
                && token.starts_with("shift ")
                && end + 1 != s.len()
                && misplaced_shift.is_none()
            {
                misplaced_shift = Some(token.to_string());
            }
        }
        idx = end + 1;
    }
    misplaced_shift
}

fn encode_char(c: char) -> String {
    match c {
        '{' => "{lbracket}".to_string(),
        '}' => "{rbracket}".to_string(),
        _ => c.to_string(),
    }
}

fn encode_key_element(element: &KeyElement) -> Result<String, ExportError> {
    match element {
        KeyElement::Any1 => Ok("{any character}".to_string()),
        KeyElement::Piece(InputPiece::Character(c)) => Ok(encode_char(*c)),
        KeyElement::Piece(InputPiece::CompositionSeparator) => {
            Ok("{composition-separator}".to_string())
        }
        KeyElement::Piece(piece) if *piece == InputPiece::shifted('0') => Ok("{shift 0}".to_string()),
        KeyElement::Piece(piece) if *piece == InputPiece::shifted('_') => Ok("{shift _}".to_string()),
        other => Err(ExportError::UnsupportedKeyElement(other.clone())),
    }
}
