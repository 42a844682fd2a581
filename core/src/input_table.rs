//! Trie-backed transliteration table (keystrokes -> kana).
//!
//! Keys are stored reversed so that matching walks backwards from the newest
//! keystroke over the already-converted buffer. This makes rules such as
//! `ka -> か` apply when `a` arrives after a buffer ending in `k`, and rules
//! such as `かn + separator -> かん` rewrite previously emitted text.
use crate::input_piece::{InputPiece, Modifier};
use crate::utils;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// One element of a rule key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyElement {
    Piece(InputPiece),
    /// Wildcard matching any single piece; every wildcard in one key must
    /// match the same piece.
    Any1,
}

/// One element of a rule output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueElement {
    Character(char),
    /// Replaced with the character captured by the key wildcard.
    Any1,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct KeySignature {
    input: char,
    modifiers: BTreeSet<Modifier>,
}

#[derive(Debug, Default, Clone)]
struct TrieNode {
    output: Option<Vec<ValueElement>>,
    char_children: HashMap<char, Box<TrieNode>>,
    separator_child: Option<Box<TrieNode>>,
    any1_child: Option<Box<TrieNode>>,
    key_children: HashMap<KeySignature, Box<TrieNode>>,
}

impl TrieNode {
    fn insert(&mut self, reversed_key: &[KeyElement], output: Vec<ValueElement>) {
        let mut node = self;
        for element in reversed_key {
            let slot = match element {
                KeyElement::Any1 => &mut node.any1_child,
                KeyElement::Piece(InputPiece::CompositionSeparator) => &mut node.separator_child,
                KeyElement::Piece(InputPiece::Character(c)) => {
                    node = node.char_children.entry(*c).or_default();
                    continue;
                }
                KeyElement::Piece(InputPiece::Key {
                    input, modifiers, ..
                }) => {
                    let sig = KeySignature {
                        input: *input,
                        modifiers: modifiers.clone(),
                    };
                    node = node.key_children.entry(sig).or_default();
                    continue;
                }
            };
            node = slot.get_or_insert_with(Default::default);
        }
        node.output = Some(output);
    }

    /// Resolve the output, substituting the captured wildcard piece.
    fn output_value(&self, resolved_any1: Option<&InputPiece>) -> Option<Vec<char>> {
        let output = self.output.as_ref()?;
        Some(
            output
                .iter()
                .filter_map(|elem| match elem {
                    ValueElement::Character(c) => Some(*c),
                    ValueElement::Any1 => resolved_any1.and_then(InputPiece::raw_char),
                })
                .collect(),
        )
    }
}

struct Frame<'a> {
    node: &'a TrieNode,
    resolved_any1: Option<InputPiece>,
    depth: usize,
    any1: usize,
    key_exact: usize,
}

struct BestMatch<'a> {
    node: &'a TrieNode,
    resolved_any1: Option<InputPiece>,
    depth: usize,
    any1: usize,
    key_exact: usize,
}

impl BestMatch<'_> {
    /// Deeper first, then fewer wildcard hops, then more exact key hops.
    fn is_beaten_by(&self, depth: usize, any1: usize, key_exact: usize) -> bool {
        depth > self.depth
            || (depth == self.depth
                && (any1 < self.any1 || (any1 == self.any1 && key_exact > self.key_exact)))
    }
}

/// A transliteration table.
///
/// # Example
/// ```
/// use kanakanji_core::input_piece::InputPiece;
/// use kanakanji_core::input_table::InputTable;
///
/// let table = InputTable::from_strings([("ka", "か")]);
/// let mut buffer: Vec<char> = vec!['k'];
/// let deleted = table.apply(&mut buffer, &InputPiece::Character('a'));
/// assert_eq!(deleted, 1);
/// assert_eq!(buffer, vec!['か']);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InputTable {
    mapping: BTreeMap<Vec<KeyElement>, Vec<ValueElement>>,
    root: TrieNode,
    unstable_suffixes: HashSet<Vec<char>>,
    max_unstable_suffix_length: usize,
    max_key_count: usize,
    possible_nexts: HashMap<String, Vec<String>>,
}

impl InputTable {
    /// Build a table from rule pairs.
    pub fn new(mapping: BTreeMap<Vec<KeyElement>, Vec<ValueElement>>) -> Self {
        let mut root = TrieNode::default();
        let mut unstable_suffixes = HashSet::new();
        let mut max_key_count = 0;
        let mut possible_nexts: HashMap<String, Vec<String>> = HashMap::new();

        for (key, value) in mapping.iter() {
            let reversed: Vec<KeyElement> = key.iter().rev().cloned().collect();
            root.insert(&reversed, value.clone());
            max_key_count = max_key_count.max(key.len());

            let key_chars: Vec<char> = key
                .iter()
                .filter_map(|e| match e {
                    KeyElement::Piece(InputPiece::Character(c)) => Some(*c),
                    _ => None,
                })
                .collect();
            for end in 1..=key_chars.len() {
                unstable_suffixes.insert(key_chars[..end].to_vec());
            }

            // Only all-character rules participate in prefix expansion.
            if key_chars.len() == key.len() {
                let out: String = value
                    .iter()
                    .filter_map(|e| match e {
                        ValueElement::Character(c) => Some(*c),
                        ValueElement::Any1 => None,
                    })
                    .collect();
                let katakana = utils::to_katakana(&out);
                for prefix_len in 1..key_chars.len() {
                    let prefix: String = key_chars[..prefix_len].iter().collect();
                    possible_nexts
                        .entry(prefix)
                        .or_default()
                        .push(katakana.clone());
                }
            }
        }

        let max_unstable_suffix_length = unstable_suffixes.iter().map(Vec::len).max().unwrap_or(0);
        Self {
            mapping,
            root,
            unstable_suffixes,
            max_unstable_suffix_length,
            max_key_count,
            possible_nexts,
        }
    }

    /// Build a table from plain `key -> value` strings with no special tokens.
    pub fn from_strings<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mapping = pairs
            .into_iter()
            .map(|(k, v)| {
                (
                    k.chars()
                        .map(|c| KeyElement::Piece(InputPiece::Character(c)))
                        .collect(),
                    v.chars().map(ValueElement::Character).collect(),
                )
            })
            .collect();
        Self::new(mapping)
    }

    /// Merge several tables; on duplicate keys the later table wins.
    pub fn merged<'a>(tables: impl IntoIterator<Item = &'a InputTable>) -> Self {
        let mut mapping = BTreeMap::new();
        for table in tables {
            for (k, v) in table.mapping.iter() {
                mapping.insert(k.clone(), v.clone());
            }
        }
        Self::new(mapping)
    }

    pub fn mapping(&self) -> &BTreeMap<Vec<KeyElement>, Vec<ValueElement>> {
        &self.mapping
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    pub fn max_key_count(&self) -> usize {
        self.max_key_count
    }

    pub fn max_unstable_suffix_length(&self) -> usize {
        self.max_unstable_suffix_length
    }

    /// Whether `suffix` could still be rewritten by a later keystroke.
    pub fn is_unstable_suffix(&self, suffix: &[char]) -> bool {
        self.unstable_suffixes.contains(suffix)
    }

    /// Katakana outputs reachable from an incomplete key prefix (`k` -> `カ`, `キ`, ...).
    pub fn possible_nexts(&self, prefix: &str) -> &[String] {
        self.possible_nexts
            .get(prefix)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn match_greedy(&self, buffer: &[char], added: &InputPiece) -> Option<BestMatch<'_>> {
        let piece_at = |depth: usize| -> Option<InputPiece> {
            if depth == 0 {
                return Some(added.clone());
            }
            buffer
                .len()
                .checked_sub(depth)
                .map(|idx| InputPiece::Character(buffer[idx]))
        };

        let mut best: Option<BestMatch<'_>> = None;
        let mut stack = vec![Frame {
            node: &self.root,
            resolved_any1: None,
            depth: 0,
            any1: 0,
            key_exact: 0,
        }];

        while let Some(top) = stack.pop() {
            if top.depth >= self.max_key_count {
                continue;
            }
            let piece = match piece_at(top.depth) {
                Some(p) => p,
                None => continue,
            };

            let mut next_frames: Vec<Frame<'_>> = Vec::with_capacity(3);
            match &piece {
                InputPiece::Character(c) => {
                    if let Some(next) = top.node.char_children.get(c) {
                        next_frames.push(Frame {
                            node: next,
                            resolved_any1: top.resolved_any1.clone(),
                            depth: top.depth + 1,
                            any1: top.any1,
                            key_exact: top.key_exact,
                        });
                    }
                }
                InputPiece::CompositionSeparator => {
                    if let Some(next) = &top.node.separator_child {
                        next_frames.push(Frame {
                            node: next,
                            resolved_any1: top.resolved_any1.clone(),
                            depth: top.depth + 1,
                            any1: top.any1,
                            key_exact: top.key_exact,
                        });
                    }
                }
                InputPiece::Key {
                    intention,
                    input,
                    modifiers,
                } => {
                    let ch = intention.unwrap_or(*input);
                    if let Some(next) = top.node.char_children.get(&ch) {
                        next_frames.push(Frame {
                            node: next,
                            resolved_any1: top.resolved_any1.clone(),
                            depth: top.depth + 1,
                            any1: top.any1,
                            key_exact: top.key_exact,
                        });
                    }
                    let sig = KeySignature {
                        input: ch,
                        modifiers: modifiers.clone(),
                    };
                    if let Some(next) = top.node.key_children.get(&sig) {
                        next_frames.push(Frame {
                            node: next,
                            resolved_any1: top.resolved_any1.clone(),
                            depth: top.depth + 1,
                            any1: top.any1,
                            key_exact: top.key_exact + 1,
                        });
                    }
                }
            }

            let compatible = top.resolved_any1.as_ref().map_or(true, |r| *r == piece);
            if compatible {
                if let Some(next) = &top.node.any1_child {
                    next_frames.push(Frame {
                        node: next,
                        resolved_any1: top.resolved_any1.clone().or_else(|| Some(piece.clone())),
                        depth: top.depth + 1,
                        any1: top.any1 + 1,
                        key_exact: top.key_exact,
                    });
                }
            }

            for frame in next_frames {
                if frame.node.output.is_some() {
                    let improves = best
                        .as_ref()
                        .map_or(true, |b| b.is_beaten_by(frame.depth, frame.any1, frame.key_exact));
                    if improves {
                        best = Some(BestMatch {
                            node: frame.node,
                            resolved_any1: frame.resolved_any1.clone(),
                            depth: frame.depth,
                            any1: frame.any1,
                            key_exact: frame.key_exact,
                        });
                    }
                }
                stack.push(frame);
            }
        }
        best
    }

    /// Feed one piece into `buffer`, rewriting its tail when a rule matches.
    ///
    /// Returns how many trailing characters of the previous buffer were
    /// consumed by the matched rule.
    pub fn apply(&self, buffer: &mut Vec<char>, added: &InputPiece) -> usize {
        if let Some(best) = self.match_greedy(buffer, added) {
            if let Some(kana) = best.node.output_value(best.resolved_any1.as_ref()) {
                let delete_count = best.depth.saturating_sub(1);
                let keep = buffer.len().saturating_sub(delete_count);
                buffer.truncate(keep);
                buffer.extend(kana);
                return delete_count;
            }
        }
        if let Some(c) = added.raw_char() {
            buffer.push(c);
        }
        0
    }

    /// Convenience wrapper over [`InputTable::apply`] for owned strings.
    pub fn applied(&self, current: &str, added: &InputPiece) -> String {
        let mut buffer: Vec<char> = current.chars().collect();
        self.apply(&mut buffer, added);
        buffer.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(table: &InputTable, s: &str) -> String {
        let mut buf = Vec::new();
        for c in s.chars() {
            table.apply(&mut buf, &InputPiece::Character(c));
        }
        buf.into_iter().collect()
    }

    #[test]
    fn test_simple_rules() {
        let table = InputTable::from_strings([("a", "あ"), ("ka", "か"), ("kk", "っk")]);
        assert_eq!(feed(&table, "ka"), "か");
        assert_eq!(feed(&table, "kka"), "っか");
        assert_eq!(feed(&table, "x"), "x");
    }

    #[test]
    fn test_any1_wildcard_captures_same_piece() {
        let mut mapping = BTreeMap::new();
        mapping.insert(
            vec![KeyElement::Any1, KeyElement::Any1],
            vec![ValueElement::Character('っ'), ValueElement::Any1],
        );
        let table = InputTable::new(mapping);
        assert_eq!(feed(&table, "tt"), "っt");
        // different pieces do not satisfy a double wildcard
        assert_eq!(feed(&table, "ts"), "ts");
    }

    #[test]
    fn test_prefers_concrete_over_wildcard() {
        let mut mapping = BTreeMap::new();
        mapping.insert(
            vec![
                KeyElement::Piece(InputPiece::Character('z')),
                KeyElement::Any1,
            ],
            vec![ValueElement::Character('*')],
        );
        mapping.insert(
            vec![
                KeyElement::Piece(InputPiece::Character('z')),
                KeyElement::Piece(InputPiece::Character('h')),
            ],
            vec![ValueElement::Character('←')],
        );
        let table = InputTable::new(mapping);
        assert_eq!(feed(&table, "zh"), "←");
        assert_eq!(feed(&table, "zq"), "*");
    }

    #[test]
    fn test_separator_rule() {
        let mut mapping = BTreeMap::new();
        mapping.insert(
            vec![
                KeyElement::Piece(InputPiece::Character('n')),
                KeyElement::Piece(InputPiece::CompositionSeparator),
            ],
            vec![ValueElement::Character('ん')],
        );
        let table = InputTable::new(mapping);
        let mut buf = vec!['か', 'n'];
        let deleted = table.apply(&mut buf, &InputPiece::CompositionSeparator);
        assert_eq!(deleted, 1);
        assert_eq!(buf, vec!['か', 'ん']);

        // separator without a matching rule leaves the buffer alone
        let mut buf = vec!['か'];
        assert_eq!(table.apply(&mut buf, &InputPiece::CompositionSeparator), 0);
        assert_eq!(buf, vec!['か']);
    }

    #[test]
    fn test_key_piece_prefers_intention_then_signature() {
        let mut mapping = BTreeMap::new();
        mapping.insert(
            vec![KeyElement::Piece(InputPiece::shifted('0'))],
            vec![ValueElement::Character('を')],
        );
        let table = InputTable::new(mapping);
        let mut buf = Vec::new();
        table.apply(&mut buf, &InputPiece::shifted('0'));
        assert_eq!(buf, vec!['を']);

        let mut buf = Vec::new();
        table.apply(&mut buf, &InputPiece::Character('0'));
        assert_eq!(buf, vec!['0']);
    }

    #[test]
    fn test_derived_data() {
        let table = InputTable::from_strings([("ka", "か"), ("ki", "き"), ("kya", "きゃ")]);
        assert_eq!(table.max_key_count(), 3);
        assert!(table.is_unstable_suffix(&['k']));
        assert!(table.is_unstable_suffix(&['k', 'y']));
        assert_eq!(table.max_unstable_suffix_length(), 3);
        let mut nexts = table.possible_nexts("k").to_vec();
        nexts.sort();
        assert_eq!(nexts, vec!["カ", "キ", "キャ"]);
        assert!(table.possible_nexts("x").is_empty());
    }

    #[test]
    fn test_merged_last_wins() {
        let a = InputTable::from_strings([("a", "あ"), ("i", "い")]);
        let b = InputTable::from_strings([("a", "ア")]);
        let merged = InputTable::merged([&a, &b]);
        assert_eq!(feed(&merged, "ai"), "アい");
    }
}
