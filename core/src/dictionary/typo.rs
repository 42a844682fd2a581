//! Candidate readings for a lookup: the literal kana and typo-corrected
//! variants of the keystrokes.
//!
//! [`TypoCorrectionGenerator`] walks substitutions depth first with an
//! explicit stack. Every frame holds the kana derived so far, how many
//! keystrokes it consumed and the accumulated penalty. Dictionary walks
//! prune it through [`TypoCorrectionGenerator::set_unreachable_path`].
use crate::composing_text::{ComposingText, ConvertTargetElement};
use crate::input_piece::{InputElement, InputPiece, InputStyle, InputTableId};
use crate::lattice::LatticeIndex;
use crate::utils;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::ops::Range;

/// Three default-weight corrections.
pub const MAX_PENALTY: f32 = 3.5 * 3.0;

/// Readings are produced for end positions in `right_range` of a span
/// starting at `left`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRange {
    pub left: usize,
    pub right_range: Range<usize>,
}

/// A reading with the buffer position it ends at and its typo penalty.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub chars: Vec<char>,
    pub end: LatticeIndex,
    pub penalty: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct TypoCandidate {
    elements: Vec<InputElement>,
    weight: f32,
}

fn candidates(table: &[(&str, &[(&str, f32)])], style: InputStyle) -> HashMap<String, Vec<TypoCandidate>> {
    table
        .iter()
        .map(|(key, values)| {
            let list = values
                .iter()
                .map(|(value, weight)| TypoCandidate {
                    elements: value
                        .chars()
                        .map(|c| InputElement::character(c, style.clone()))
                        .collect(),
                    weight: *weight,
                })
                .collect();
            (key.to_string(), list)
        })
        .collect()
}

/// Voicing, semi-voicing and small kana confusions of direct kana input.
static DIRECT_TYPOS: Lazy<HashMap<String, Vec<TypoCandidate>>> = Lazy::new(|| {
    candidates(
        &[
            ("カ", &[("ガ", 7.0)]),
            ("キ", &[("ギ", 3.5)]),
            ("ク", &[("グ", 3.5)]),
            ("ケ", &[("ゲ", 3.5)]),
            ("コ", &[("ゴ", 3.5)]),
            ("サ", &[("ザ", 3.5)]),
            ("シ", &[("ジ", 3.5)]),
            ("ス", &[("ズ", 3.5)]),
            ("セ", &[("ゼ", 3.5)]),
            ("ソ", &[("ゾ", 3.5)]),
            ("タ", &[("ダ", 6.0)]),
            ("チ", &[("ヂ", 3.5)]),
            ("ツ", &[("ッ", 6.0), ("ヅ", 4.5)]),
            ("テ", &[("デ", 6.0)]),
            ("ト", &[("ド", 4.5)]),
            ("ハ", &[("バ", 4.5), ("パ", 6.0)]),
            ("ヒ", &[("ビ", 4.5), ("ピ", 4.5)]),
            ("フ", &[("ブ", 4.5), ("プ", 4.5)]),
            ("ヘ", &[("ベ", 4.5), ("ペ", 4.5)]),
            ("ホ", &[("ボ", 4.5), ("ポ", 4.5)]),
            ("バ", &[("パ", 3.5)]),
            ("ビ", &[("ピ", 3.5)]),
            ("ブ", &[("プ", 3.5)]),
            ("ベ", &[("ペ", 3.5)]),
            ("ボ", &[("ポ", 3.5)]),
            ("ヤ", &[("ャ", 3.5)]),
            ("ユ", &[("ュ", 3.5)]),
            ("ヨ", &[("ョ", 3.5)]),
        ],
        InputStyle::Direct,
    )
});

/// Neighbouring-key slips on a QWERTY romaji layout.
static ROMAN2KANA_TYPOS: Lazy<HashMap<String, Vec<TypoCandidate>>> = Lazy::new(|| {
    candidates(
        &[
            ("bs", &[("ba", 3.5)]),
            ("no", &[("bo", 3.5)]),
            ("li", &[("ki", 3.5)]),
            ("lo", &[("ko", 3.5)]),
            ("lu", &[("ku", 3.5)]),
            ("my", &[("mu", 3.5)]),
            ("tp", &[("to", 3.5)]),
            ("ts", &[("ta", 3.5)]),
            ("wi", &[("wo", 3.5)]),
            ("pu", &[("ou", 3.5)]),
        ],
        InputStyle::Roman2Kana,
    )
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StyleMix {
    None,
    OnlyDirect,
    OnlyRoman2Kana,
    Other,
}

fn piece_char(piece: &InputPiece) -> Option<char> {
    match piece {
        InputPiece::Character(c) => Some(utils::to_katakana_char(*c)),
        InputPiece::Key {
            intention, input, ..
        } => Some(utils::to_katakana_char(intention.unwrap_or(*input))),
        InputPiece::CompositionSeparator => None,
    }
}

/// Substitutions for a run of one or two keystrokes, identity included.
fn typos(elements: &[InputElement]) -> Vec<TypoCandidate> {
    if elements.is_empty() {
        return Vec::new();
    }
    let mix = elements.iter().fold(StyleMix::None, |mix, e| {
        let roman = matches!(
            e.style,
            InputStyle::Roman2Kana | InputStyle::Mapped(InputTableId::DefaultRomanToKana)
        );
        match (mix, &e.style) {
            (StyleMix::Other, _) => StyleMix::Other,
            (StyleMix::None | StyleMix::OnlyDirect, InputStyle::Direct) => StyleMix::OnlyDirect,
            (StyleMix::None | StyleMix::OnlyRoman2Kana, _) if roman => StyleMix::OnlyRoman2Kana,
            _ => StyleMix::Other,
        }
    });
    let key: String = elements.iter().filter_map(|e| piece_char(&e.piece)).collect();
    let (table, style) = match mix {
        StyleMix::OnlyDirect => (&*DIRECT_TYPOS, InputStyle::Direct),
        StyleMix::OnlyRoman2Kana => (&*ROMAN2KANA_TYPOS, InputStyle::Roman2Kana),
        StyleMix::None | StyleMix::Other => {
            return if elements.len() == 1 {
                vec![TypoCandidate {
                    elements: elements.to_vec(),
                    weight: 0.0,
                }]
            } else {
                Vec::new()
            };
        }
    };
    let mut result = table.get(&key).cloned().unwrap_or_default();
    if key.chars().count() == 1 {
        result.push(TypoCandidate {
            elements: key
                .chars()
                .map(|c| InputElement::character(c, style.clone()))
                .collect(),
            weight: 0.0,
        });
    }
    result
}

/// `left` is a prefix of `right`: identical runs, except the last run of
/// `left` may be a prefix of the corresponding run of `right`.
fn is_prefix_of(left: &[ConvertTargetElement], right: &[ConvertTargetElement]) -> bool {
    if left.len() > right.len() {
        return false;
    }
    if left.len() < right.len() {
        return left.iter().zip(right).all(|(l, r)| l == r);
    }
    let Some(last) = left.len().checked_sub(1) else {
        return true;
    };
    if left[..last].iter().zip(&right[..last]).any(|(l, r)| l != r) {
        return false;
    }
    left[last].style == right[last].style && right[last].string.starts_with(&left[last].string)
}

fn kana_of(elements: &[ConvertTargetElement]) -> String {
    elements.iter().flat_map(|e| e.string.iter()).collect()
}

/// Characters of `element` that no later keystroke can rewrite.
fn stable_count(element: &ConvertTargetElement) -> usize {
    let s = &element.string;
    let Some(table) = &element.table else {
        return s.len();
    };
    let max_len = table.max_unstable_suffix_length().min(s.len());
    let unstable = (1..=max_len)
        .rev()
        .find(|n| table.is_unstable_suffix(&s[s.len() - n..]))
        .unwrap_or(0);
    s.len() - unstable
}

struct Frame {
    elements: Vec<ConvertTargetElement>,
    count: usize,
    penalty: f32,
}

pub struct TypoCorrectionGenerator {
    inputs: Vec<InputElement>,
    range: ProcessRange,
    nodes: Vec<Vec<TypoCandidate>>,
    stack: Vec<Frame>,
}

impl TypoCorrectionGenerator {
    pub fn new(inputs: &[InputElement], range: ProcessRange) -> Self {
        let count = range.right_range.end.saturating_sub(range.left);
        let nodes: Vec<Vec<TypoCandidate>> = (0..count)
            .map(|i| {
                (0..2)
                    .filter(|k| i + k < count)
                    .flat_map(|k| {
                        let from = range.left + i;
                        let to = (range.left + i + k + 1).min(inputs.len());
                        typos(inputs.get(from..to).unwrap_or_default())
                    })
                    .collect()
            })
            .collect();

        let mut left_elements = Vec::new();
        for element in inputs.iter().take(range.left) {
            ComposingText::update_convert_target_elements(&mut left_elements, element);
        }
        let left_kana = kana_of(&left_elements);
        let stack = nodes
            .first()
            .map(|first| {
                first
                    .iter()
                    .filter_map(|candidate| {
                        let mut elements = Vec::new();
                        let mut full = left_elements.clone();
                        for e in &candidate.elements {
                            ComposingText::update_convert_target_elements(&mut elements, e);
                            ComposingText::update_convert_target_elements(&mut full, e);
                        }
                        // a substitution must not rewrite the kana left of the span
                        if kana_of(&full) == format!("{}{}", left_kana, kana_of(&elements)) {
                            Some(Frame {
                                elements,
                                count: candidate.elements.len(),
                                penalty: candidate.weight,
                            })
                        } else {
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            inputs: inputs.to_vec(),
            range,
            nodes,
            stack,
        }
    }

    /// Drop every pending frame whose settled kana already starts with
    /// `target`, a reading the dictionaries cannot extend.
    pub fn set_unreachable_path(&mut self, target: &[char]) {
        if target.is_empty() {
            return;
        }
        self.stack.retain(|frame| {
            let mut matched = 0;
            for element in &frame.elements {
                let stable = stable_count(element);
                let need = stable.min(target.len() - matched);
                if need > 0 {
                    if element.string[..need] != target[matched..matched + need] {
                        return true;
                    }
                    matched += need;
                    if matched >= target.len() {
                        return false;
                    }
                }
                if stable < element.string.len() {
                    break;
                }
            }
            true
        });
    }

    pub fn next_reading(&mut self) -> Option<Reading> {
        while let Some(Frame {
            elements,
            count,
            penalty,
        }) = self.stack.pop()
        {
            let mut result = None;
            let end = self.range.left + count;
            if end >= 1 && self.range.right_range.contains(&(end - 1)) {
                let keep = match self.inputs.get(end) {
                    Some(next) => {
                        let mut extended = elements.clone();
                        ComposingText::update_convert_target_elements(&mut extended, next);
                        is_prefix_of(&elements, &extended)
                    }
                    None => true,
                };
                if keep {
                    result = Some(Reading {
                        chars: elements
                            .iter()
                            .flat_map(|e| e.string.iter().map(|c| utils::to_katakana_char(*c)))
                            .collect(),
                        end: LatticeIndex::Input(end - 1),
                        penalty,
                    });
                }
            }
            if count >= self.nodes.len() {
                match result {
                    Some(r) => return Some(r),
                    None => continue,
                }
            }
            if penalty >= MAX_PENALTY {
                if count + 1 <= self.nodes.len() {
                    if let Some(element) = self.inputs.get(self.range.left + count) {
                        let literal = match piece_char(&element.piece) {
                            Some(c) => InputElement::character(c, element.style.clone()),
                            None => element.clone(),
                        };
                        let mut elements = elements;
                        ComposingText::update_convert_target_elements(&mut elements, &literal);
                        self.stack.push(Frame {
                            elements,
                            count: count + 1,
                            penalty,
                        });
                    }
                }
            } else {
                for node in &self.nodes[count] {
                    if count + node.elements.len() > self.nodes.len() {
                        continue;
                    }
                    let mut extended = elements.clone();
                    for e in &node.elements {
                        ComposingText::update_convert_target_elements(&mut extended, e);
                    }
                    self.stack.push(Frame {
                        elements: extended,
                        count: count + node.elements.len(),
                        penalty: penalty + node.weight,
                    });
                }
            }
            if result.is_some() {
                return result;
            }
        }
        None
    }
}

impl Iterator for TypoCorrectionGenerator {
    type Item = Reading;

    fn next(&mut self) -> Option<Reading> {
        self.next_reading()
    }
}

/// Literal prefixes of the derived kana.
pub struct SurfaceGenerator {
    surface: Vec<char>,
    range: ProcessRange,
    current: usize,
}

impl SurfaceGenerator {
    /// `surface` is the derived kana in katakana.
    pub fn new(surface: Vec<char>, range: ProcessRange) -> Self {
        let current = range.right_range.start;
        Self {
            surface,
            range,
            current,
        }
    }

    /// Stop producing readings longer than `target` once it is known to be
    /// a dead end.
    pub fn set_unreachable_path(&mut self, target: &[char]) {
        let suffix = self.surface.get(self.range.left..).unwrap_or_default();
        if suffix.starts_with(target) {
            let bound = self.range.left + target.len();
            let Range { start, end } = self.range.right_range;
            self.range.right_range = start.min(bound)..end.min(bound);
        }
    }
}

impl Iterator for SurfaceGenerator {
    type Item = Reading;

    fn next(&mut self) -> Option<Reading> {
        let i = self.current;
        if i < self.surface.len() && i < self.range.right_range.end && self.range.left <= i {
            self.current += 1;
            return Some(Reading {
                chars: self.surface[self.range.left..=i].to_vec(),
                end: LatticeIndex::Surface(i),
                penalty: 0.0,
            });
        }
        None
    }
}

/// Surface readings first, then typo-corrected ones.
#[derive(Default)]
pub struct ReadingGenerator {
    surface: Option<SurfaceGenerator>,
    typo: Option<TypoCorrectionGenerator>,
}

impl ReadingGenerator {
    pub fn new(surface: Option<SurfaceGenerator>, typo: Option<TypoCorrectionGenerator>) -> Self {
        Self { surface, typo }
    }

    pub fn set_unreachable_path(&mut self, target: &[char]) {
        if let Some(typo) = &mut self.typo {
            typo.set_unreachable_path(target);
        }
        if let Some(surface) = &mut self.surface {
            surface.set_unreachable_path(target);
        }
    }
}

impl Iterator for ReadingGenerator {
    type Item = Reading;

    fn next(&mut self) -> Option<Reading> {
        if let Some(reading) = self.surface.as_mut().and_then(|g| g.next()) {
            return Some(reading);
        }
        self.typo.as_mut().and_then(|g| g.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct(text: &str) -> Vec<InputElement> {
        text.chars()
            .map(|c| InputElement::character(c, InputStyle::Direct))
            .collect()
    }

    fn roman(text: &str) -> Vec<InputElement> {
        text.chars()
            .map(|c| InputElement::character(c, InputStyle::Roman2Kana))
            .collect()
    }

    fn collect(mut g: TypoCorrectionGenerator) -> Vec<(String, f32)> {
        let mut out = Vec::new();
        while let Some(r) = g.next_reading() {
            out.push((r.chars.iter().collect(), r.penalty));
        }
        out
    }

    #[test]
    fn direct_input_yields_literal_and_voiced() {
        let inputs = direct("かき");
        let g = TypoCorrectionGenerator::new(&inputs, ProcessRange { left: 0, right_range: 1..2 });
        let readings = collect(g);
        assert!(readings.contains(&("カキ".to_string(), 0.0)));
        assert!(readings.contains(&("ガキ".to_string(), 7.0)));
        assert!(readings.contains(&("カギ".to_string(), 3.5)));
        assert!(readings.contains(&("ガギ".to_string(), 10.5)));
    }

    #[test]
    fn typo_penalty_lowers_scores_monotonically() {
        use crate::dicdata::{penalized, DicdataElement};
        use crate::word_class::{cid, mid};
        let noun = |word: &str, ruby: &str, value: f32| {
            DicdataElement::new(word, ruby, cid::GENERAL_NOUN, cid::GENERAL_NOUN, mid::GENERAL, value)
        };

        // exact matches pass through untouched and keep their order
        let exact = [noun("漢字", "カンジ", -5.0), noun("感じ", "カンジ", -6.0), noun("幹事", "カンジ", -8.0)];
        let kept: Vec<f32> = exact
            .iter()
            .filter_map(|e| penalized(e, 3, 0.0))
            .map(|e| e.value())
            .collect();
        assert_eq!(kept, vec![-5.0, -6.0, -8.0]);

        let word = noun("岩字", "ガンジ", -3.0);
        let values: Vec<f32> = [0.0, 3.5, 7.0, 10.5]
            .iter()
            .filter_map(|p| penalized(&word, 3, *p))
            .map(|e| e.value())
            .collect();
        assert_eq!(values.len(), 4);
        assert!(values.windows(2).all(|w| w[0] > w[1]));
        assert!((values[1] - -4.75).abs() < 1e-6);

        // the literal reading of every step comes with no penalty
        let g = TypoCorrectionGenerator::new(&direct("かんじ"), ProcessRange { left: 0, right_range: 2..3 });
        assert!(collect(g).contains(&("カンジ".to_string(), 0.0)));
    }

    #[test]
    fn end_positions_follow_right_range() {
        let inputs = direct("あい");
        let g = TypoCorrectionGenerator::new(&inputs, ProcessRange { left: 0, right_range: 0..2 });
        let readings: Vec<Reading> = g.collect();
        assert!(readings
            .iter()
            .any(|r| r.chars == vec!['ア'] && r.end == LatticeIndex::Input(0)));
        assert!(readings
            .iter()
            .any(|r| r.chars == vec!['ア', 'イ'] && r.end == LatticeIndex::Input(1)));
    }

    #[test]
    fn pending_romaji_is_not_a_reading() {
        // "k" alone would still change with the next keystroke
        let inputs = roman("ka");
        let g = TypoCorrectionGenerator::new(&inputs, ProcessRange { left: 0, right_range: 0..2 });
        let readings: Vec<String> = g.map(|r| r.chars.iter().collect()).collect();
        assert!(readings.contains(&"カ".to_string()));
        assert!(!readings.iter().any(|r| r == "k"));
    }

    #[test]
    fn roman_slip_is_corrected() {
        let inputs = roman("tp");
        let g = TypoCorrectionGenerator::new(&inputs, ProcessRange { left: 0, right_range: 1..2 });
        let readings = collect(g);
        assert!(readings.contains(&("ト".to_string(), 3.5)));
    }

    #[test]
    fn unreachable_prefix_prunes_frames() {
        let inputs = direct("かきく");
        let mut g = TypoCorrectionGenerator::new(&inputs, ProcessRange { left: 0, right_range: 2..3 });
        g.set_unreachable_path(&['ガ']);
        let readings = collect(g);
        assert!(readings.iter().all(|(r, _)| !r.starts_with('ガ')));
        assert!(readings.iter().any(|(r, _)| r == "カキク"));
    }

    #[test]
    fn surface_generator_shrinks_on_dead_end() {
        let surface: Vec<char> = "キョウハ".chars().collect();
        let mut g = SurfaceGenerator::new(surface, ProcessRange { left: 0, right_range: 0..4 });
        assert_eq!(g.next().map(|r| r.chars.len()), Some(1));
        g.set_unreachable_path(&['キ', 'ョ']);
        assert_eq!(g.next().map(|r| r.end), Some(LatticeIndex::Surface(1)));
        assert!(g.next().is_none());
    }

    #[test]
    fn unified_generator_prefers_surface() {
        let inputs = direct("あ");
        let surface = SurfaceGenerator::new(vec!['ア'], ProcessRange { left: 0, right_range: 0..1 });
        let typo = TypoCorrectionGenerator::new(&inputs, ProcessRange { left: 0, right_range: 0..1 });
        let mut g = ReadingGenerator::new(Some(surface), Some(typo));
        assert_eq!(g.next().map(|r| r.end), Some(LatticeIndex::Surface(0)));
        assert_eq!(g.next().map(|r| r.end), Some(LatticeIndex::Input(0)));
        assert!(g.next().is_none());
    }
}
