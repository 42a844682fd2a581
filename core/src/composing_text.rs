//! The composing buffer: raw keystrokes plus the kana derived from them.
//!
//! Public API:
//! - `ComposingText` - keystrokes (`input`), derived kana (`convert_target`)
//!   and a cursor counted in kana characters
//! - `DifferenceSuffix` - how far two buffers share a prefix
//!
//! The derived kana is always the left-to-right transliteration of `input`.
//! When the cursor lands inside a span whose kana depends on several
//! keystrokes (for example inside `ふぁ` typed as `fa`), that span is frozen
//! into direct characters so the position becomes addressable.
use crate::input_piece::{InputElement, InputPiece, InputStyle};
use crate::input_style_manager::InputStyleManager;
use crate::input_table::InputTable;
use crate::candidate::ComposingCount;
use std::collections::HashMap;
use std::sync::Arc;

/// A run of derived kana produced under one input style.
#[derive(Debug, Clone)]
pub struct ConvertTargetElement {
    pub string: Vec<char>,
    pub style: InputStyle,
    pub table: Option<Arc<InputTable>>,
}

impl PartialEq for ConvertTargetElement {
    fn eq(&self, other: &Self) -> bool {
        self.style == other.style && self.string == other.string
    }
}

/// Result of [`ComposingText::difference_suffix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DifferenceSuffix {
    pub deleted_input: usize,
    pub added_input: usize,
    pub deleted_surface: usize,
    pub added_surface: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IndexPair {
    input: usize,
    surface: usize,
}

/// Editable composing buffer.
///
/// # Example
/// ```
/// use kanakanji_core::composing_text::ComposingText;
/// use kanakanji_core::input_piece::InputStyle;
///
/// let mut c = ComposingText::new();
/// c.insert_at_cursor_position("kanto", InputStyle::Roman2Kana);
/// assert_eq!(c.convert_target(), "かんと");
/// assert_eq!(c.cursor(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposingText {
    cursor: usize,
    input: Vec<InputElement>,
    convert_target: String,
}

impl ComposingText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a buffer from keystrokes with the cursor at the end.
    pub fn from_input(input: Vec<InputElement>) -> Self {
        let convert_target = Self::convert_target_for(&input);
        let cursor = convert_target.chars().count();
        Self {
            cursor,
            input,
            convert_target,
        }
    }

    pub fn input(&self) -> &[InputElement] {
        &self.input
    }

    pub fn convert_target(&self) -> &str {
        &self.convert_target
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn surface_len(&self) -> usize {
        self.convert_target.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.convert_target.is_empty()
    }

    pub fn is_at_end_index(&self) -> bool {
        self.cursor == self.surface_len()
    }

    pub fn is_at_start_index(&self) -> bool {
        self.cursor == 0
    }

    pub fn convert_target_before_cursor(&self) -> String {
        self.convert_target.chars().take(self.cursor).collect()
    }

    /// Boundaries between spans that can be edited without affecting each
    /// other, as (input index, surface index) pairs.
    fn independent_segment_boundaries(&self) -> Vec<IndexPair> {
        let mut boundaries = vec![IndexPair {
            input: 0,
            surface: 0,
        }];
        let mut converting: Vec<ConvertTargetElement> = Vec::new();
        let mut converted_len = 0usize;
        for (i, element) in self.input.iter().enumerate() {
            let deleted = Self::update_convert_target_elements(&mut converting, element);
            let previous_len = converted_len;
            converted_len = converting.iter().map(|e| e.string.len()).sum();
            // Drop boundaries inside the tail the new keystroke rewrote.
            while let Some(last) = boundaries.pop() {
                if last.surface + deleted <= previous_len {
                    boundaries.push(last);
                    break;
                }
            }
            boundaries.push(IndexPair {
                input: i + 1,
                surface: converted_len,
            });
        }
        boundaries
    }

    /// Input index corresponding to a surface index, freezing the segment
    /// that contains it when the position falls inside a dependent span.
    fn force_input_cursor_position(&mut self, target: usize) -> usize {
        let surface_len = self.surface_len();
        if target == 0 {
            return 0;
        } else if target >= surface_len {
            return self.input.len();
        }

        let mut boundaries = self.independent_segment_boundaries();
        let mut segment_end = IndexPair {
            input: self.input.len(),
            surface: surface_len,
        };
        let mut segment_start = IndexPair {
            input: 0,
            surface: 0,
        };
        while let Some(start) = boundaries.pop() {
            if start.surface == target {
                return start.input;
            } else if start.surface < target {
                segment_start = start;
                break;
            }
            if start.surface < segment_end.surface {
                segment_end = start;
            }
        }

        let frozen: Vec<InputElement> = self
            .convert_target
            .chars()
            .skip(segment_start.surface)
            .take(segment_end.surface - segment_start.surface)
            .map(|c| InputElement::character(c, InputStyle::FROZEN))
            .collect();
        self.input
            .splice(segment_start.input..segment_end.input, frozen);
        target - segment_start.surface + segment_start.input
    }

    /// Insert characters typed in `style` at the cursor.
    pub fn insert_at_cursor_position(&mut self, text: &str, style: InputStyle) {
        let elements = text
            .chars()
            .map(|c| InputElement::character(c, style.clone()))
            .collect();
        self.insert_elements_at_cursor_position(elements);
    }

    /// Insert keystrokes at the cursor.
    pub fn insert_elements_at_cursor_position(&mut self, mut elements: Vec<InputElement>) {
        if elements.is_empty() {
            return;
        }
        let mut input_cursor = self.force_input_cursor_position(self.cursor);
        // Block rules from reaching across into the text right of the cursor.
        if !self.is_at_end_index() {
            elements.push(InputElement::frozen_separator());
        }
        if input_cursor > 0 && self.input[input_cursor - 1].is_frozen_separator() {
            self.input.remove(input_cursor - 1);
            input_cursor -= 1;
        }

        let inserted = elements.len();
        self.input.splice(input_cursor..input_cursor, elements);

        let old_prefix: Vec<char> = self.convert_target.chars().take(self.cursor).collect();
        let new_prefix: Vec<char> =
            Self::convert_target_for(&self.input[..input_cursor + inserted])
                .chars()
                .collect();
        let common = common_prefix_len(&old_prefix, &new_prefix);
        let deleted = old_prefix.len() - common;
        let added = new_prefix.len() - common;

        let suffix: String = self.convert_target.chars().skip(self.cursor).collect();
        let mut target: String = new_prefix.into_iter().collect();
        target.push_str(&suffix);
        self.convert_target = target;
        self.cursor = self.cursor - deleted + added;
    }

    /// Delete up to `count` characters after the cursor.
    pub fn delete_forward_from_cursor_position(&mut self, count: usize) {
        let count = count.min(self.surface_len() - self.cursor);
        if count == 0 {
            return;
        }
        self.cursor += count;
        self.delete_backward_from_cursor_position(count);
    }

    /// Delete up to `count` characters before the cursor.
    pub fn delete_backward_from_cursor_position(&mut self, count: usize) {
        let count = count.min(self.cursor);
        if count == 0 {
            return;
        }
        // Order matters: freezing for the target may shift the current index.
        let mut target = self.force_input_cursor_position(self.cursor - count);
        let mut current = self.force_input_cursor_position(self.cursor);

        if target > 0 && target - 1 < self.input.len() && self.input[target - 1].is_frozen_separator()
        {
            self.input.remove(target - 1);
            target -= 1;
            current -= 1;
        }

        if target == 0 || current == self.input.len() {
            self.input.drain(target..current);
        } else {
            self.input
                .splice(target..current, [InputElement::frozen_separator()]);
        }
        self.cursor -= count;
        self.convert_target = Self::convert_target_for(&self.input);
    }

    /// Move the cursor by `count` (negative is left), clamped to the buffer.
    /// Returns the distance actually moved.
    pub fn move_cursor_from_cursor_position(&mut self, count: isize) -> isize {
        let max_right = (self.surface_len() - self.cursor) as isize;
        let max_left = -(self.cursor as isize);
        let count = count.min(max_right).max(max_left);
        self.cursor = (self.cursor as isize + count) as usize;
        count
    }

    /// Remove an accepted prefix. A cursor left at 0 jumps to the end.
    pub fn prefix_complete(&mut self, count: &ComposingCount) {
        match count {
            ComposingCount::InputCount(n) => {
                let n = (*n).min(self.input.len());
                self.input.drain(..n);
                let new_target = Self::convert_target_for(&self.input);
                let delta = self.surface_len() - new_target.chars().count();
                self.convert_target = new_target;
                self.cursor = self.cursor.saturating_sub(delta);
                if self.cursor == 0 {
                    self.cursor = self.surface_len();
                }
            }
            ComposingCount::SurfaceCount(n) => {
                let index = self.force_input_cursor_position(*n);
                self.input.drain(..index);
                self.convert_target = self.convert_target.chars().skip(*n).collect();
                self.cursor = self.cursor.saturating_sub(*n);
                if self.cursor == 0 {
                    self.cursor = self.surface_len();
                }
            }
            ComposingCount::Composite(lhs, rhs) => {
                self.prefix_complete(lhs);
                self.prefix_complete(rhs);
            }
        }
    }

    /// A copy truncated at the cursor.
    pub fn prefix_to_cursor_position(&self) -> ComposingText {
        let mut text = self.clone();
        let index = text.force_input_cursor_position(text.cursor);
        text.input.truncate(index);
        text.convert_target = text.convert_target.chars().take(text.cursor).collect();
        text
    }

    /// Map from input index to surface index at every independent boundary.
    pub fn input_index_to_surface_index_map(&self) -> HashMap<usize, usize> {
        self.independent_segment_boundaries()
            .into_iter()
            .map(|p| (p.input, p.surface))
            .collect()
    }

    /// Clear the buffer.
    pub fn stop_composition(&mut self) {
        self.input.clear();
        self.convert_target.clear();
        self.cursor = 0;
    }

    /// Shared-prefix difference against a previous buffer.
    pub fn difference_suffix(&self, previous: &ComposingText) -> DifferenceSuffix {
        let common = common_prefix_len(&self.input, &previous.input);
        let current_surface: Vec<char> = self.convert_target.chars().collect();
        let previous_surface: Vec<char> = previous.convert_target.chars().collect();
        let common_surface = common_prefix_len(&current_surface, &previous_surface);
        DifferenceSuffix {
            deleted_input: previous.input.len() - common,
            added_input: self.input.len() - common,
            deleted_surface: previous_surface.len() - common_surface,
            added_surface: current_surface.len() - common_surface,
        }
    }

    /// Whether this buffer's keystrokes end with all of `suffix`'s keystrokes.
    pub fn input_has_suffix(&self, suffix: &ComposingText) -> bool {
        self.input.ends_with(&suffix.input)
    }

    /// Transliterate a keystroke sequence.
    pub fn convert_target_for(elements: &[InputElement]) -> String {
        let mut converting: Vec<ConvertTargetElement> = Vec::new();
        for element in elements {
            Self::update_convert_target_elements(&mut converting, element);
        }
        converting
            .iter()
            .flat_map(|e| e.string.iter())
            .collect()
    }

    fn table_for(style: &InputStyle) -> Option<Arc<InputTable>> {
        match style {
            InputStyle::Direct => None,
            InputStyle::Roman2Kana => Some(InputStyleManager::table(
                &crate::input_piece::InputTableId::DefaultRomanToKana,
            )),
            InputStyle::Mapped(id) => Some(InputStyleManager::table(id)),
        }
    }

    /// Feed one keystroke into the per-style runs. Returns how many trailing
    /// characters of the last run were rewritten.
    pub fn update_convert_target_elements(
        elements: &mut Vec<ConvertTargetElement>,
        new_element: &InputElement,
    ) -> usize {
        if let Some(last) = elements.last_mut() {
            if last.style == new_element.style {
                return match &last.table {
                    Some(table) => table.apply(&mut last.string, &new_element.piece),
                    None => {
                        if let Some(c) = new_element.piece.raw_char() {
                            last.string.push(c);
                        }
                        0
                    }
                };
            }
        } else if new_element.piece == InputPiece::CompositionSeparator {
            return 0;
        }

        let table = Self::table_for(&new_element.style);
        let mut string = Vec::new();
        match &table {
            Some(t) => {
                t.apply(&mut string, &new_element.piece);
            }
            None => {
                if let Some(c) = new_element.piece.raw_char() {
                    string.push(c);
                }
            }
        }
        elements.push(ConvertTargetElement {
            string,
            style: new_element.style.clone(),
            table,
        });
        0
    }
}

fn common_prefix_len<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input_piece::InputTableId;

    fn roman(s: &str) -> ComposingText {
        let mut c = ComposingText::new();
        for ch in s.chars() {
            c.insert_at_cursor_position(&ch.to_string(), InputStyle::Roman2Kana);
        }
        c
    }

    fn r(c: char) -> InputElement {
        InputElement::character(c, InputStyle::Roman2Kana)
    }

    fn frozen(c: char) -> InputElement {
        InputElement::character(c, InputStyle::FROZEN)
    }

    #[test]
    fn test_insert_direct_and_roman() {
        let mut c = ComposingText::new();
        c.insert_at_cursor_position("あ", InputStyle::Direct);
        assert_eq!(c.convert_target(), "あ");
        assert_eq!(c.cursor(), 1);

        let mut c = ComposingText::new();
        c.insert_at_cursor_position("akafa", InputStyle::Roman2Kana);
        assert_eq!(c.convert_target(), "あかふぁ");
        assert_eq!(c.cursor(), 4);

        let mut c = ComposingText::new();
        c.insert_at_cursor_position("a", InputStyle::Direct);
        c.insert_at_cursor_position("ki", InputStyle::Roman2Kana);
        assert_eq!(c.convert_target(), "aき");
    }

    #[test]
    fn test_kanto_trailing_n_resolves() {
        let c = roman("kanto");
        assert_eq!(c.convert_target(), "かんと");
        assert_eq!(c.cursor(), 3);
        assert!(c.is_at_end_index());
    }

    #[test]
    fn test_insert_mid_buffer_adds_frozen_separator() {
        let mut c = roman("nana");
        assert_eq!(c.move_cursor_from_cursor_position(-1), -1);
        c.insert_at_cursor_position("n", InputStyle::Roman2Kana);
        assert_eq!(c.convert_target(), "なnな");
        assert_eq!(c.cursor(), 2);
        c.move_cursor_from_cursor_position(1);
        assert_eq!(
            c.input(),
            &[
                r('n'),
                r('a'),
                r('n'),
                InputElement::frozen_separator(),
                r('n'),
                r('a')
            ]
        );
        assert_eq!(c.cursor(), 3);
    }

    #[test]
    fn test_separators_never_double() {
        let mut c = roman("nana");
        c.move_cursor_from_cursor_position(-1);
        c.insert_at_cursor_position("k", InputStyle::Roman2Kana);
        assert_eq!(c.convert_target(), "なkな");
        c.insert_at_cursor_position("a", InputStyle::Roman2Kana);
        assert_eq!(c.convert_target(), "なかな");
        assert_eq!(
            c.input(),
            &[
                r('n'),
                r('a'),
                r('k'),
                r('a'),
                InputElement::frozen_separator(),
                r('n'),
                r('a')
            ]
        );
        assert_eq!(c.cursor(), 2);
    }

    #[test]
    fn test_no_rule_across_separator() {
        let mut c = roman("y");
        c.move_cursor_from_cursor_position(-1);
        c.insert_at_cursor_position("k", InputStyle::Roman2Kana);
        c.move_cursor_from_cursor_position(2);
        c.insert_at_cursor_position("a", InputStyle::Roman2Kana);
        assert_eq!(c.convert_target(), "kや");
        assert_eq!(c.cursor(), 2);
    }

    #[test]
    fn test_delete_forward_freezes_dependent_span() {
        let mut c = ComposingText::new();
        c.insert_at_cursor_position("akafa", InputStyle::Roman2Kana);
        c.move_cursor_from_cursor_position(-1);
        c.delete_forward_from_cursor_position(1);
        assert_eq!(c.input(), &[r('a'), r('k'), r('a'), frozen('ふ')]);
        assert_eq!(c.convert_target(), "あかふ");
        assert_eq!(c.cursor(), 3);
    }

    #[test]
    fn test_delete_forward_direct_inserts_separator() {
        let mut c = ComposingText::new();
        c.insert_at_cursor_position("あいうえお", InputStyle::Direct);
        c.move_cursor_from_cursor_position(-3);
        c.delete_forward_from_cursor_position(1);
        let d = |ch| InputElement::character(ch, InputStyle::Direct);
        assert_eq!(
            c.input(),
            &[
                d('あ'),
                d('い'),
                InputElement::frozen_separator(),
                d('え'),
                d('お')
            ]
        );
        assert_eq!(c.convert_target(), "あいえお");
        assert_eq!(c.cursor(), 2);
    }

    #[test]
    fn test_delete_forward_twice_keeps_single_separator() {
        let mut c = roman("huransu");
        assert_eq!(c.convert_target(), "ふらんす");
        c.move_cursor_from_cursor_position(-3);
        c.delete_forward_from_cursor_position(1);
        assert_eq!(c.convert_target(), "ふんす");
        assert_eq!(
            c.input(),
            &[
                r('h'),
                r('u'),
                InputElement::frozen_separator(),
                r('n'),
                r('s'),
                r('u')
            ]
        );
        c.delete_forward_from_cursor_position(1);
        assert_eq!(c.convert_target(), "ふす");
        assert_eq!(
            c.input(),
            &[r('h'), r('u'), InputElement::frozen_separator(), frozen('す')]
        );
        assert_eq!(c.cursor(), 1);
    }

    #[test]
    fn test_delete_backward() {
        let mut c = roman("kansha");
        assert_eq!(c.convert_target(), "かんしゃ");
        c.delete_backward_from_cursor_position(1);
        assert_eq!(c.convert_target(), "かんし");
        assert_eq!(c.cursor(), 3);
        c.delete_backward_from_cursor_position(10);
        assert!(c.is_empty());
        assert!(c.input().is_empty());
        // deleting from an empty buffer is a no-op
        c.delete_backward_from_cursor_position(1);
        assert_eq!(c, ComposingText::new());
    }

    #[test]
    fn test_move_cursor_clamps() {
        let mut c = roman("aiu");
        assert_eq!(c.move_cursor_from_cursor_position(5), 0);
        assert_eq!(c.move_cursor_from_cursor_position(-5), -3);
        assert!(c.is_at_start_index());
        assert_eq!(c.move_cursor_from_cursor_position(2), 2);
        assert_eq!(c.convert_target_before_cursor(), "あい");
    }

    #[test]
    fn test_difference_suffix() {
        let c1 = roman("hasir");
        let c2 = roman("hasiru");
        let diff = c2.difference_suffix(&c1);
        assert_eq!(diff.deleted_input, 0);
        assert_eq!(diff.added_input, 1);

        let c1 = roman("tukatt");
        let c2 = roman("tukatte");
        let diff = c2.difference_suffix(&c1);
        assert_eq!((diff.deleted_input, diff.added_input), (0, 1));

        let c1 = roman("hasiru");
        let c2 = roman("hasiruno");
        let diff = c2.difference_suffix(&c1);
        assert_eq!(diff.deleted_input, 0);
        assert_eq!(diff.added_input, 2);
        assert_eq!(diff.deleted_surface, 0);
        assert_eq!(diff.added_surface, 1);
    }

    #[test]
    fn test_index_map() {
        let c = roman("kyouhaiitenkida");
        let map = c.input_index_to_surface_index_map();
        assert_eq!(map.get(&0), Some(&0));
        assert_eq!(map.get(&1), None);
        assert_eq!(map.get(&2), None);
        assert_eq!(map.get(&3), Some(&2));
        assert_eq!(map.get(&4), Some(&3));
        assert_eq!(map.get(&6), Some(&4));
        assert_eq!(map.get(&11), None);
        assert_eq!(map.get(&12), None);
        assert_eq!(map.get(&13), Some(&9));
        assert_eq!(map.get(&15), Some(&10));

        let mut c = roman("aka");
        c.insert_elements_at_cursor_position(vec![InputElement::separator(
            InputStyle::Roman2Kana,
        )]);
        let map = c.input_index_to_surface_index_map();
        assert_eq!(map.get(&1), Some(&1));
        assert_eq!(map.get(&2), None);
        assert_eq!(map.get(&3), Some(&2));
        assert_eq!(map.get(&4), Some(&2));
    }

    #[test]
    fn test_prefix_complete_surface_and_input() {
        let mut c = roman("kyouha");
        c.prefix_complete(&ComposingCount::SurfaceCount(3));
        assert_eq!(c.convert_target(), "は");
        assert_eq!(c.input(), &[r('h'), r('a')]);
        assert_eq!(c.cursor(), 1);

        let mut c = roman("kyouha");
        c.prefix_complete(&ComposingCount::InputCount(4));
        assert_eq!(c.convert_target(), "は");
        assert_eq!(c.cursor(), 1);

        let mut c = roman("kyouha");
        c.prefix_complete(&ComposingCount::composite(
            ComposingCount::InputCount(3),
            ComposingCount::SurfaceCount(1),
        ));
        assert_eq!(c.convert_target(), "は");
    }

    #[test]
    fn test_prefix_complete_then_retype_matches_fresh_buffer() {
        let mut c = roman("kyouhaii");
        c.prefix_complete(&ComposingCount::SurfaceCount(3));
        assert_eq!(c, roman("haii"));
    }

    #[test]
    fn test_prefix_to_cursor_position() {
        let mut c = roman("akafa");
        c.move_cursor_from_cursor_position(-1);
        let prefix = c.prefix_to_cursor_position();
        assert_eq!(prefix.convert_target(), "あかふ");
        assert_eq!(prefix.cursor(), 3);
        // the original is untouched
        assert_eq!(c.convert_target(), "あかふぁ");
    }

    #[test]
    fn test_custom_table_delete_forward() {
        let mut mapping = std::collections::BTreeMap::new();
        use crate::input_table::{KeyElement, ValueElement};
        let key = |s: &str| -> Vec<KeyElement> {
            s.chars()
                .map(|c| KeyElement::Piece(InputPiece::Character(c)))
                .collect()
        };
        let value = |s: &str| -> Vec<ValueElement> { s.chars().map(ValueElement::Character).collect() };
        mapping.insert(key("o"), value("おは"));
        mapping.insert(key("おはy"), value("おはよう"));
        InputStyleManager::register("composing-denowb", InputTable::new(mapping));
        let style = InputStyle::Mapped(InputTableId::Named("composing-denowb".into()));

        let mut c = ComposingText::new();
        c.insert_at_cursor_position("o", style.clone());
        c.insert_at_cursor_position("y", style);
        assert_eq!(c.convert_target(), "おはよう");
        c.move_cursor_from_cursor_position(-3);
        c.delete_forward_from_cursor_position(1);
        assert_eq!(
            c.input(),
            &[
                frozen('お'),
                InputElement::frozen_separator(),
                frozen('よ'),
                frozen('う')
            ]
        );
        assert_eq!(c.convert_target(), "およう");
        assert_eq!(c.cursor(), 1);
    }

    #[test]
    fn test_empty_edits_change_nothing() {
        // cursor inside the pending "ky" run
        let mut c = roman("kaky");
        assert_eq!(c.convert_target(), "かky");
        c.move_cursor_from_cursor_position(-1);
        let before = c.clone();
        c.insert_at_cursor_position("", InputStyle::Roman2Kana);
        assert_eq!(c, before);
        c.delete_backward_from_cursor_position(0);
        assert_eq!(c, before);
        c.delete_forward_from_cursor_position(0);
        assert_eq!(c, before);
    }

    /// xorshift64; keeps the random edit test reproducible.
    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self, bound: usize) -> usize {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            (self.0 % bound as u64) as usize
        }
    }

    #[test]
    fn test_random_edits_match_fresh_transliteration() {
        const KEYS: [char; 14] = ['k', 'a', 'n', 't', 'o', 's', 'i', 'u', 'x', 'y', 'f', '-', 'n', 'e'];
        let mut rng = XorShift(0x9e37_79b9_7f4a_7c15);
        for round in 0..300 {
            let mut c = ComposingText::new();
            for _ in 0..24 {
                match rng.next(6) {
                    0 | 1 => {
                        let key = KEYS[rng.next(KEYS.len())];
                        c.insert_at_cursor_position(&key.to_string(), InputStyle::Roman2Kana);
                    }
                    2 => c.insert_at_cursor_position("あ", InputStyle::Direct),
                    3 => c.delete_backward_from_cursor_position(rng.next(3)),
                    4 => c.delete_forward_from_cursor_position(rng.next(3)),
                    _ => {
                        c.move_cursor_from_cursor_position(rng.next(7) as isize - 3);
                    }
                }
                assert_eq!(
                    c.convert_target(),
                    ComposingText::convert_target_for(c.input()),
                    "round {}",
                    round
                );
                assert!(c.cursor() <= c.surface_len(), "round {}", round);
            }
        }
    }

    #[test]
    fn test_stop_composition() {
        let mut c = roman("kanji");
        c.stop_composition();
        assert!(c.is_empty());
        assert_eq!(c.cursor(), 0);
        assert!(c.input().is_empty());
    }
}
