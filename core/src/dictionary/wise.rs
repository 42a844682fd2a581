//! Entries synthesized from the input itself: numbers, single kana,
//! English words and symbol variants.
use super::number::{japanese_number_dicdata, kansuji};
use crate::dicdata::DicdataElement;
use crate::options::KeyboardLanguage;
use crate::utils;
use crate::word_class::{cid, mid};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::ops::Range;

/// Full-width symbols and their half-width forms.
const WIDTH_PAIRS: &[(char, char)] = &[
    ('＋', '+'),
    ('ー', 'ｰ'),
    ('＊', '*'),
    ('＝', '='),
    ('・', '･'),
    ('！', '!'),
    ('＃', '#'),
    ('％', '%'),
    ('＆', '&'),
    ('＇', '\''),
    ('＂', '"'),
    ('｜', '|'),
    ('￡', '£'),
    ('＄', '$'),
    ('￥', '¥'),
    ('＠', '@'),
    ('｀', '`'),
    ('；', ';'),
    ('：', ':'),
    ('＜', '<'),
    ('＞', '>'),
    ('，', ','),
    ('．', '.'),
    ('＼', '\\'),
    ('／', '/'),
    ('＿', '_'),
    ('￣', '¯'),
    ('－', '-'),
];

fn to_halfwidth_symbol(c: char) -> Option<char> {
    WIDTH_PAIRS.iter().find(|(f, _)| *f == c).map(|(_, h)| *h)
}

fn to_fullwidth_symbol(c: char) -> Option<char> {
    WIDTH_PAIRS.iter().find(|(_, h)| *h == c).map(|(f, _)| *f)
}

/// Loosely related characters offered for each other. Earlier members
/// rank higher.
const WEAK_GROUPS: &[&[&str]] = &[
    // old and variant kanji forms
    &["高", "髙"],
    &["斎", "斉", "齋", "齊"],
    &["澤", "沢"],
    &["気", "氣"],
    &["澁", "渋"],
    &["対", "對"],
    &["崎", "﨑"],
    &["栄", "榮"],
    &["浜", "濱", "濵"],
    &["鴎", "鷗"],
    &["学", "學"],
    &["亀", "龜"],
    &["桜", "櫻"],
    &["真", "眞"],
    // symbols
    &["☆", "★", "♡", "☾", "☽"],
    &["^", "＾"],
    &["¥", "$", "¢", "€", "£", "₿"],
    &["%", "‰"],
    &["°", "℃", "℉"],
    &["*", "※"],
    &["、", "。", "，", "．", "・", "…", "‥", "•"],
    &["+", "±", "⊕"],
    &["×", "✖"],
    &["÷", "➗"],
    &["<", "≦", "≪", "〈", "《", "‹", "«"],
    &[">", "≧", "≫", "〉", "》", "›", "»"],
    &["「", "『", "（", "［", "《", "【"],
    &["」", "』", "）", "］", "》", "】"],
    &["「」", "『』", "（）", "［］", "《》", "【】"],
    &["(", "{", "<", "["],
    &[")", "}", ">", "]"],
    &["()", "{}", "<>", "[]"],
    &["’", "“", "”", "„", "\"", "`", "'"],
    &["\"\"\"", "'''", "```"],
    &["=", "≒", "≠", "≡"],
    &[":", ";"],
    &["!", "❗", "❣", "‼", "⁉", "❕", "¡"],
    &["?", "❓", "⁉", "⁇", "❔", "¿"],
    &["〒", "〠", "℡", "☎"],
    &["々", "ヾ", "ヽ", "ゝ", "ゞ", "〃", "仝", "〻"],
    &["〆", "〼", "ゟ", "ヿ"],
    &["♂", "♀", "⚢", "⚣", "⚤", "⚥", "⚦", "⚧", "⚨", "⚩", "⚲"],
    &["→", "↑", "←", "↓", "↙", "↖", "↘", "↗", "↔", "↕", "↪", "↩", "⇆"],
    &["♯", "♭", "♪", "♮", "♫", "♬", "♩"],
    &["√", "∛", "∜"],
];

static WEAK_LOOKUP: Lazy<HashMap<&'static str, Vec<&'static str>>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, Vec<&'static str>> = HashMap::new();
    for group in WEAK_GROUPS {
        for member in *group {
            let entry = map.entry(*member).or_default();
            for other in *group {
                if !entry.contains(other) {
                    entry.push(*other);
                }
            }
        }
    }
    map
});

fn symbol(word: impl Into<String>, ruby: &str, value: f32) -> DicdataElement {
    DicdataElement::word_with_cid(word, ruby, cid::SYMBOL, mid::GENERAL, value)
}

/// Synthesized entries for `convert_target`, the katakana reading of
/// `full_text[surface_range]`.
pub fn wise_dicdata(
    convert_target: &str,
    surface_range: Range<usize>,
    full_text: &[char],
    keyboard_language: KeyboardLanguage,
) -> Vec<DicdataElement> {
    let mut result = japanese_number_dicdata(convert_target);

    // standalone arabic numbers only; "12" inside "123" is not a number word
    let prev_is_number = surface_range
        .start
        .checked_sub(1)
        .and_then(|i| full_text.get(i))
        .is_some_and(|c| c.is_numeric());
    let next_is_number = full_text
        .get(surface_range.end)
        .is_some_and(|c| c.is_numeric());
    if !(prev_is_number || next_is_number) {
        if let Ok(number) = convert_target.parse::<i64>() {
            result.push(DicdataElement::with_cid(
                convert_target,
                cid::NUMBER,
                mid::SMALL_NUMBER,
                -14.0,
            ));
            if number.unsigned_abs() <= 1_000_000_000_000 {
                result.push(DicdataElement::word_with_cid(
                    kansuji(number),
                    convert_target,
                    cid::NUMBER,
                    mid::SMALL_NUMBER,
                    -16.0,
                ));
            }
        }
    }

    if keyboard_language == KeyboardLanguage::EnUs && utils::only_roman_alphabet(convert_target) {
        result.push(DicdataElement::with_cid(
            convert_target,
            cid::PROPER_NOUN,
            mid::ENGLISH_WORD,
            -14.0,
        ));
    }

    let mut chars = convert_target.chars();
    if let (Some(first), None) = (chars.next(), chars.next()) {
        let katakana = utils::to_katakana(convert_target);
        let hiragana = utils::to_hiragana(convert_target);
        if katakana == hiragana {
            result.push(DicdataElement::with_cid(
                katakana,
                cid::PROPER_NOUN,
                mid::GENERAL,
                -14.0,
            ));
        } else {
            result.push(DicdataElement::word_with_cid(
                hiragana,
                katakana.clone(),
                cid::PROPER_NOUN,
                mid::GENERAL,
                -13.0,
            ));
            result.push(DicdataElement::with_cid(
                katakana,
                cid::PROPER_NOUN,
                mid::GENERAL,
                -14.0,
            ));
        }

        let mut value = -14.0;
        if let Some(half) = to_halfwidth_symbol(first) {
            result.push(symbol(convert_target, convert_target, value));
            value -= 5.0;
            result.push(symbol(half.to_string(), convert_target, value));
            value -= 5.0;
        }
        if let Some(full) = to_fullwidth_symbol(first) {
            result.push(symbol(convert_target, convert_target, value));
            value -= 5.0;
            result.push(symbol(full.to_string(), convert_target, value));
        }
    }

    if let Some(group) = WEAK_LOOKUP.get(convert_target) {
        let mut value = -34.0;
        for member in group.iter().filter(|m| **m != convert_target) {
            result.push(symbol(*member, convert_target, value));
            value -= 5.0;
            let mut member_chars = member.chars();
            if let (Some(c), None) = (member_chars.next(), member_chars.next()) {
                if let Some(full) = to_fullwidth_symbol(c) {
                    result.push(symbol(full.to_string(), convert_target, value));
                    value -= 5.0;
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wise(target: &str, full: &str, range: Range<usize>) -> Vec<DicdataElement> {
        let full: Vec<char> = full.chars().collect();
        wise_dicdata(target, range, &full, KeyboardLanguage::JaJp)
    }

    #[test]
    fn standalone_number() {
        let r = wise("123", "123", 0..3);
        assert!(r.iter().any(|e| e.word == "123" && e.value() == -14.0));
        assert!(r.iter().any(|e| e.word == "百二十三" && e.value() == -16.0));
        // adjacent digit
        let r = wise("12", "123", 0..2);
        assert!(!r.iter().any(|e| e.word == "12"));
    }

    #[test]
    fn single_kana_variants() {
        let r = wise("ア", "ア", 0..1);
        assert!(r.iter().any(|e| e.word == "あ" && e.value() == -13.0));
        assert!(r.iter().any(|e| e.word == "ア" && e.value() == -14.0));
    }

    #[test]
    fn symbol_width_variants() {
        let r = wise("！", "！", 0..1);
        let words: Vec<(&str, f32)> = r
            .iter()
            .filter(|e| e.lcid == cid::SYMBOL)
            .map(|e| (e.word.as_str(), e.value()))
            .collect();
        assert_eq!(&words[..2], &[("！", -14.0), ("!", -19.0)]);
    }

    #[test]
    fn weak_groups_rank_low() {
        let r = wise("→", "→", 0..1);
        let up = r.iter().find(|e| e.word == "↑").expect("arrow");
        assert_eq!(up.value(), -34.0);
        assert!(r.iter().all(|e| e.word != "→" || e.value() > -34.0));
    }

    #[test]
    fn english_words_on_en_keyboard() {
        let full: Vec<char> = "hello".chars().collect();
        let r = wise_dicdata("hello", 0..5, &full, KeyboardLanguage::EnUs);
        assert!(r.iter().any(|e| e.mid == mid::ENGLISH_WORD));
        let r = wise("hello", "hello", 0..5);
        assert!(r.iter().all(|e| e.mid != mid::ENGLISH_WORD));
    }
}
