//! Built-in romaji -> hiragana rules.
//!
//! Rules are generated from compact row tables instead of being listed one by
//! one. Earlier rows win when two generators produce the same key.
use crate::input_piece::InputPiece;
use crate::input_table::{InputTable, KeyElement, ValueElement};
use std::collections::BTreeMap;

const VOWELS: [char; 5] = ['a', 'i', 'u', 'e', 'o'];

/// Consonants that double into a sokuon (`kk` -> `っk`).
const GEMINATE: &str = "bcdfghjklmpqrstvwxyz";

const SIMPLE_ROWS: &[(&str, [&str; 5])] = &[
    ("", ["あ", "い", "う", "え", "お"]),
    ("k", ["か", "き", "く", "け", "こ"]),
    ("s", ["さ", "し", "す", "せ", "そ"]),
    ("t", ["た", "ち", "つ", "て", "と"]),
    ("n", ["な", "に", "ぬ", "ね", "の"]),
    ("h", ["は", "ひ", "ふ", "へ", "ほ"]),
    ("m", ["ま", "み", "む", "め", "も"]),
    ("r", ["ら", "り", "る", "れ", "ろ"]),
    ("g", ["が", "ぎ", "ぐ", "げ", "ご"]),
    ("z", ["ざ", "じ", "ず", "ぜ", "ぞ"]),
    ("d", ["だ", "ぢ", "づ", "で", "ど"]),
    ("b", ["ば", "び", "ぶ", "べ", "ぼ"]),
    ("p", ["ぱ", "ぴ", "ぷ", "ぺ", "ぽ"]),
    ("c", ["か", "し", "く", "せ", "こ"]),
    ("f", ["ふぁ", "ふぃ", "ふ", "ふぇ", "ふぉ"]),
    ("l", ["ぁ", "ぃ", "ぅ", "ぇ", "ぉ"]),
    ("x", ["ぁ", "ぃ", "ぅ", "ぇ", "ぉ"]),
    ("y", ["や", "い", "ゆ", "いぇ", "よ"]),
    ("w", ["わ", "うぃ", "う", "うぇ", "を"]),
    ("wh", ["うぁ", "うぃ", "う", "うぇ", "うぉ"]),
    ("v", ["ゔぁ", "ゔぃ", "ゔ", "ゔぇ", "ゔぉ"]),
    ("q", ["くぁ", "くぃ", "く", "くぇ", "くぉ"]),
    ("j", ["じゃ", "じ", "じゅ", "じぇ", "じょ"]),
    ("th", ["てゃ", "てぃ", "てゅ", "てぇ", "てょ"]),
    ("dh", ["でゃ", "でぃ", "でゅ", "でぇ", "でょ"]),
    ("tw", ["とぁ", "とぃ", "とぅ", "とぇ", "とぉ"]),
    ("dw", ["どぁ", "どぃ", "どぅ", "どぇ", "どぉ"]),
    ("kw", ["くぁ", "くぃ", "くぅ", "くぇ", "くぉ"]),
    ("gw", ["ぐぁ", "ぐぃ", "ぐぅ", "ぐぇ", "ぐぉ"]),
    ("ts", ["つぁ", "つぃ", "つ", "つぇ", "つぉ"]),
];

/// `<prefix>y<vowel>` rows: base kana followed by a small ya/i/yu/e/yo.
const YOON_ROWS: &[(&str, &str)] = &[
    ("ky", "き"),
    ("gy", "ぎ"),
    ("sy", "し"),
    ("zy", "じ"),
    ("jy", "じ"),
    ("ty", "ち"),
    ("cy", "ち"),
    ("dy", "ぢ"),
    ("ny", "に"),
    ("hy", "ひ"),
    ("by", "び"),
    ("py", "ぴ"),
    ("my", "み"),
    ("ry", "り"),
    ("fy", "ふ"),
    ("vy", "ゔ"),
    ("sh", "し"),
    ("ch", "ち"),
];

const SMALL_Y: [&str; 5] = ["ゃ", "ぃ", "ゅ", "ぇ", "ょ"];

const EXTRA: &[(&str, &str)] = &[
    ("shi", "し"),
    ("chi", "ち"),
    ("tsu", "つ"),
    ("wyi", "ゐ"),
    ("wye", "ゑ"),
    ("lya", "ゃ"),
    ("lyu", "ゅ"),
    ("lyo", "ょ"),
    ("xya", "ゃ"),
    ("xyu", "ゅ"),
    ("xyo", "ょ"),
    ("ltu", "っ"),
    ("xtu", "っ"),
    ("ltsu", "っ"),
    ("xtsu", "っ"),
    ("lwa", "ゎ"),
    ("xwa", "ゎ"),
    ("lka", "ヵ"),
    ("xka", "ヵ"),
    ("lke", "ヶ"),
    ("xke", "ヶ"),
    ("nn", "ん"),
    ("n'", "ん"),
    ("xn", "ん"),
    ("-", "ー"),
    (",", "、"),
    (".", "。"),
    ("[", "「"),
    ("]", "」"),
    ("~", "〜"),
    ("/", "・"),
    ("z.", "…"),
    ("z,", "‥"),
    ("zh", "←"),
    ("zj", "↓"),
    ("zk", "↑"),
    ("zl", "→"),
    ("z-", "〜"),
    ("z/", "・"),
    ("z[", "『"),
    ("z]", "』"),
];

fn chars_key(key: &str) -> Vec<KeyElement> {
    key.chars()
        .map(|c| KeyElement::Piece(InputPiece::Character(c)))
        .collect()
}

fn chars_value(value: &str) -> Vec<ValueElement> {
    value.chars().map(ValueElement::Character).collect()
}

/// All `(key, value)` string rules of the default table.
pub fn default_rules() -> Vec<(String, String)> {
    let mut rules: Vec<(String, String)> = Vec::new();
    for (prefix, row) in SIMPLE_ROWS {
        for (v, kana) in VOWELS.iter().zip(row.iter()) {
            // `tsu` is listed explicitly; `ts` + `u` must not collapse early.
            if *prefix == "ts" && *v == 'u' {
                continue;
            }
            rules.push((format!("{}{}", prefix, v), kana.to_string()));
        }
    }
    for (prefix, base) in YOON_ROWS {
        for (v, small) in VOWELS.iter().zip(SMALL_Y.iter()) {
            if (*prefix == "sh" || *prefix == "ch") && *v == 'i' {
                continue;
            }
            rules.push((format!("{}{}", prefix, v), format!("{}{}", base, small)));
        }
    }
    for (k, v) in EXTRA {
        rules.push((k.to_string(), v.to_string()));
    }
    for c in GEMINATE.chars() {
        rules.push((format!("{}{}", c, c), format!("っ{}", c)));
    }
    for c in GEMINATE.chars().filter(|c| *c != 'y') {
        rules.push((format!("n{}", c), format!("ん{}", c)));
    }
    rules
}

/// The default romaji table, including `n` + separator -> `ん`.
pub fn default_roman_to_kana() -> InputTable {
    let mut mapping = BTreeMap::new();
    for (k, v) in default_rules() {
        mapping.entry(chars_key(&k)).or_insert_with(|| chars_value(&v));
    }
    mapping.insert(
        vec![
            KeyElement::Piece(InputPiece::Character('n')),
            KeyElement::Piece(InputPiece::CompositionSeparator),
        ],
        chars_value("ん"),
    );
    InputTable::new(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn romaji(s: &str) -> String {
        let table = default_roman_to_kana();
        let mut buf = Vec::new();
        for c in s.chars() {
            table.apply(&mut buf, &InputPiece::Character(c));
        }
        buf.into_iter().collect()
    }

    #[test]
    fn test_basic_syllables() {
        assert_eq!(romaji("kanji"), "かんじ");
        assert_eq!(romaji("hasiru"), "はしる");
        assert_eq!(romaji("kyouhaiitenkida"), "きょうはいいてんきだ");
        assert_eq!(romaji("akafa"), "あかふぁ");
    }

    #[test]
    fn test_n_handling() {
        assert_eq!(romaji("kanto"), "かんと");
        assert_eq!(romaji("konnnichiha"), "こんにちは");
        assert_eq!(romaji("kan'i"), "かんい");
        assert_eq!(romaji("nya"), "にゃ");
    }

    #[test]
    fn test_sokuon() {
        assert_eq!(romaji("itta"), "いった");
        assert_eq!(romaji("tukatte"), "つかって");
        assert_eq!(romaji("ttsu"), "っつ");
    }

    #[test]
    fn test_separator_resolves_trailing_n() {
        let table = default_roman_to_kana();
        let mut buf: Vec<char> = "かn".chars().collect();
        table.apply(&mut buf, &InputPiece::CompositionSeparator);
        assert_eq!(buf.into_iter().collect::<String>(), "かん");
    }

    #[test]
    fn test_symbols() {
        assert_eq!(romaji("a-"), "あー");
        assert_eq!(romaji("z."), "…");
        assert_eq!(romaji("[a]"), "「あ」");
    }
}
