//! Number words read in katakana (`ニマンサン` -> `二万三`, `20003`).
use crate::dicdata::DicdataElement;
use crate::word_class::{cid, mid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Digit(u8),
    Ten,
    Hundred,
    Thousand,
    /// 万, 億, 兆
    Group(usize),
    End,
}

impl Token {
    fn kanji(&self) -> &'static str {
        match self {
            Token::Digit(d) => ["〇", "一", "二", "三", "四", "五", "六", "七", "八", "九"]
                .get(*d as usize)
                .copied()
                .unwrap_or(""),
            Token::Ten => "十",
            Token::Hundred => "百",
            Token::Thousand => "千",
            Token::Group(2) => "万",
            Token::Group(3) => "億",
            Token::Group(_) => "兆",
            Token::End => "",
        }
    }

    /// Size of the four-digit group this token closes.
    fn group_rank(&self) -> Option<usize> {
        match self {
            Token::End => Some(1),
            Token::Group(rank) => Some(*rank),
            _ => None,
        }
    }

    fn is_number(&self) -> bool {
        matches!(self, Token::Digit(_) | Token::End)
    }

    fn is_not_number(&self) -> bool {
        !matches!(self, Token::Digit(_))
    }
}

/// Split a katakana reading into number tokens, terminated by `End`.
/// `None` when any part is not a number word.
fn tokenize(text: &str) -> Option<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let at = |i: usize| chars.get(i).copied();
    while let Some(c) = at(i) {
        let (token, len) = match (c, at(i + 1), at(i + 2)) {
            ('イ', Some('チ' | 'ッ'), _) => (Token::Digit(1), 2),
            ('オ', Some('ク'), _) => (Token::Group(3), 2),
            ('キ', Some('ュ'), Some('ウ')) => (Token::Digit(9), 3),
            ('ク', _, _) => (Token::Digit(9), 1),
            ('ゴ', _, _) => (Token::Digit(5), 1),
            ('サ', Some('ン'), _) => (Token::Digit(3), 2),
            ('シ', Some('チ'), _) => (Token::Digit(7), 2),
            ('シ', _, _) => (Token::Digit(4), 1),
            ('ジ', Some('ュ'), Some('ウ' | 'ッ')) => (Token::Ten, 3),
            ('セ', Some('ン'), _) => (Token::Thousand, 2),
            ('ゼ', Some('ロ'), _) => (Token::Digit(0), 2),
            ('ゼ', Some('ン'), _) => (Token::Thousand, 2),
            ('チ', Some('ョ'), Some('ウ')) => (Token::Group(4), 3),
            ('ナ', Some('ナ'), _) => (Token::Digit(7), 2),
            ('ニ', _, _) => (Token::Digit(2), 1),
            ('ハ', Some('チ' | 'ッ'), _) => (Token::Digit(8), 2),
            ('ヒ' | 'ビ' | 'ピ', Some('ャ'), Some('ク')) => (Token::Hundred, 3),
            ('マ', Some('ン'), _) => (Token::Group(2), 2),
            ('マ', Some('ル'), _) => (Token::Digit(0), 2),
            ('ヨ', Some('ン'), _) => (Token::Digit(4), 2),
            ('レ', Some('イ'), _) => (Token::Digit(0), 2),
            ('ロ', Some('ク' | 'ッ'), _) => (Token::Digit(6), 2),
            _ => return None,
        };
        tokens.push(token);
        i += len;
    }
    tokens.push(Token::End);
    Some(tokens)
}

/// Digits of each four-digit group, most significant group first.
fn parse_groups(tokens: &[Token]) -> Option<Vec<[u8; 4]>> {
    let mut max_rank: Option<usize> = None;
    let mut groups: Vec<[u8; 4]> = Vec::new();
    let mut stack = [0u8; 4];
    let mut current: Option<u8> = None;
    for token in tokens {
        match token {
            Token::Digit(d) => {
                if current.is_some() {
                    return None;
                }
                current = Some(*d);
            }
            Token::Thousand => stack[0] = current.take().unwrap_or(1),
            Token::Hundred => stack[1] = current.take().unwrap_or(1),
            Token::Ten => stack[2] = current.take().unwrap_or(1),
            Token::End | Token::Group(_) => {
                let rank = token.group_rank()?;
                stack[3] = current.take().unwrap_or(0);
                match max_rank {
                    Some(max) => {
                        if max <= rank {
                            return None;
                        }
                        groups[max - rank] = stack;
                    }
                    None => {
                        max_rank = Some(rank);
                        groups = vec![[0; 4]; rank];
                        groups[0] = stack;
                    }
                }
                stack = [0; 4];
            }
        }
    }
    Some(groups)
}

fn arabic_from_groups(groups: &[[u8; 4]]) -> Option<String> {
    let mut out = String::new();
    for group in groups {
        let digits: &[u8] = if out.is_empty() {
            let first = group.iter().position(|d| *d != 0)?;
            &group[first..]
        } else {
            group
        };
        out.extend(digits.iter().map(|d| char::from(b'0' + d)));
    }
    Some(out)
}

/// Kanji and arabic entries for a katakana number reading.
pub fn japanese_number_dicdata(head: &str) -> Vec<DicdataElement> {
    let Some(tokens) = tokenize(head) else {
        return Vec::new();
    };
    let kanji: String = tokens.iter().map(Token::kanji).collect();
    let arabic = if tokens.iter().all(Token::is_number) {
        tokens
            .iter()
            .filter_map(|t| match t {
                Token::Digit(d) => Some(char::from(b'0' + d)),
                _ => None,
            })
            .collect::<String>()
    } else if tokens.iter().all(Token::is_not_number) {
        return Vec::new();
    } else {
        let Some(arabic) = parse_groups(&tokens).and_then(|g| arabic_from_groups(&g)) else {
            return Vec::new();
        };
        arabic
    };
    if arabic.is_empty() {
        return Vec::new();
    }
    let head_len = head.chars().count() as f32;
    let arabic_len = arabic.chars().count() as f32;
    vec![
        DicdataElement::word_with_cid(kanji, head, cid::NUMBER, mid::NUMBER, -17.0 + head_len / 3.0),
        DicdataElement::word_with_cid(arabic, head, cid::NUMBER, mid::NUMBER, -16.0 + 4.0 / arabic_len),
    ]
}

const KANJI_DIGITS: [char; 10] = ['〇', '一', '二', '三', '四', '五', '六', '七', '八', '九'];

/// Spell an integer with kanji numerals and units (`12345` -> `一万二千三百四十五`).
pub fn kansuji(number: i64) -> String {
    if number == 0 {
        return "〇".to_string();
    }
    let mut out = String::new();
    if number < 0 {
        out.push('−');
    }
    let mut n = number.unsigned_abs();
    let mut groups = Vec::new();
    while n > 0 {
        groups.push((n % 10_000) as u32);
        n /= 10_000;
    }
    const GROUP_UNITS: [&str; 5] = ["", "万", "億", "兆", "京"];
    for (rank, group) in groups.iter().enumerate().rev() {
        if *group == 0 {
            continue;
        }
        let digits = [group / 1000, group / 100 % 10, group / 10 % 10, group % 10];
        for (pos, d) in digits.iter().enumerate() {
            if *d == 0 {
                continue;
            }
            let unit = ["千", "百", "十", ""][pos];
            if *d != 1 || unit.is_empty() {
                out.push(KANJI_DIGITS[*d as usize]);
            }
            out.push_str(unit);
        }
        out.push_str(GROUP_UNITS.get(rank).copied().unwrap_or(""));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(head: &str) -> Vec<String> {
        japanese_number_dicdata(head).into_iter().map(|e| e.word).collect()
    }

    #[test]
    fn digit_sequences() {
        assert_eq!(words("イチニサン"), vec!["一二三", "123"]);
        assert_eq!(words("ゼロ"), vec!["〇", "0"]);
    }

    #[test]
    fn positional_numbers() {
        assert_eq!(words("ニマンサン"), vec!["二万三", "20003"]);
        assert_eq!(words("センニヒャクサンジュウヨン"), vec!["千二百三十四", "1234"]);
        assert_eq!(words("ジュウイチ"), vec!["十一", "11"]);
        assert_eq!(words("シチジュウ"), vec!["七十", "70"]);
    }

    #[test]
    fn shi_followed_by_other_word() {
        assert_eq!(words("シジュウ"), vec!["四十", "40"]);
        assert_eq!(words("シセン"), vec!["四千", "4000"]);
    }

    #[test]
    fn rejects_non_numbers() {
        assert!(words("カンジ").is_empty());
        assert!(words("ジュウ").is_empty());
        assert!(words("イチニマンマン").is_empty());
    }

    #[test]
    fn values_follow_length() {
        let e = japanese_number_dicdata("イチ");
        assert!((e[0].value() - (-17.0 + 2.0 / 3.0)).abs() < 1e-6);
        assert!((e[1].value() - (-12.0)).abs() < 1e-6);
        assert_eq!(e[0].lcid, cid::NUMBER);
    }

    #[test]
    fn kansuji_spelling() {
        assert_eq!(kansuji(12345), "一万二千三百四十五");
        assert_eq!(kansuji(100_000_010), "一億十");
        assert_eq!(kansuji(0), "〇");
        assert_eq!(kansuji(-3), "−三");
    }
}
