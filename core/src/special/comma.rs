use super::SpecialCandidateProvider;
use crate::candidate::{Candidate, ComposingCount};
use crate::dicdata::DicdataElement;
use crate::options::ConvertRequestOptions;
use crate::utils;
use crate::word_class::{cid, mid};
use crate::ComposingText;

/// Numbers with more than three integer digits get thousands separators:
/// `12345.6` -> `12,345.6`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommaSeparatedNumberProvider;

fn comma_separated(text: &str) -> Option<String> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let parts: Vec<&str> = body.split('.').collect();
    if parts.len() > 2
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }
    let integer = parts[0];
    if integer.len() <= 3 {
        return None;
    }
    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3 + 2);
    if negative {
        grouped.push('-');
    }
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if let Some(fraction) = parts.get(1) {
        grouped.push('.');
        grouped.push_str(fraction);
    }
    Some(grouped)
}

impl SpecialCandidateProvider for CommaSeparatedNumberProvider {
    fn provide_candidates(
        &self,
        input: &ComposingText,
        _options: &ConvertRequestOptions,
    ) -> Vec<Candidate> {
        let Some(text) = comma_separated(input.convert_target()) else {
            return Vec::new();
        };
        let ruby = utils::to_katakana(input.convert_target());
        let data = DicdataElement::word_with_cid(text.clone(), ruby, cid::PROPER_NOUN, mid::GENERAL, -10.0);
        vec![Candidate::new(
            text,
            -10.0,
            ComposingCount::InputCount(input.input().len()),
            mid::GENERAL,
            vec![data],
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators() {
        assert_eq!(comma_separated("12345.6").as_deref(), Some("12,345.6"));
        assert_eq!(comma_separated("1000").as_deref(), Some("1,000"));
        assert_eq!(comma_separated("-1234567").as_deref(), Some("-1,234,567"));
        assert_eq!(comma_separated("123"), None);
        assert_eq!(comma_separated("1.2.3"), None);
        assert_eq!(comma_separated("1234."), None);
        assert_eq!(comma_separated("12a45"), None);
    }
}
