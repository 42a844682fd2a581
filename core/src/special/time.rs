use super::SpecialCandidateProvider;
use crate::candidate::{Candidate, ComposingCount};
use crate::dicdata::DicdataElement;
use crate::options::ConvertRequestOptions;
use crate::word_class::{cid, mid};
use crate::ComposingText;

/// Three or four digits read as a clock time: `123` -> `1:23`, `1234` -> `12:34`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeExpressionProvider;

fn time_expression(digits: &str) -> Option<String> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hour, minute) = match digits.len() {
        3 => (&digits[..1], &digits[1..]),
        4 => (&digits[..2], &digits[2..]),
        _ => return None,
    };
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    if minute > 59 {
        return None;
    }
    if digits.len() == 3 {
        Some(format!("{hour}:{minute:02}"))
    } else if hour <= 24 {
        Some(format!("{hour:02}:{minute:02}"))
    } else {
        None
    }
}

impl SpecialCandidateProvider for TimeExpressionProvider {
    fn provide_candidates(
        &self,
        input: &ComposingText,
        _options: &ConvertRequestOptions,
    ) -> Vec<Candidate> {
        let digits = input.convert_target();
        let Some(text) = time_expression(digits) else {
            return Vec::new();
        };
        let data = DicdataElement::word_with_cid(text.clone(), digits, cid::PROPER_NOUN, mid::GENERAL, -10.0);
        vec![Candidate::new(
            text,
            -10.0,
            ComposingCount::SurfaceCount(digits.chars().count()),
            mid::GENERAL,
            vec![data],
        )]
    }
}
