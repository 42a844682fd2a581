use super::SpecialCandidateProvider;
use crate::candidate::{Candidate, ComposingCount};
use crate::dicdata::DicdataElement;
use crate::options::ConvertRequestOptions;
use crate::utils;
use crate::word_class::mid;
use crate::ComposingText;

const DOMAINS: &[&str] = &[
    "@gmail.com",
    "@icloud.com",
    "@yahoo.co.jp",
    "@au.com",
    "@docomo.ne.jp",
    "@excite.co.jp",
    "@ezweb.ne.jp",
    "@googlemail.com",
    "@hotmail.co.jp",
    "@hotmail.com",
    "@i.softbank.jp",
    "@live.jp",
    "@me.com",
    "@mineo.jp",
    "@nifty.com",
    "@outlook.com",
    "@outlook.jp",
    "@softbank.ne.jp",
    "@yahoo.ne.jp",
    "@ybb.ne.jp",
    "@ymobile.ne.jp",
];

/// `name@` followed by a partial domain completes to known mail domains.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailAddressProvider;

fn is_address_id(id: &str) -> bool {
    id.is_empty()
        || id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+'))
}

impl SpecialCandidateProvider for EmailAddressProvider {
    fn provide_candidates(
        &self,
        input: &ComposingText,
        _options: &ConvertRequestOptions,
    ) -> Vec<Candidate> {
        let target = input.convert_target();
        let Some(at) = target.rfind('@') else {
            return Vec::new();
        };
        let (id, domain_prefix) = (&target[..at], &target[at + 1..]);
        if !is_address_id(id) {
            return Vec::new();
        }
        let base = if id.is_empty() { -20.0 } else { -13.0 };
        let ruby = utils::to_katakana(target);
        DOMAINS
            .iter()
            .enumerate()
            .filter(|(_, domain)| domain[1..].starts_with(domain_prefix))
            .map(|(i, domain)| {
                let address = format!("{id}{domain}");
                let value = base - i as f32;
                let data = DicdataElement::new(address.clone(), ruby.clone(), 0, 0, mid::GENERAL, value);
                Candidate::new(
                    address,
                    value,
                    ComposingCount::InputCount(input.input().len()),
                    mid::GENERAL,
                    vec![data],
                )
                .not_learning_target()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InputStyle;

    fn candidates(text: &str) -> Vec<Candidate> {
        let mut input = ComposingText::new();
        input.insert_at_cursor_position(text, InputStyle::Direct);
        EmailAddressProvider.provide_candidates(&input, &ConvertRequestOptions::default())
    }

    #[test]
    fn completes_known_domains() {
        let result = candidates("taro@gm");
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].text, "taro@gmail.com");
        assert_eq!(result[0].value, -13.0);

        let all = candidates("taro@");
        assert_eq!(all.len(), DOMAINS.len());
        assert_eq!(all[2].value, -15.0);
    }

    #[test]
    fn ignores_non_addresses() {
        assert!(candidates("たろう@").is_empty());
        assert!(candidates("taro").is_empty());
    }
}
