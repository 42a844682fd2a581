//! Special candidates that do not come from the dictionary.
//!
//! Providers are registered in
//! [`ConvertRequestOptions::special_candidate_providers`] and run in order.
//!
//! Public API:
//! - `SpecialCandidateProvider` - the provider trait
//! - `TimeExpressionProvider`, `CommaSeparatedNumberProvider`,
//!   `EmailAddressProvider`, `VersionProvider` - built-ins
//! - `default_providers` - the built-ins in their usual order
use crate::candidate::{Candidate, ComposingCount};
use crate::dicdata::DicdataElement;
use crate::options::ConvertRequestOptions;
use crate::utils;
use crate::word_class::{cid, mid};
use crate::ComposingText;
use std::sync::Arc;

mod comma;
mod email;
mod time;

pub use comma::CommaSeparatedNumberProvider;
pub use email::EmailAddressProvider;
pub use time::TimeExpressionProvider;

pub trait SpecialCandidateProvider: Send + Sync {
    fn provide_candidates(
        &self,
        input: &ComposingText,
        options: &ConvertRequestOptions,
    ) -> Vec<Candidate>;
}

/// `バージョン` is answered with the host's version line.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionProvider;

impl SpecialCandidateProvider for VersionProvider {
    fn provide_candidates(
        &self,
        input: &ComposingText,
        options: &ConvertRequestOptions,
    ) -> Vec<Candidate> {
        let ruby = utils::to_katakana(input.convert_target());
        if ruby != "バージョン" {
            return Vec::new();
        }
        let version = options.version_string();
        let data = DicdataElement::word_with_cid(version.clone(), ruby, cid::PROPER_NOUN, mid::GENERAL, -30.0);
        vec![Candidate::new(
            version,
            -30.0,
            ComposingCount::InputCount(input.input().len()),
            mid::GENERAL,
            vec![data],
        )
        .not_learning_target()]
    }
}

pub fn default_providers() -> Vec<Arc<dyn SpecialCandidateProvider>> {
    vec![
        Arc::new(EmailAddressProvider),
        Arc::new(VersionProvider),
        Arc::new(TimeExpressionProvider),
        Arc::new(CommaSeparatedNumberProvider),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InputStyle;

    #[test]
    fn version_candidate_uses_metadata() {
        let mut input = ComposingText::new();
        input.insert_at_cursor_position("ばーじょん", InputStyle::Direct);
        let mut options = ConvertRequestOptions::default();
        options.metadata = Some(crate::options::Metadata {
            version_string: "MyIME Version 0.7.1".to_string(),
        });
        let result = VersionProvider.provide_candidates(&input, &options);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].text, "MyIME Version 0.7.1");
        assert!(!result[0].is_learning_target);
    }
}
