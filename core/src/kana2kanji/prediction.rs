use super::Kana2Kanji;
use crate::candidate::{Candidate, CandidateData, ClauseDataUnit, ComposingCount};
use crate::composing_text::ComposingText;
use crate::converter::{PostCompositionPredictionCandidate, PredictionType};
use crate::dicdata::DicdataElement;
use crate::dictionary::DicdataStoreState;
use crate::input_piece::{InputStyle, InputTableId};
use crate::input_style_manager::InputStyleManager;
use crate::lattice::LatticeRange;
use crate::utils;
use crate::word_class::{self, cid, mid};

/// Per-character penalty for predicted readings longer than the typed one.
const LENGTH_PENALTY: f32 = 3.0;

/// Insert `item` into `result` kept sorted by descending value, bounded
/// to `n_best` entries.
fn insert_n_best<T>(result: &mut Vec<T>, item: T, n_best: usize, value: impl Fn(&T) -> f32) {
    let new_value = value(&item);
    let position = result
        .iter()
        .rposition(|c| value(c) >= new_value)
        .map_or(0, |i| i + 1);
    if position >= n_best {
        return;
    }
    if result.len() >= n_best {
        result.pop();
    }
    result.insert(position.min(result.len()), item);
}

impl Kana2Kanji {
    /// Completions of the clause being typed.
    ///
    /// `prepart` holds the clauses before `last_clause`; its words are kept
    /// as they are and the last clause's reading is used as a prefix key.
    /// With romaji input a dangling roman suffix is expanded into every
    /// kana it can still become.
    pub fn get_prediction_candidates(
        &self,
        text: &ComposingText,
        prepart: &CandidateData,
        last_clause: &ClauseDataUnit,
        n_best: usize,
        state: &mut DicdataStoreState,
    ) -> Vec<Candidate> {
        let convert_target: Vec<char> = text.convert_target().chars().collect();
        let last_ruby: String = last_clause
            .ranges
            .iter()
            .map(|range| match *range {
                LatticeRange::Input { from, to } => {
                    let to = to.min(text.input().len());
                    let from = from.min(to);
                    utils::to_katakana(&ComposingText::convert_target_for(&text.input()[from..to]))
                }
                LatticeRange::Surface { from, to } => {
                    let to = to.min(convert_target.len());
                    let from = from.min(to);
                    utils::to_katakana(&convert_target[from..to].iter().collect::<String>())
                }
            })
            .collect();
        let last_ruby_count = last_ruby.chars().count();

        let prestring: String = prepart.clauses.iter().map(|(c, _)| c.text.as_str()).collect();
        let mut datas: Vec<DicdataElement> = Vec::new();
        let mut covered = String::new();
        for data in &prepart.data {
            if covered.len() >= prestring.len() {
                break;
            }
            covered.push_str(&data.word);
            datas.push(data.clone());
        }

        let dynamic = self.store.prefix_match_dynamic_user_dict(&last_ruby, state);

        let last_candidate = if prepart.is_empty() {
            Candidate::new("", 0.0, ComposingCount::InputCount(0), mid::EOS, Vec::new())
        } else {
            self.process_clause_candidate(&CandidateData {
                clauses: prepart.clauses.clone(),
                data: datas.clone(),
            })
        };
        let last_rcid = last_candidate.data.last().map_or(cid::EOS, |d| d.rcid);
        let next_lcid = prepart.last_clause().map_or(cid::EOS, |c| c.next_lcid);
        let last_mid = last_candidate.last_mid;
        let composing_count = ComposingCount::composite(
            last_candidate.composing_count.clone(),
            ComposingCount::SurfaceCount(last_ruby_count),
        );
        let ignore_cc_value = self.store.cc_value(last_rcid, next_lcid);

        let style = text.input().last().map_or(InputStyle::Direct, |e| e.style.clone());
        let dicdata: Vec<DicdataElement> = match &style {
            InputStyle::Direct => self.store.prediction_dicdata(&last_ruby, state),
            InputStyle::Roman2Kana | InputStyle::Mapped(_) => {
                let id = match &style {
                    InputStyle::Mapped(id) => id.clone(),
                    _ => InputTableId::DefaultRomanToKana,
                };
                let chars: Vec<char> = last_ruby.chars().collect();
                let roman_len = chars
                    .iter()
                    .rev()
                    .take_while(|c| c.is_ascii_alphabetic())
                    .count();
                if roman_len == 0 {
                    self.store.prediction_dicdata(&last_ruby, state)
                } else {
                    let ruby: String = chars[..chars.len() - roman_len].iter().collect();
                    let roman: String = chars[chars.len() - roman_len..].iter().collect();
                    if ruby.is_empty() {
                        Vec::new()
                    } else {
                        let table = InputStyleManager::table(&id);
                        tracing::trace!("prediction key {} with pending roman {}", ruby, roman);
                        table
                            .possible_nexts(&roman)
                            .iter()
                            .flat_map(|next| self.store.prediction_dicdata(&format!("{ruby}{next}"), state))
                            .collect()
                    }
                }
            }
        };

        let mut result: Vec<Candidate> = Vec::with_capacity(n_best + 1);
        for data in dicdata.into_iter().chain(dynamic) {
            let include_mm = word_class::include_mm_value_calculation(&data);
            let mm_value = if include_mm {
                self.store.mm_value(last_mid, data.mid)
            } else {
                0.0
            };
            let cc_value = self.store.cc_value(last_rcid, data.lcid);
            let penalty = -(data.ruby.chars().count() as f32 - last_ruby_count as f32) * LENGTH_PENALTY;
            let new_value =
                last_candidate.value + mm_value + cc_value + data.value() + penalty - ignore_cc_value;
            let mut data_path = datas.clone();
            let word = data.word.clone();
            let data_mid = data.mid;
            data_path.push(data);
            let candidate = Candidate::new(
                format!("{}{}", last_candidate.text, word),
                new_value,
                composing_count.clone(),
                if include_mm { data_mid } else { last_mid },
                data_path,
            );
            insert_n_best(&mut result, candidate, n_best, |c| c.value);
        }
        result
    }

    /// Zero-hint continuations of an accepted candidate, from the
    /// per-class tables.
    pub fn get_zero_hint_prediction_candidates(
        &self,
        left: &Candidate,
        n_best: usize,
    ) -> Vec<PostCompositionPredictionCandidate> {
        let rcid = left.data.last().map_or(cid::BOS, |d| d.rcid);
        let mut result = Vec::new();
        for data in self.store.zero_hint_prediction_dicdata(rcid) {
            let candidate = PostCompositionPredictionCandidate {
                text: data.word.clone(),
                value: data.value(),
                kind: PredictionType::Additional(vec![data]),
            };
            insert_n_best(&mut result, candidate, n_best, |c| c.value);
        }
        result
    }

    /// Longer words extending the last word of an accepted candidate. Each
    /// result replaces that word; its text is the part typed beyond it.
    pub fn get_post_composition_prediction_candidates(
        &self,
        left: &Candidate,
        n_best: usize,
        state: &mut DicdataStoreState,
    ) -> Vec<PostCompositionPredictionCandidate> {
        let Some(target) = left.data.last() else {
            return Vec::new();
        };
        if target.ruby.is_empty() {
            return Vec::new();
        }
        let target_ruby_count = target.ruby.chars().count();
        let mut result = Vec::new();
        for data in self.store.prediction_dicdata(&target.ruby, state) {
            if data.ruby.chars().count() <= target_ruby_count {
                continue;
            }
            let Some(rest) = data.word.strip_prefix(target.word.as_str()) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            let penalty =
                -((data.ruby.chars().count() - target_ruby_count) as f32) * LENGTH_PENALTY;
            let candidate = PostCompositionPredictionCandidate {
                text: rest.to_string(),
                value: data.value() + penalty,
                kind: PredictionType::Replacement {
                    target: vec![target.clone()],
                    replacement: vec![data],
                },
            };
            insert_n_best(&mut result, candidate, n_best, |c| c.value);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{store, text};
    use super::*;
    use crate::dictionary_builder::DictionaryBuilder;

    fn clause(text: &str, from: usize, to: usize) -> ClauseDataUnit {
        ClauseDataUnit {
            text: text.to_string(),
            ranges: vec![LatticeRange::Surface { from, to }],
            ..Default::default()
        }
    }

    #[test]
    fn n_best_insertion_is_sorted_and_bounded() {
        let mut v: Vec<f32> = Vec::new();
        for x in [-3.0, -1.0, -2.0, -5.0, -0.5] {
            insert_n_best(&mut v, x, 3, |x| *x);
        }
        assert_eq!(v, vec![-0.5, -1.0, -2.0]);
    }

    #[test]
    fn direct_input_predicts_longer_words() {
        let k = Kana2Kanji::new(store("predict_direct", &[("漢字", "カンジ", -7.0), ("感動", "カンドウ", -8.0), ("缶", "カン", -9.0)]));
        let mut state = k.store().prepare_state();
        let t = text("かん", crate::input_piece::InputStyle::Direct);
        let result = k.get_prediction_candidates(&t, &CandidateData::default(), &clause("缶", 0, 2), 5, &mut state);
        let texts: Vec<&str> = result.iter().map(|c| c.text.as_str()).collect();
        assert!(texts.contains(&"漢字"));
        assert!(texts.contains(&"感動"));
        // one extra kana costs less than two
        let kanji = result.iter().find(|c| c.text == "漢字").map(|c| c.value);
        let kandou = result.iter().find(|c| c.text == "感動").map(|c| c.value);
        assert!(kanji > kandou);
        assert!(result.windows(2).all(|w| w[0].value >= w[1].value));
    }

    #[test]
    fn pending_roman_is_expanded() {
        let k = Kana2Kanji::new(store("predict_roman", &[("漢字", "カンジ", -7.0), ("看過", "カンカ", -8.0)]));
        let mut state = k.store().prepare_state();
        let t = text("kank", crate::input_piece::InputStyle::Roman2Kana);
        assert_eq!(t.convert_target(), "かんk");
        let result = k.get_prediction_candidates(&t, &CandidateData::default(), &clause("かんk", 0, 3), 5, &mut state);
        let texts: Vec<&str> = result.iter().map(|c| c.text.as_str()).collect();
        assert!(texts.contains(&"看過"));
        assert!(!texts.contains(&"漢字"));
    }

    #[test]
    fn zero_hint_rows_become_additions() {
        let k = Kana2Kanji::new(store("predict_zero_hint", &[("缶", "カン", -9.0)]));
        let rows = vec![
            DicdataElement::new("は", "ハ", 261, 261, mid::EOS, -3.0),
            DicdataElement::new("が", "ガ", 150, 150, mid::EOS, -4.0),
        ];
        DictionaryBuilder::write_zero_hint(k.store().dir(), cid::GENERAL_NOUN, &rows).expect("zero hint");
        let left = Candidate::new(
            "缶",
            -9.0,
            ComposingCount::SurfaceCount(2),
            mid::GENERAL,
            vec![DicdataElement::new("缶", "カン", cid::GENERAL_NOUN, cid::GENERAL_NOUN, mid::GENERAL, -9.0)],
        );
        let result = k.get_zero_hint_prediction_candidates(&left, 15);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].text, "は");
        assert!(matches!(result[0].kind, PredictionType::Additional(ref d) if d.len() == 1));
    }

    #[test]
    fn post_composition_replaces_the_last_word() {
        let k = Kana2Kanji::new(store("predict_post", &[("感", "カン", -9.0), ("感動", "カンドウ", -8.0), ("漢字", "カンジ", -7.0)]));
        let mut state = k.store().prepare_state();
        let left = Candidate::new(
            "感",
            -9.0,
            ComposingCount::SurfaceCount(2),
            mid::GENERAL,
            vec![DicdataElement::new("感", "カン", cid::GENERAL_NOUN, cid::GENERAL_NOUN, mid::GENERAL, -9.0)],
        );
        let result = k.get_post_composition_prediction_candidates(&left, 15, &mut state);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].text, "動");
        match &result[0].kind {
            PredictionType::Replacement { target, replacement } => {
                assert_eq!(target[0].word, "感");
                assert_eq!(replacement[0].word, "感動");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
