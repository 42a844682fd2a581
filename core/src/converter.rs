//! Session-level conversion front-end.
//!
//! `KanaKanjiConverter` keeps the previous buffer and lattice between
//! requests, picks the cheapest lattice strategy for the new buffer, and
//! turns the lattice into the ordered candidate lists of a
//! [`ConversionResult`].
//!
//! Public API:
//! - `KanaKanjiConverter::request_candidates` - candidates for a buffer
//! - `KanaKanjiConverter::request_post_composition_prediction_candidates`
//! - `KanaKanjiConverter::update_learning_data` and friends - learning hooks
//! - `ConversionResult`, `PostCompositionPredictionCandidate`, `PredictionType`
use crate::candidate::{Candidate, CandidateData, CompleteAction, ComposingCount};
use crate::composing_text::ComposingText;
use crate::dicdata::DicdataElement;
use crate::dictionary::{DicdataStore, DicdataStoreState};
use crate::input_piece::InputPiece;
use crate::kana2kanji::{Kana2Kanji, LatticeResult};
use crate::lattice::{DualIndex, Lattice};
use crate::learning::LearningConfig;
use crate::options::{ConvertRequestOptions, KeyboardLanguage, RequestQuery};
use crate::utils;
use crate::word_class::{cid, mid};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

/// Candidates answering one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionResult {
    /// Everything to show, best first.
    pub main_results: Vec<Candidate>,
    /// Completions of the last clause included in `main_results`.
    pub prediction_results: Vec<Candidate>,
    /// Foreign word completions included in `main_results`.
    pub english_prediction_results: Vec<Candidate>,
    /// Conversions of the first clause only.
    pub first_clause_results: Vec<Candidate>,
}

/// How a post-composition prediction applies to the accepted text.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionType {
    /// Append these words.
    Additional(Vec<DicdataElement>),
    /// Replace the trailing `target` words with `replacement`.
    Replacement {
        target: Vec<DicdataElement>,
        replacement: Vec<DicdataElement>,
    },
}

/// A continuation offered after a candidate was accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct PostCompositionPredictionCandidate {
    /// Text to insert after the accepted candidate.
    pub text: String,
    pub value: f32,
    pub kind: PredictionType,
}

impl PostCompositionPredictionCandidate {
    /// Last word the accepted text ends with once this prediction is used.
    pub fn last_data(&self) -> Option<&DicdataElement> {
        match &self.kind {
            PredictionType::Additional(data) => data.last(),
            PredictionType::Replacement { replacement, .. } => replacement.last(),
        }
    }
}

const MAIN_RESULT_COUNT: usize = 5;
const PREDICTION_RESULT_COUNT: usize = 3;
const PREDICTION_N_BEST: usize = 5;
const POST_COMPOSITION_N_BEST: usize = 15;
const POST_COMPOSITION_RESULT_COUNT: usize = 10;
const POST_COMPOSITION_JOSHI_LIMIT: usize = 3;
const FOREIGN_PENALTY: f32 = -5.0;
const TOP_LEVEL_FOREIGN_PENALTY: f32 = -10.0;

static CURSOR_BACK_ONE: &[&str] = &[
    "[]", "()", "｛｝", "〈〉", "〔〕", "（）", "「」", "『』", "【】", "{}", "<>", "《》", "\"\"", "''", "””",
];

fn by_value(a: &Candidate, b: &Candidate) -> Ordering {
    b.value.total_cmp(&a.value)
}

fn by_ruby_count_then_value(a: &Candidate, b: &Candidate) -> Ordering {
    b.ruby_count.cmp(&a.ruby_count).then_with(|| by_value(a, b))
}

fn top(mut candidates: Vec<Candidate>, count: usize, order: fn(&Candidate, &Candidate) -> Ordering) -> Vec<Candidate> {
    candidates.sort_by(order);
    candidates.truncate(count);
    candidates
}

/// Drop empty and already seen texts. A duplicate keeps the first position
/// and takes the later payload when that one scores higher, or scores the
/// same and reads longer.
fn unique_candidates(candidates: impl IntoIterator<Item = Candidate>, seen: &HashSet<String>) -> Vec<Candidate> {
    let mut result: Vec<Candidate> = Vec::new();
    let mut text_index: HashMap<String, usize> = HashMap::new();
    for candidate in candidates {
        if candidate.text.is_empty() || seen.contains(&candidate.text) {
            continue;
        }
        match text_index.get(&candidate.text) {
            Some(&index) => {
                let existing = &result[index];
                if candidate.value > existing.value
                    || (candidate.value == existing.value && candidate.ruby_count > existing.ruby_count)
                {
                    result[index] = candidate;
                }
            }
            None => {
                text_index.insert(candidate.text.clone(), result.len());
                result.push(candidate);
            }
        }
    }
    result
}

fn unique_predictions(
    candidates: impl IntoIterator<Item = PostCompositionPredictionCandidate>,
    seen: &HashSet<String>,
) -> Vec<PostCompositionPredictionCandidate> {
    let mut result: Vec<PostCompositionPredictionCandidate> = Vec::new();
    for candidate in candidates {
        if candidate.text.is_empty() || seen.contains(&candidate.text) {
            continue;
        }
        match result.iter_mut().find(|c| c.text == candidate.text) {
            Some(existing) => {
                if existing.value < candidate.value {
                    *existing = candidate;
                }
            }
            None => result.push(candidate),
        }
    }
    result
}

fn top_predictions(
    mut candidates: Vec<PostCompositionPredictionCandidate>,
    count: usize,
) -> Vec<PostCompositionPredictionCandidate> {
    candidates.sort_by(|a, b| b.value.total_cmp(&a.value));
    candidates.truncate(count);
    candidates
}

/// Lower is more likely to be a katakana loanword.
fn katakana_score(katakana: &str) -> f32 {
    katakana.chars().fold(1.0, |score, c| {
        if "プヴペィフ".contains(c) {
            score * 0.5
        } else if "ュピポ".contains(c) {
            score * 0.6
        } else if "パォグーム".contains(c) {
            score * 0.7
        } else {
            score
        }
    })
}

/// Characters typed as plain character keystrokes.
fn typed_characters(text: &ComposingText) -> String {
    text.input()
        .iter()
        .filter_map(|e| match e.piece {
            InputPiece::Character(c) => Some(c),
            _ => None,
        })
        .collect()
}

pub struct KanaKanjiConverter {
    kana2kanji: Kana2Kanji,
    state: DicdataStoreState,
    previous_input: Option<ComposingText>,
    lattice: Lattice,
    completed_data: Option<Candidate>,
    last_data: Option<DicdataElement>,
}

impl std::fmt::Debug for KanaKanjiConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KanaKanjiConverter")
            .field("previous_input", &self.previous_input.as_ref().map(|t| t.convert_target()))
            .field("lattice_nodes", &self.lattice.len())
            .field("completed_data", &self.completed_data.as_ref().map(|c| &c.text))
            .finish()
    }
}

impl KanaKanjiConverter {
    pub fn new(store: Arc<DicdataStore>) -> Self {
        let state = store.prepare_state();
        Self {
            kana2kanji: Kana2Kanji::new(store),
            state,
            previous_input: None,
            lattice: Lattice::new(),
            completed_data: None,
            last_data: None,
        }
    }

    pub fn store(&self) -> &Arc<DicdataStore> {
        self.kana2kanji.store()
    }

    pub fn state(&self) -> &DicdataStoreState {
        &self.state
    }

    /// Forget the cached buffer and lattice.
    pub fn stop_composition(&mut self) {
        self.previous_input = None;
        self.lattice = Lattice::new();
        self.completed_data = None;
        self.last_data = None;
    }

    pub fn set_keyboard_language(&mut self, language: KeyboardLanguage) {
        self.state.update_keyboard_language(language);
    }

    pub fn import_dynamic_user_dictionary(&mut self, data: Vec<DicdataElement>) {
        self.state.import_dynamic_user_dictionary(data);
    }

    pub fn update_user_dictionary_dir(&mut self, dir: PathBuf, force_reload: bool) {
        self.state.update_user_dictionary_dir(Some(dir), force_reload);
    }

    pub fn update_learning_config(&mut self, config: LearningConfig) {
        self.state.update_learning_config(config);
    }

    /// Record the prefix the user just accepted; the next request reuses
    /// the lattice of the remaining buffer.
    pub fn set_completed_data(&mut self, candidate: Candidate) {
        self.completed_data = Some(candidate);
    }

    /// Learn an accepted candidate. Persisted by
    /// [`commit_update_learning_data`](Self::commit_update_learning_data).
    pub fn update_learning_data(&mut self, candidate: &Candidate) {
        self.state.update_learning_data(candidate, self.last_data.as_ref());
        self.last_data = candidate.data.last().cloned();
    }

    pub fn update_learning_data_with_prediction(
        &mut self,
        candidate: &Candidate,
        prediction: &PostCompositionPredictionCandidate,
    ) {
        self.state.update_learning_data_with_prediction(candidate, prediction);
        self.last_data = prediction.last_data().cloned();
    }

    pub fn commit_update_learning_data(&mut self) {
        self.state.save_memory();
    }

    pub fn forget_memory(&mut self, candidate: &Candidate) {
        self.state.forget_memory(candidate);
    }

    pub fn reset_memory(&mut self) {
        self.state.reset_memory();
    }

    pub fn merge_candidates(&self, left: &Candidate, right: &Candidate) -> Candidate {
        self.kana2kanji.merge_candidates(left, right)
    }

    /// Cursor actions for bracket pairs.
    pub fn appropriate_actions(candidate: &Candidate) -> Vec<CompleteAction> {
        if CURSOR_BACK_ONE.contains(&candidate.text.as_str()) {
            vec![CompleteAction::MoveCursor(-1)]
        } else if candidate.text == "{{}}" {
            vec![CompleteAction::MoveCursor(-2)]
        } else {
            Vec::new()
        }
    }

    fn update_state(&mut self, options: &ConvertRequestOptions) {
        self.state.update_keyboard_language(options.keyboard_language);
        self.state.update_learning_config(options.learning_config());
        self.state
            .update_user_dictionary_dir(options.shared_container_dir.clone(), false);
    }

    /// Candidates for the current buffer.
    pub fn request_candidates(&mut self, text: &ComposingText, options: &ConvertRequestOptions) -> ConversionResult {
        if text.convert_target().is_empty() {
            return ConversionResult::default();
        }
        self.update_state(options);
        let need_typo_correction = options.typo_correction_enabled();
        let Some(result) = self.convert_to_lattice(text, options.n_best, need_typo_correction) else {
            return ConversionResult::default();
        };
        let conversion = self.process_result(text, &result, options);
        self.lattice = result.lattice;
        conversion
    }

    /// Pick the lattice strategy from how `text` relates to the previous
    /// buffer.
    fn convert_to_lattice(
        &mut self,
        text: &ComposingText,
        n_best: usize,
        need_typo_correction: bool,
    ) -> Option<LatticeResult> {
        if text.convert_target().is_empty() {
            return None;
        }
        let previous = self.previous_input.replace(text.clone());
        let Some(previous) = previous else {
            tracing::debug!("full rebuild for {}", text.convert_target());
            return Some(self.kana2kanji.kana2lattice_all(text, n_best, need_typo_correction, &mut self.state));
        };
        if &previous == text {
            tracing::debug!("unchanged input {}", text.convert_target());
            let lattice = std::mem::take(&mut self.lattice);
            return Some(self.kana2kanji.kana2lattice_no_change(text, lattice));
        }
        if self.completed_data.is_some() && previous.input_has_suffix(text) {
            if let Some(completed) = self.completed_data.take() {
                tracing::debug!("after completion of {}", completed.text);
                return Some(self.kana2kanji.kana2lattice_after_complete(text, &completed, &self.lattice, n_best));
            }
        }
        let diff = text.difference_suffix(&previous);
        tracing::debug!(
            "suffix change {} -> {}: {:?}",
            previous.convert_target(),
            text.convert_target(),
            diff
        );
        Some(self.kana2kanji.kana2lattice_changed(
            text,
            &diff,
            &self.lattice,
            n_best,
            need_typo_correction,
            &mut self.state,
        ))
    }

    fn special_candidates(&self, text: &ComposingText, options: &ConvertRequestOptions) -> Vec<Candidate> {
        options
            .special_candidate_providers
            .iter()
            .flat_map(|provider| provider.provide_candidates(text, options))
            .collect()
    }

    /// Spell-checker completions of the typed characters.
    fn foreign_prediction_candidates(
        &self,
        text: &ComposingText,
        language: KeyboardLanguage,
        penalty: f32,
        options: &ConvertRequestOptions,
    ) -> Vec<Candidate> {
        let (Some(checker), Some(code)) = (&options.spell_checker, language.spell_check_language()) else {
            return Vec::new();
        };
        let ruby = typed_characters(text);
        if ruby.is_empty() || (language == KeyboardLanguage::EnUs && !utils::only_roman_alphabet(&ruby)) {
            return Vec::new();
        }
        let completions = checker.completions(&ruby, code);
        if completions.is_empty() {
            return Vec::new();
        }
        let composing_count = ComposingCount::InputCount(text.input().len());
        let make = |word: &str, value: f32| {
            Candidate::new(
                word,
                value,
                composing_count.clone(),
                mid::GENERAL,
                vec![DicdataElement::with_cid(word, cid::PROPER_NOUN, mid::GENERAL, value)],
            )
        };
        let mut result = vec![make(&ruby, penalty)];
        let delta = -10.0 / completions.len() as f32;
        let mut value = FOREIGN_PENALTY + penalty;
        for word in &completions {
            result.push(make(word, value));
            value += delta;
        }
        result
    }

    fn top_level_additional_candidates(&self, text: &ComposingText, options: &ConvertRequestOptions) -> Vec<Candidate> {
        let all_ascii = text
            .input()
            .iter()
            .all(|e| matches!(e.piece, InputPiece::Character(c) if c.is_ascii()));
        if options.english_candidate_in_roman2kana_input && all_ascii {
            self.foreign_prediction_candidates(text, KeyboardLanguage::EnUs, TOP_LEVEL_FOREIGN_PENALTY, options)
        } else {
            Vec::new()
        }
    }

    /// Script variants of the whole buffer.
    fn additional_candidates(&self, text: &ComposingText, options: &ConvertRequestOptions) -> Vec<Candidate> {
        let katakana = utils::to_katakana(text.convert_target());
        let composing_count = ComposingCount::InputCount(text.input().len());
        let variant = |word: String, value: f32, data_value: f32| {
            let data = DicdataElement::word_with_cid(word.clone(), katakana.clone(), cid::PROPER_NOUN, mid::GENERAL, data_value);
            Candidate::new(word, value, composing_count.clone(), mid::GENERAL, vec![data])
        };
        let katakana_value = -14.0 * katakana_score(&katakana);
        let mut candidates = vec![
            variant(katakana.clone(), katakana_value, katakana_value),
            variant(utils::to_hiragana(&katakana), -14.5, -14.5),
            variant(katakana.to_uppercase(), -14.6, -15.0),
        ];
        if options.full_width_roman_candidate {
            candidates.push(variant(utils::to_fullwidth(&katakana), -14.7, -15.0));
        }
        if options.half_width_kana_candidate {
            candidates.push(variant(utils::to_halfwidth_katakana(&katakana), -15.0, -15.0));
        }
        candidates
    }

    /// Completions of the best path's last one or two clauses.
    fn prediction_candidates(&mut self, best: &CandidateData, text: &ComposingText) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        let mut prepart = best.clone();
        let mut last_part: Option<(crate::candidate::ClauseDataUnit, f32)> = None;
        let mut count = 0;
        while count < 2 {
            let Some((mut unit, value)) = prepart.clauses.pop() else {
                break;
            };
            let mut value = value;
            if let Some((old_unit, old_value)) = &last_part {
                unit.merge(old_unit);
                value += old_value;
            }
            let predictions = self.kana2kanji.get_prediction_candidates(
                text,
                &prepart,
                &unit,
                PREDICTION_N_BEST,
                &mut self.state,
            );
            last_part = Some((unit, value));
            if !predictions.is_empty() {
                candidates.extend(predictions);
                count += 1;
            }
        }
        candidates
    }

    fn process_result(
        &mut self,
        text: &ComposingText,
        result: &LatticeResult,
        options: &ConvertRequestOptions,
    ) -> ConversionResult {
        let no_seen = HashSet::new();
        let clause_result = result.candidate_data();
        if clause_result.is_empty() {
            let candidates = unique_candidates(self.additional_candidates(text, options), &no_seen);
            return ConversionResult {
                main_results: candidates.clone(),
                first_clause_results: candidates,
                ..Default::default()
            };
        }

        let clause_candidates: Vec<Candidate> = clause_result
            .iter()
            .map(|data| self.kana2kanji.process_clause_candidate(data))
            .collect();
        let best_for_prediction = clause_result
            .iter()
            .zip(clause_candidates.iter())
            .max_by(|a, b| a.1.value.total_cmp(&b.1.value))
            .map(|(data, _)| data.clone());
        let whole_sentence = unique_candidates(clause_candidates, &no_seen);

        let ruby = utils::to_katakana(text.convert_target());
        let user_shortcuts: Vec<Candidate> = self
            .store()
            .clone()
            .perfect_matched_user_shortcuts(&ruby, &mut self.state)
            .into_iter()
            .map(|data| {
                Candidate::new(
                    data.word.clone(),
                    data.value(),
                    ComposingCount::SurfaceCount(text.surface_len()),
                    data.mid,
                    vec![data],
                )
                .not_learning_target()
            })
            .collect();

        if options.request_query == RequestQuery::ExactMatch {
            let merged = unique_candidates(whole_sentence.into_iter().chain(user_shortcuts), &no_seen);
            let mut main_results = merged;
            main_results.sort_by(by_value);
            return ConversionResult {
                main_results,
                ..Default::default()
            };
        }

        let best_five = top(whole_sentence.clone(), MAIN_RESULT_COUNT, by_value);

        let predictions = match (&best_for_prediction, options.require_japanese_prediction) {
            (Some(best), true) => {
                let raw = self.prediction_candidates(best, text);
                top(unique_candidates(raw, &no_seen), PREDICTION_RESULT_COUNT, by_value)
            }
            _ => Vec::new(),
        };
        let mut foreign = Vec::new();
        if options.require_english_prediction {
            foreign.extend(self.foreign_prediction_candidates(text, KeyboardLanguage::EnUs, FOREIGN_PENALTY, options));
        }
        if options.keyboard_language == KeyboardLanguage::ElGr {
            foreign.extend(self.foreign_prediction_candidates(text, KeyboardLanguage::ElGr, FOREIGN_PENALTY, options));
        }
        let top_level = self.top_level_additional_candidates(text, options);

        let mut full = top(
            unique_candidates(
                best_five
                    .iter()
                    .cloned()
                    .chain(predictions.iter().cloned())
                    .chain(foreign.iter().cloned())
                    .chain(top_level)
                    .chain(user_shortcuts),
                &no_seen,
            ),
            MAIN_RESULT_COUNT,
            by_value,
        );

        // at least one candidate reading exactly the typed kana in the top 3
        let reads_input = |c: &Candidate| c.ruby() == ruby;
        if !full.iter().take(3).any(reads_input) {
            let insert_at = 2;
            if let Some(index) = full.iter().skip(3).position(reads_input) {
                let candidate = full.remove(index + 3);
                full.insert(insert_at.min(full.len()), candidate);
            } else if let Some(candidate) = best_five
                .iter()
                .chain(whole_sentence.iter())
                .find(|c| reads_input(*c))
            {
                full.insert(insert_at.min(full.len()), candidate.clone());
            }
        }

        let unique_first_clause = unique_candidates(
            clause_result.iter().filter_map(|data| {
                let (first, value) = data.clauses.first()?;
                let end = first.data_end_index.unwrap_or(0).min(data.data.len().saturating_sub(1));
                Some(Candidate::new(
                    first.text.clone(),
                    *value,
                    first.composing_count(),
                    first.mid,
                    data.data.get(..=end).map(<[_]>::to_vec).unwrap_or_default(),
                ))
            }),
            &no_seen,
        );
        let mut first_clause_results = top(unique_first_clause.clone(), MAIN_RESULT_COUNT, by_ruby_count_then_value);

        let mut seen: HashSet<String> = full.iter().map(|c| c.text.clone()).collect();
        let first_clause_candidates = top(
            unique_candidates(unique_first_clause, &seen),
            MAIN_RESULT_COUNT,
            by_ruby_count_then_value,
        );
        seen.extend(first_clause_candidates.iter().map(|c| c.text.clone()));

        let head = DualIndex::Both { input: 0, surface: 0 };
        let dictionary_candidates: Vec<Candidate> = result
            .lattice
            .nodes_at(head)
            .into_iter()
            .map(|id| {
                let node = result.lattice.node(id);
                Candidate::new(
                    node.data.word.clone(),
                    node.data.value(),
                    node.range.count(),
                    node.data.mid,
                    vec![node.data.clone()],
                )
            })
            .collect();
        let mut word_candidates = unique_candidates(
            dictionary_candidates
                .into_iter()
                .chain(self.additional_candidates(text, options)),
            &seen,
        );
        word_candidates.sort_by(by_ruby_count_then_value);
        seen.extend(word_candidates.iter().map(|c| c.text.clone()));
        let special = unique_candidates(self.special_candidates(text, options), &seen);
        let tail = word_candidates.split_off(MAIN_RESULT_COUNT.min(word_candidates.len()));
        word_candidates.extend(special);
        word_candidates.extend(tail);

        let mut main_results = full;
        main_results.extend(first_clause_candidates);
        main_results.extend(word_candidates);
        for item in main_results.iter_mut().chain(first_clause_results.iter_mut()) {
            item.with_actions(Self::appropriate_actions(item));
            item.parse_template();
        }
        ConversionResult {
            main_results,
            prediction_results: predictions,
            english_prediction_results: foreign,
            first_clause_results,
        }
    }

    /// Continuations offered right after `left` was accepted: dictionary
    /// completions of its last word first, then zero-hint words.
    pub fn request_post_composition_prediction_candidates(
        &mut self,
        left: &Candidate,
        options: &ConvertRequestOptions,
    ) -> Vec<PostCompositionPredictionCandidate> {
        self.update_state(options);
        let no_seen = HashSet::new();
        let mut joshi_count = 0;
        let zero_hint: Vec<PostCompositionPredictionCandidate> = unique_predictions(
            self.kana2kanji
                .get_zero_hint_prediction_candidates(left, POST_COMPOSITION_N_BEST),
            &no_seen,
        )
        .into_iter()
        .filter(|candidate| match &candidate.kind {
            PredictionType::Additional(data) => {
                if !cid::is_joshi(data.last().map_or(cid::EOS, |d| d.rcid)) {
                    return true;
                }
                joshi_count += 1;
                joshi_count <= POST_COMPOSITION_JOSHI_LIMIT
            }
            PredictionType::Replacement { .. } => true,
        })
        .collect();

        let completions = self.kana2kanji.get_post_composition_prediction_candidates(
            left,
            POST_COMPOSITION_N_BEST,
            &mut self.state,
        );
        let prediction_count = (POST_COMPOSITION_RESULT_COUNT / 2)
            .max(POST_COMPOSITION_RESULT_COUNT.saturating_sub(zero_hint.len()));
        let mut results = top_predictions(unique_predictions(completions, &no_seen), prediction_count);
        let seen: HashSet<String> = results.iter().map(|c| c.text.clone()).collect();
        let remaining = POST_COMPOSITION_RESULT_COUNT.saturating_sub(results.len());
        results.extend(top_predictions(unique_predictions(zero_hint, &seen), remaining));
        results
    }
}
