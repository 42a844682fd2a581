// core/tests/scenarios.rs
//
// End-to-end conversion scenarios over a miniature dictionary written to
// the temp directory.
//
// Tests cover:
// - romaji composition and the frozen span left by a forward delete
// - suffix differences between successive buffers
// - exact-reading candidates kept in the top three
// - dynamic user dictionary entries
// - learning through a conversion session

use kanakanji_core::word_class::{cid, mid};
use kanakanji_core::{
    ComposingText, ConvertRequestOptions, DicdataElement, DicdataMetadata, DicdataStore,
    DictionaryBuilder, InputElement, InputStyle, KanaKanjiConverter,
};
use std::path::PathBuf;
use std::sync::Arc;

fn noun(word: &str, ruby: &str, value: f32) -> DicdataElement {
    DicdataElement::new(word, ruby, cid::GENERAL_NOUN, cid::GENERAL_NOUN, mid::GENERAL, value)
}

fn build_dictionary(name: &str, entries: Vec<DicdataElement>) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("kanakanji_scenario_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let mut builder = DictionaryBuilder::new();
    builder.extend(entries);
    builder.build(&dir).expect("build dictionary");
    dir
}

fn converter(name: &str, entries: Vec<DicdataElement>) -> KanaKanjiConverter {
    let dir = build_dictionary(name, entries);
    KanaKanjiConverter::new(Arc::new(DicdataStore::new(&dir, 64)))
}

fn typed(s: &str, style: InputStyle) -> ComposingText {
    let mut text = ComposingText::new();
    text.insert_at_cursor_position(s, style);
    text
}

fn roman(c: char) -> InputElement {
    InputElement::character(c, InputStyle::Roman2Kana)
}

#[test]
fn romaji_keystrokes_compose_kana() {
    let text = typed("kanto", InputStyle::Roman2Kana);
    assert_eq!(text.convert_target(), "かんと");
    // three kana, so the cursor at the end of the buffer is 3
    assert_eq!(text.cursor(), 3);
    assert_eq!(text.input().len(), 5);
}

#[test]
fn forward_delete_freezes_the_dependent_kana() {
    let mut text = typed("akafa", InputStyle::Roman2Kana);
    assert_eq!(text.convert_target(), "あかふぁ");
    text.move_cursor_from_cursor_position(-1);
    text.delete_forward_from_cursor_position(1);
    assert_eq!(text.convert_target(), "あかふ");
    assert_eq!(
        text.input(),
        &[roman('a'), roman('k'), roman('a'), InputElement::character('ふ', InputStyle::FROZEN)]
    );
}

#[test]
fn appended_kana_is_a_pure_suffix_change() {
    let before = typed("はしる", InputStyle::Direct);
    let mut after = before.clone();
    after.insert_at_cursor_position("の", InputStyle::Direct);
    let diff = after.difference_suffix(&before);
    assert_eq!((diff.deleted_input, diff.added_input), (0, 1));
    assert_eq!((diff.deleted_surface, diff.added_surface), (0, 1));

    let before = typed("hasiru", InputStyle::Roman2Kana);
    let mut after = before.clone();
    after.insert_at_cursor_position("no", InputStyle::Roman2Kana);
    assert_eq!(after.convert_target(), "はしるの");
    let diff = after.difference_suffix(&before);
    assert_eq!((diff.deleted_input, diff.added_input), (0, 2));
    assert_eq!((diff.deleted_surface, diff.added_surface), (0, 1));
}

#[test]
fn exact_reading_stays_in_the_top_three() {
    let mut converter = converter(
        "exact_reading",
        vec![
            noun("漢字", "カンジ", -12.0),
            // strong typo-corrected and predictive competitors
            noun("岩字", "ガンジ", -3.0),
            noun("元治", "ゲンジ", -3.5),
            noun("眼地", "ガンチ", -3.2),
            noun("漢字検定", "カンジケンテイ", -1.0),
            noun("感じ方", "カンジカタ", -1.5),
        ],
    );
    let options = ConvertRequestOptions {
        need_typo_correction: Some(true),
        ..ConvertRequestOptions::default()
    };
    let result = converter.request_candidates(&typed("かんじ", InputStyle::Direct), &options);
    assert!(result.main_results.len() >= 3);
    assert!(result
        .main_results
        .iter()
        .take(3)
        .any(|c| c.ruby() == "カンジ"));
}

#[test]
fn dynamic_user_entries_are_converted() {
    let mut converter = converter("dynamic", vec![noun("テスト", "テスト", -8.0), noun("手", "テ", -6.0)]);
    converter.import_dynamic_user_dictionary(vec![DicdataElement::word_with_cid(
        "test",
        "テスト",
        cid::PROPER_NOUN,
        mid::GENERAL,
        -7.0,
    )]);
    let options = ConvertRequestOptions {
        need_typo_correction: Some(false),
        ..ConvertRequestOptions::default()
    };
    let result = converter.request_candidates(&typed("てすと", InputStyle::Direct), &options);
    let test = result
        .main_results
        .iter()
        .find(|c| c.text == "test")
        .expect("dynamic entry converted");
    assert_eq!(test.data[0].metadata, DicdataMetadata::Dynamic);
    assert!(test.data[0].is_from_user_dictionary());
    assert!(result.main_results.iter().any(|c| c.text == "テスト"));
}

#[test]
fn learned_words_move_up_and_persist() {
    let memory_dir = std::env::temp_dir().join(format!("kanakanji_scenario_memory_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&memory_dir);
    let _ = std::fs::create_dir_all(&memory_dir);
    let mut converter = converter("learning", vec![noun("漢字", "カンジ", -7.0), noun("感じ", "カンジ", -8.0)]);
    let options = ConvertRequestOptions {
        need_typo_correction: Some(false),
        memory_dir: Some(memory_dir.clone()),
        ..ConvertRequestOptions::default()
    };
    let text = typed("かんじ", InputStyle::Direct);
    let first = converter.request_candidates(&text, &options);
    assert_eq!(first.main_results[0].text, "漢字");

    let kanji = first
        .main_results
        .iter()
        .find(|c| c.text == "感じ")
        .cloned()
        .expect("感じ offered");
    converter.update_learning_data(&kanji);
    converter.stop_composition();
    let second = converter.request_candidates(&text, &options);
    assert_eq!(second.main_results[0].text, "感じ");

    converter.commit_update_learning_data();
    let persisted = converter
        .state()
        .learning()
        .persisted_entries()
        .expect("memory readable");
    assert!(persisted.iter().any(|e| e.word == "感じ"));
    let _ = std::fs::remove_dir_all(&memory_dir);
}

#[test]
fn accepted_prefix_continues_the_sentence() {
    let mut converter = converter(
        "prefix_complete",
        vec![noun("缶", "カン", -6.0), noun("字", "ジ", -6.0), noun("漢字", "カンジ", -20.0)],
    );
    let options = ConvertRequestOptions {
        need_typo_correction: Some(false),
        ..ConvertRequestOptions::default()
    };
    let mut text = typed("かんじ", InputStyle::Direct);
    let result = converter.request_candidates(&text, &options);
    let first_clause = result
        .first_clause_results
        .iter()
        .find(|c| c.text == "缶")
        .cloned()
        .expect("first clause");
    converter.set_completed_data(first_clause.clone());
    converter.update_learning_data(&first_clause);
    text.prefix_complete(&first_clause.composing_count);
    assert_eq!(text.convert_target(), "じ");
    let rest = converter.request_candidates(&text, &options);
    assert!(rest.main_results.iter().any(|c| c.text == "字"));
}
