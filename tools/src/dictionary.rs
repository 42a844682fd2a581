use anyhow::{Context, Result};
use kanakanji_core::dictionary_builder::parse_entry_fields;
use kanakanji_core::prefix_trie::{CharIds, UNKNOWN_CHAR_ID};
use kanakanji_core::utils::to_katakana;
use kanakanji_core::{DicdataElement, DicdataMetadata, DictionaryBuilder};
use std::path::{Path, PathBuf};

/// Build a system dictionary from CSV files. Returns the entry count.
pub fn build_system(inputs: &[PathBuf], out: &Path) -> Result<usize> {
    let mut builder = DictionaryBuilder::new();
    for input in inputs {
        let added = builder.add_csv(input)?;
        tracing::info!("{}: {} entries", input.display(), added);
    }
    builder.build(out)?;
    Ok(builder.len())
}

/// Build a user dictionary encoded with the system dictionary's character ids.
pub fn build_user(inputs: &[PathBuf], dictionary: &Path, out: &Path, shortcuts: bool) -> Result<usize> {
    let char_ids = CharIds::load(dictionary.join("charID.chid"))
        .with_context(|| format!("{} is not a system dictionary", dictionary.display()))?;
    let mut entries = Vec::new();
    for input in inputs {
        entries.extend(read_user_entries(input)?);
    }
    // characters missing from the system table cannot be searched
    let unknown = entries
        .iter()
        .filter(|e| char_ids.encode_str(&to_katakana(&e.ruby)).contains(&UNKNOWN_CHAR_ID))
        .count();
    if unknown > 0 {
        tracing::warn!("{} entries use characters outside charID.chid", unknown);
    }
    let name = if shortcuts { "user_shortcuts" } else { "user" };
    DictionaryBuilder::build_user_dictionary(&entries, &char_ids, out, name)?;
    Ok(entries.len())
}

fn read_user_entries(path: &Path) -> Result<Vec<DicdataElement>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(content
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
        .map(|l| {
            let fields: Vec<&str> = l.split(',').collect();
            parse_entry_fields(&fields).with_metadata(DicdataMetadata::UserDictionary)
        })
        .collect())
}
