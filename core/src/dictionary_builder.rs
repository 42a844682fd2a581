//! Writes dictionary directories.
//!
//! Layout produced by [`DictionaryBuilder::build`]:
//!
//! ```text
//! charID.chid            character id table
//! louds/{shard}.fst      fst map per leading character
//! louds/{shard}.bin      bincode Vec<Vec<DicdataRecord>>
//! ```
//!
//! plus helpers for `cb/{lcid}.binary` connection rows, `mm.binary` and
//! `p/pc_{rcid}.csv` zero-hint files, and `user.*` / `user_shortcuts.*`
//! tries inside a user dictionary directory.
use crate::dicdata::DicdataElement;
use crate::prefix_trie::{build_trie_bytes, CharIds};
use crate::utils;
use anyhow::{bail, Context};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// File stem of the system shard for readings starting with `c`.
///
/// Non-ASCII characters are used as is; ASCII is hex-escaped so shard
/// names never clash on case-insensitive file systems.
pub fn shard_identifier(c: char) -> String {
    if c.is_ascii() {
        format!("x{:02x}", c as u32)
    } else {
        c.to_string()
    }
}

/// Parse `ruby,word,lcid,rcid,mid,value`. Missing word falls back to the
/// reading, missing rcid to lcid and missing value to -30.
pub fn parse_entry_fields(fields: &[&str]) -> DicdataElement {
    let ruby = fields.first().copied().unwrap_or_default().to_string();
    let word = match fields.get(1) {
        Some(w) if !w.is_empty() => w.to_string(),
        _ => ruby.clone(),
    };
    let lcid = fields
        .get(2)
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let rcid = fields
        .get(3)
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(lcid);
    let mid = fields
        .get(4)
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let value = fields
        .get(5)
        .and_then(|s| s.trim().parse::<f32>().ok())
        .unwrap_or(-30.0);
    DicdataElement::new(word, ruby, lcid, rcid, mid, value)
}

/// Collects entries and writes a system dictionary directory.
///
/// # Example
/// ```no_run
/// use kanakanji_core::dicdata::DicdataElement;
/// use kanakanji_core::dictionary_builder::DictionaryBuilder;
///
/// let mut builder = DictionaryBuilder::new();
/// builder.add(DicdataElement::new("漢字", "カンジ", 1285, 1285, 501, -7.0));
/// builder.build("dictionary").unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct DictionaryBuilder {
    entries: Vec<DicdataElement>,
}

impl DictionaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry; hiragana readings are stored as katakana.
    pub fn add(&mut self, mut entry: DicdataElement) {
        entry.ruby = utils::to_katakana(&entry.ruby);
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = DicdataElement>) {
        for e in entries {
            self.add(e);
        }
    }

    /// Read `ruby,word,lcid,rcid,mid,value` lines. Blank lines and `#`
    /// comments are skipped.
    pub fn add_csv<P: AsRef<Path>>(&mut self, path: P) -> anyhow::Result<usize> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let before = self.entries.len();
        for line in content.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            self.add(parse_entry_fields(&fields));
        }
        Ok(self.entries.len() - before)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Character table covering every reading, in code point order.
    pub fn char_ids(&self) -> anyhow::Result<CharIds> {
        let chars: BTreeSet<char> = self
            .entries
            .iter()
            .flat_map(|e| e.ruby.chars())
            .collect();
        let text: String = chars.into_iter().collect();
        CharIds::from_chars(&text)
    }

    /// Write `charID.chid` and the `louds/` shards under `dir`.
    pub fn build<P: AsRef<Path>>(&self, dir: P) -> anyhow::Result<CharIds> {
        let dir = dir.as_ref();
        let char_ids = self.char_ids()?;
        std::fs::create_dir_all(dir.join("louds"))
            .with_context(|| format!("creating {}", dir.display()))?;
        std::fs::write(dir.join("charID.chid"), char_ids.as_string())?;

        let mut shards: BTreeMap<char, Vec<&DicdataElement>> = BTreeMap::new();
        for entry in &self.entries {
            if let Some(first) = entry.ruby.chars().next() {
                shards.entry(first).or_default().push(entry);
            }
        }
        for (first, entries) in &shards {
            let stem = dir.join("louds").join(shard_identifier(*first));
            write_trie(entries.iter().copied(), &char_ids, &stem)?;
        }
        tracing::debug!(
            "dictionary written to {}: {} entries in {} shards",
            dir.display(),
            self.entries.len(),
            shards.len()
        );
        Ok(char_ids)
    }

    /// Write `{name}.fst` / `{name}.bin` (`user` or `user_shortcuts`) into
    /// a user dictionary directory.
    pub fn build_user_dictionary<P: AsRef<Path>>(
        entries: &[DicdataElement],
        char_ids: &CharIds,
        dir: P,
        name: &str,
    ) -> anyhow::Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        let entries: Vec<DicdataElement> = entries
            .iter()
            .map(|e| {
                let mut e = e.clone();
                e.ruby = utils::to_katakana(&e.ruby);
                e
            })
            .collect();
        write_trie(entries.iter(), char_ids, &dir.join(name))
    }

    /// Write `cb/{lcid}.binary`: `(-1, default)` followed by explicit
    /// `(rcid, value)` pairs, all little-endian `(i32, f32)`.
    pub fn write_connection_row<P: AsRef<Path>>(
        dir: P,
        lcid: usize,
        default: f32,
        values: &[(usize, f32)],
    ) -> anyhow::Result<()> {
        let cb = dir.as_ref().join("cb");
        std::fs::create_dir_all(&cb)?;
        let file = File::create(cb.join(format!("{lcid}.binary")))?;
        let mut w = BufWriter::new(file);
        w.write_all(&(-1i32).to_le_bytes())?;
        w.write_all(&default.to_le_bytes())?;
        for (rcid, value) in values {
            w.write_all(&(*rcid as i32).to_le_bytes())?;
            w.write_all(&value.to_le_bytes())?;
        }
        w.flush()?;
        Ok(())
    }

    /// Write `mm.binary`, a row-major `MID_COUNT x MID_COUNT` f32 matrix.
    pub fn write_mm<P: AsRef<Path>>(dir: P, values: &[f32]) -> anyhow::Result<()> {
        let expected = crate::word_class::MID_COUNT * crate::word_class::MID_COUNT;
        if values.len() != expected {
            bail!("mm matrix needs {expected} values, got {}", values.len());
        }
        let mut bytes = Vec::with_capacity(values.len() * 4);
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        std::fs::write(dir.as_ref().join("mm.binary"), bytes)?;
        Ok(())
    }

    /// Write `p/pc_{rcid}.csv` zero-hint prediction rows.
    pub fn write_zero_hint<P: AsRef<Path>>(
        dir: P,
        rcid: usize,
        entries: &[DicdataElement],
    ) -> anyhow::Result<()> {
        let p = dir.as_ref().join("p");
        std::fs::create_dir_all(&p)?;
        let lines: Vec<String> = entries
            .iter()
            .map(|e| {
                format!(
                    "{},{},{},{},{},{}",
                    e.ruby,
                    e.word,
                    e.lcid,
                    e.rcid,
                    e.mid,
                    e.value()
                )
            })
            .collect();
        std::fs::write(p.join(format!("pc_{rcid}.csv")), lines.join("\n"))?;
        Ok(())
    }
}

fn write_trie<'e>(
    entries: impl IntoIterator<Item = &'e DicdataElement>,
    char_ids: &CharIds,
    stem: &Path,
) -> anyhow::Result<()> {
    let (fst_bytes, payloads) = build_trie_bytes(entries, char_ids)?;
    std::fs::write(stem.with_extension("fst"), fst_bytes)
        .with_context(|| format!("writing {}", stem.display()))?;
    let bin = bincode::serialize(&payloads)?;
    std::fs::write(stem.with_extension("bin"), bin)
        .with_context(|| format!("writing {}", stem.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dicdata::DicdataMetadata;
    use crate::prefix_trie::{FstTrie, PrefixTrie};

    #[test]
    fn parse_fields_with_defaults() {
        let e = parse_entry_fields(&["カンジ", "", "1285"]);
        assert_eq!(e.word, "カンジ");
        assert_eq!(e.rcid, 1285);
        assert_eq!(e.mid, 0);
        assert_eq!(e.value(), -30.0);
        let e = parse_entry_fields(&["ハ", "は", "261", "261", "500", "-3.5"]);
        assert_eq!(e.word, "は");
        assert_eq!(e.value(), -3.5);
    }

    #[test]
    fn shard_names() {
        assert_eq!(shard_identifier('カ'), "カ");
        assert_eq!(shard_identifier('A'), "x41");
        assert_eq!(shard_identifier('/'), "x2f");
    }

    #[test]
    fn build_writes_shards() {
        let dir = std::env::temp_dir().join("kanakanji_builder_test");
        let _ = std::fs::remove_dir_all(&dir);
        let mut b = DictionaryBuilder::new();
        b.add(DicdataElement::new("漢字", "かんじ", 1285, 1285, 501, -7.0));
        b.add(DicdataElement::new("今日", "キョウ", 1285, 1285, 501, -8.0));
        let ids = b.build(&dir).expect("build");
        assert!(dir.join("charID.chid").exists());
        let trie = FstTrie::load(dir.join("louds").join("カ"), DicdataMetadata::System)
            .expect("load shard");
        let index = trie.exact(&ids.encode_str("カンジ")).expect("found");
        assert_eq!(trie.payload(index)[0].word, "漢字");

        DictionaryBuilder::write_connection_row(&dir, 0, -10.0, &[(1285, -1.0)]).expect("row");
        let row = std::fs::read(dir.join("cb").join("0.binary")).expect("row");
        assert_eq!(row.len(), 16);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn mm_size_is_checked() {
        let dir = std::env::temp_dir();
        assert!(DictionaryBuilder::write_mm(&dir, &[0.0; 3]).is_err());
    }
}
