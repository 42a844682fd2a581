//! Local learning store.
//!
//! Accepted candidates are first kept in a temporary memory that lookups
//! and prediction search directly. `save()` folds them into a `redb`
//! database under the memory directory; the persisted rows are served to
//! lookups as the `memory` trie.
//!
//! Public API:
//! - `LearningType` / `LearningConfig` - what to learn and where
//! - `LearningStore` - update/forget/reset/save operations
//! - `LearningManager` - reference store (temporary memory + redb)
use crate::dicdata::{DicdataElement, DicdataMetadata, DicdataRecord, MAX_LENGTH};
use crate::prefix_trie::{CharIds, FstTrie, UNKNOWN_CHAR_ID};
use crate::word_class;
use anyhow::Context;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name of the learning database inside the memory directory.
pub const MEMORY_FILE: &str = "memory.redb";

const MEMORY_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("memory");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LearningType {
    /// Learned data is used for conversion and updated on commit.
    #[default]
    InputAndOutput,
    /// Learned data is used but never updated.
    OnlyOutput,
    Nothing,
}

impl LearningType {
    pub fn need_update_memory(&self) -> bool {
        *self == LearningType::InputAndOutput
    }

    pub fn need_using_memory(&self) -> bool {
        *self != LearningType::Nothing
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningConfig {
    pub learning_type: LearningType,
    pub max_memory_count: usize,
    /// Without a directory nothing is persisted; temporary memory still works.
    pub memory_dir: Option<PathBuf>,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_type: LearningType::InputAndOutput,
            max_memory_count: 65536,
            memory_dir: None,
        }
    }
}

/// Operations a learning backend provides to the converter.
pub trait LearningStore {
    /// Learn the words of an accepted candidate.
    fn update(&mut self, data: &[DicdataElement]);
    /// Learn `update_part` as a continuation of `data`.
    fn update_with_replacement(&mut self, data: &[DicdataElement], update_part: &[DicdataElement]);
    /// Forget every learned entry sharing reading and surface with `data`.
    fn forget(&mut self, data: &[DicdataElement]);
    fn reset(&mut self);
    fn save(&mut self);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MemoryRecord {
    record: DicdataRecord,
    count: u32,
}

#[derive(Debug, Clone, PartialEq)]
struct MemoryEntry {
    element: DicdataElement,
    count: u32,
}

impl MemoryEntry {
    fn same_word(&self, other: &DicdataElement) -> bool {
        self.element.word == other.word
            && self.element.lcid == other.lcid
            && self.element.rcid == other.rcid
            && self.element.mid == other.mid
    }

    fn learned(&self) -> DicdataElement {
        learned_element(&self.element, self.count)
    }
}

/// Value of a word learned `count` times. Particles and other entries whose
/// value is not worth remembering keep their base value.
pub fn learned_value(data: &DicdataElement, count: u32) -> f32 {
    let base = data.value();
    if !word_class::need_w_value_memory(data) {
        return base;
    }
    (base.max(-10.0) + 2.0 * (1.0 + count as f32).ln()).min(-0.5)
}

fn learned_element(data: &DicdataElement, count: u32) -> DicdataElement {
    let delta = learned_value(data, count) - data.value();
    data.adjusted(delta).with_metadata(DicdataMetadata::Learned)
}

fn row_key(data: &DicdataElement) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}",
        data.ruby, data.word, data.lcid, data.rcid, data.mid
    )
}

/// Reference learning backend.
pub struct LearningManager {
    config: LearningConfig,
    char_ids: Arc<CharIds>,
    /// Pending entries keyed by the char-id encoding of their reading.
    temporary: BTreeMap<Vec<u8>, Vec<MemoryEntry>>,
}

impl std::fmt::Debug for LearningManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LearningManager")
            .field("config", &self.config)
            .field("temporary", &self.temporary.len())
            .finish()
    }
}

impl LearningManager {
    pub fn new(char_ids: Arc<CharIds>) -> Self {
        Self::with_config(char_ids, LearningConfig::default())
    }

    pub fn with_config(char_ids: Arc<CharIds>, config: LearningConfig) -> Self {
        Self {
            config,
            char_ids,
            temporary: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Learned data takes part in conversion.
    pub fn enabled(&self) -> bool {
        self.config.learning_type.need_using_memory()
    }

    /// Replace the configuration. Returns whether anything changed.
    pub fn update_config(&mut self, config: LearningConfig) -> bool {
        if self.config == config {
            return false;
        }
        if self.config.memory_dir != config.memory_dir && !self.temporary.is_empty() {
            // pending data belongs to the old directory
            self.save();
        }
        if !config.learning_type.need_using_memory() {
            self.temporary.clear();
        }
        tracing::debug!("learning config updated: {:?}", config);
        self.config = config;
        true
    }

    fn encode(&self, ruby: &str) -> Option<Vec<u8>> {
        let chars = self.char_ids.encode_str(ruby);
        if chars.is_empty() || chars.contains(&UNKNOWN_CHAR_ID) {
            None
        } else {
            Some(chars)
        }
    }

    fn memorize(&mut self, data: &DicdataElement) {
        if data.word.is_empty() || data.ruby_count() > MAX_LENGTH {
            return;
        }
        let Some(key) = self.encode(&data.ruby) else {
            tracing::trace!("not learning {}: reading has unknown characters", data.ruby);
            return;
        };
        let entries = self.temporary.entry(key).or_default();
        match entries.iter_mut().find(|e| e.same_word(data)) {
            Some(entry) => entry.count = entry.count.saturating_add(1),
            None => {
                let base = DicdataElement::new(
                    data.word.clone(),
                    data.ruby.clone(),
                    data.lcid,
                    data.rcid,
                    data.mid,
                    data.base_value(),
                );
                entries.push(MemoryEntry {
                    element: base,
                    count: 1,
                });
            }
        }
    }

    /// The whole phrase as one entry.
    fn concatenated(data: &[DicdataElement]) -> Option<DicdataElement> {
        let (first, last) = (data.first()?, data.last()?);
        let word: String = data.iter().map(|d| d.word.as_str()).collect();
        let ruby: String = data.iter().map(|d| d.ruby.as_str()).collect();
        let value: f32 = data.iter().map(|d| d.value()).sum();
        Some(DicdataElement::new(
            word,
            ruby,
            first.lcid,
            last.rcid,
            last.mid,
            value.max(-15.0),
        ))
    }

    /// Temporary entries whose reading is a prefix of `chars`, keyed by
    /// reading length, and the deepest index of `chars` some entry reaches.
    pub fn moving_toward_prefix_search_on_temporary(
        &self,
        chars: &[u8],
    ) -> (BTreeMap<usize, Vec<DicdataElement>>, usize) {
        let mut found = BTreeMap::new();
        let mut available_max_index = 0;
        for len in 1..=chars.len() {
            let prefix = &chars[..len];
            let reachable = self
                .temporary
                .range(prefix.to_vec()..)
                .next()
                .is_some_and(|(key, _)| key.starts_with(prefix));
            if !reachable {
                break;
            }
            available_max_index = len - 1;
            if let Some(entries) = self.temporary.get(prefix) {
                found.insert(len, entries.iter().map(MemoryEntry::learned).collect());
            }
        }
        (found, available_max_index)
    }

    /// Temporary entries whose reading starts with `chars`.
    pub fn temporary_prefix_match(&self, chars: &[u8]) -> Vec<DicdataElement> {
        self.temporary
            .range(chars.to_vec()..)
            .take_while(|(key, _)| key.starts_with(chars))
            .flat_map(|(_, entries)| entries.iter().map(MemoryEntry::learned))
            .collect()
    }

    /// Temporary entries with exactly the reading `chars`.
    pub fn temporary_perfect_match(&self, chars: &[u8]) -> Vec<DicdataElement> {
        self.temporary
            .get(chars)
            .map(|entries| entries.iter().map(MemoryEntry::learned).collect())
            .unwrap_or_default()
    }

    fn db_path(&self) -> Option<PathBuf> {
        self.config
            .memory_dir
            .as_ref()
            .map(|dir| dir.join(MEMORY_FILE))
    }

    fn open_db(path: &Path) -> anyhow::Result<Database> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        Database::create(path).with_context(|| format!("opening {}", path.display()))
    }

    /// Persisted entries with their learned values.
    pub fn persisted_entries(&self) -> anyhow::Result<Vec<DicdataElement>> {
        let Some(path) = self.db_path() else {
            return Ok(Vec::new());
        };
        if !path.exists() {
            return Ok(Vec::new());
        }
        let db = Self::open_db(&path)?;
        let read_txn = db.begin_read()?;
        let table = match read_txn.open_table(MEMORY_TABLE) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for item in table.iter()? {
            let (_, v) = item?;
            match bincode::deserialize::<MemoryRecord>(v.value()) {
                Ok(row) => out.push(learned_element(&row.record.to_element(), row.count)),
                Err(e) => tracing::warn!("skipping broken learning row: {}", e),
            }
        }
        Ok(out)
    }

    /// Build the `memory` trie from persisted rows.
    pub fn memory_trie(&self) -> Option<FstTrie> {
        let entries = match self.persisted_entries() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("learning memory unavailable: {:#}", e);
                return None;
            }
        };
        if entries.is_empty() {
            return None;
        }
        match FstTrie::from_entries(entries.iter(), &self.char_ids, DicdataMetadata::Learned) {
            Ok(trie) => Some(trie),
            Err(e) => {
                tracing::warn!("building memory trie failed: {:#}", e);
                None
            }
        }
    }

    fn flush(&mut self, path: &Path) -> anyhow::Result<usize> {
        let db = Self::open_db(path)?;
        let write_txn = db.begin_write()?;
        let written;
        {
            let mut table = write_txn.open_table(MEMORY_TABLE)?;
            let mut pending = 0;
            for entry in self.temporary.values().flatten() {
                let key = row_key(&entry.element);
                let previous = match table.get(key.as_str())? {
                    Some(v) => bincode::deserialize::<MemoryRecord>(v.value())
                        .map(|r| r.count)
                        .unwrap_or(0),
                    None => 0,
                };
                let row = MemoryRecord {
                    record: DicdataRecord::from(&entry.element),
                    count: previous.saturating_add(entry.count),
                };
                let bytes = bincode::serialize(&row)?;
                table.insert(key.as_str(), bytes.as_slice())?;
                pending += 1;
            }
            written = pending;

            let len = table.len()? as usize;
            if len > self.config.max_memory_count {
                let mut counts: Vec<(String, u32)> = Vec::with_capacity(len);
                for item in table.iter()? {
                    let (k, v) = item?;
                    let count = bincode::deserialize::<MemoryRecord>(v.value())
                        .map(|r| r.count)
                        .unwrap_or(0);
                    counts.push((k.value().to_string(), count));
                }
                counts.sort_by_key(|(_, count)| *count);
                let evict = len - self.config.max_memory_count;
                for (key, _) in counts.into_iter().take(evict) {
                    table.remove(key.as_str())?;
                }
                tracing::debug!("evicted {} learned entries", evict);
            }
        }
        write_txn.commit()?;
        Ok(written)
    }

    fn remove_persisted(&self, data: &[DicdataElement]) -> anyhow::Result<()> {
        let Some(path) = self.db_path() else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }
        let db = Self::open_db(&path)?;
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(MEMORY_TABLE)?;
            let prefixes: Vec<String> = data
                .iter()
                .map(|d| format!("{}\t{}\t", d.ruby, d.word))
                .collect();
            let mut doomed = Vec::new();
            for item in table.iter()? {
                let (k, _) = item?;
                let key = k.value();
                if prefixes.iter().any(|p| key.starts_with(p.as_str())) {
                    doomed.push(key.to_string());
                }
            }
            for key in doomed {
                table.remove(key.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Learned counts currently pending, by reading and word.
    pub fn pending_counts(&self) -> HashMap<(String, String), u32> {
        let mut out = HashMap::new();
        for entry in self.temporary.values().flatten() {
            *out.entry((entry.element.ruby.clone(), entry.element.word.clone()))
                .or_insert(0) += entry.count;
        }
        out
    }
}

impl LearningStore for LearningManager {
    fn update(&mut self, data: &[DicdataElement]) {
        if !self.config.learning_type.need_update_memory() {
            return;
        }
        for d in data {
            self.memorize(d);
        }
        if data.len() > 1 {
            if let Some(phrase) = Self::concatenated(data) {
                self.memorize(&phrase);
            }
        }
    }

    fn update_with_replacement(&mut self, data: &[DicdataElement], update_part: &[DicdataElement]) {
        if !self.config.learning_type.need_update_memory() {
            return;
        }
        for d in update_part {
            self.memorize(d);
        }
        let whole: Vec<DicdataElement> = data.iter().chain(update_part).cloned().collect();
        if whole.len() > 1 {
            if let Some(phrase) = Self::concatenated(&whole) {
                self.memorize(&phrase);
            }
        }
    }

    fn forget(&mut self, data: &[DicdataElement]) {
        for d in data {
            if let Some(key) = self.encode(&d.ruby) {
                if let Some(entries) = self.temporary.get_mut(&key) {
                    entries.retain(|e| e.element.word != d.word);
                    if entries.is_empty() {
                        self.temporary.remove(&key);
                    }
                }
            }
        }
        if let Err(e) = self.remove_persisted(data) {
            tracing::warn!("forgetting learned entries failed: {:#}", e);
        }
    }

    fn reset(&mut self) {
        self.temporary.clear();
        if let Some(path) = self.db_path() {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    tracing::warn!("removing {} failed: {}", path.display(), e);
                }
            }
        }
    }

    fn save(&mut self) {
        if self.temporary.is_empty() {
            return;
        }
        let Some(path) = self.db_path() else {
            tracing::debug!("no memory directory; learned data stays temporary");
            return;
        };
        match self.flush(&path) {
            Ok(written) => {
                tracing::debug!("saved {} learned entries to {}", written, path.display());
                self.temporary.clear();
            }
            Err(e) => tracing::warn!("saving learning memory failed: {:#}", e),
        }
    }
}
