//! Process-wide dictionary store.
//!
//! `DicdataStore` owns the read-mostly parts of a dictionary directory:
//! the character id table, the system shards (loaded on first use and
//! memoized, failures included) and the connection tables. Everything that
//! changes per conversion session lives in [`DicdataStoreState`].
//!
//! Public API:
//! - `DicdataStore::lookup_dicdata` - lattice nodes for a span of the buffer
//! - `DicdataStore::prediction_dicdata` - entries whose reading extends a key
//! - `DicdataStore::zero_hint_prediction_dicdata` - `p/pc_{rcid}.csv` rows
//! - `DicdataStore::perfect_matched_user_shortcuts` - exact user shortcuts
//! - `DicdataStore::cc_value`, `DicdataStore::mm_value` - connection costs
pub mod connection;
pub mod number;
mod state;
pub mod typo;
pub mod wise;

pub use state::DicdataStoreState;

use crate::composing_text::ComposingText;
use crate::dicdata::{self, DicdataElement, DicdataMetadata, MAX_LENGTH};
use crate::dictionary_builder::{parse_entry_fields, shard_identifier};
use crate::lattice::{LatticeIndex, LatticeNode, LatticeRange};
use crate::prefix_trie::{CharIds, FstTrie, MovingTowardPrefixSearch, PrefixTrie};
use crate::utils;
use crate::word_class;
use crate::EngineConfig;
use connection::ConnectionTable;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use typo::{ProcessRange, ReadingGenerator, SurfaceGenerator, TypoCorrectionGenerator};

/// Start index of a lookup and the optional range its end must fall in.
pub type LookupRange = (usize, Option<Range<usize>>);

/// Prediction enumerates at most this many trie nodes per source.
const PREDICTION_MAX_COUNT: usize = 700;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TrieKey {
    Shard(char),
    User,
    Memory,
}

/// Everything the moving search found for one lookup.
struct PrefixSearch {
    /// Reading -> (end index, typo penalty) of the best string producing it.
    string_to_info: HashMap<Vec<char>, (LatticeIndex, f32)>,
    walkers: Vec<MovingTowardPrefixSearch>,
    /// Entries found outside the tries, with their reading length.
    additional: Vec<(usize, DicdataElement)>,
    min_count: usize,
}

pub struct DicdataStore {
    dir: PathBuf,
    char_ids: Arc<CharIds>,
    shards: RwLock<HashMap<char, Option<Arc<FstTrie>>>>,
    connection: ConnectionTable,
}

impl std::fmt::Debug for DicdataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DicdataStore")
            .field("dir", &self.dir)
            .field("chars", &self.char_ids.as_string().chars().count())
            .finish()
    }
}

impl DicdataStore {
    /// Open a dictionary directory. A missing character table leaves the
    /// store usable but empty.
    pub fn new<P: AsRef<Path>>(dir: P, connection_cache_size: usize) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let char_ids = match CharIds::load(dir.join("charID.chid")) {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!("dictionary at {} has no usable char table: {:#}", dir.display(), e);
                CharIds::default()
            }
        };
        tracing::debug!("dictionary store opened at {}", dir.display());
        Self {
            connection: ConnectionTable::new(&dir, connection_cache_size),
            dir,
            char_ids: Arc::new(char_ids),
            shards: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.dictionary_dir, config.connection_cache_size)
    }

    /// Fresh session state sharing this store's character table.
    pub fn prepare_state(&self) -> DicdataStoreState {
        DicdataStoreState::new(self.char_ids.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn char_ids(&self) -> &Arc<CharIds> {
        &self.char_ids
    }

    pub fn connection(&self) -> &ConnectionTable {
        &self.connection
    }

    pub fn cc_value(&self, former: usize, latter: usize) -> f32 {
        self.connection.cc_value(former, latter)
    }

    pub fn mm_value(&self, former: usize, latter: usize) -> f32 {
        self.connection.mm_value(former, latter)
    }

    /// System shard for readings starting with `c`.
    pub fn shard(&self, c: char) -> Option<Arc<FstTrie>> {
        if let Ok(shards) = self.shards.read() {
            if let Some(shard) = shards.get(&c) {
                return shard.clone();
            }
        }
        let stem = self.dir.join("louds").join(shard_identifier(c));
        let shard = match FstTrie::load(&stem, DicdataMetadata::System) {
            Ok(trie) => Some(Arc::new(trie)),
            Err(e) => {
                tracing::debug!("shard {} unavailable: {:#}", c, e);
                None
            }
        };
        if let Ok(mut shards) = self.shards.write() {
            shards.insert(c, shard.clone());
        }
        shard
    }

    fn trie_for(&self, key: TrieKey, state: &mut DicdataStoreState) -> Option<Arc<FstTrie>> {
        match key {
            TrieKey::Shard(c) => self.shard(c),
            TrieKey::User => state.user_trie(),
            TrieKey::Memory => state.memory_trie(),
        }
    }

    /// Lattice nodes starting at the given input and/or surface index.
    ///
    /// Nodes that start at zero get the sentence start as predecessor.
    /// Surface-indexed nodes also include synthesized entries (numbers,
    /// symbols, single kana).
    pub fn lookup_dicdata(
        &self,
        text: &ComposingText,
        input_range: Option<LookupRange>,
        surface_range: Option<LookupRange>,
        need_typo_correction: bool,
        state: &mut DicdataStoreState,
    ) -> Vec<LatticeNode> {
        if input_range.is_none() && surface_range.is_none() {
            tracing::debug!("lookup without any range");
            return Vec::new();
        }
        let input_process = match &input_range {
            Some((start, end)) => match process_range(*start, end.as_ref(), text.input().len()) {
                Some(range) => Some(range),
                None => {
                    tracing::debug!("invalid input range {}..{:?}", start, end);
                    return Vec::new();
                }
            },
            None => None,
        };
        let surface_chars: Vec<char> = utils::to_katakana(text.convert_target()).chars().collect();
        let surface_process = match &surface_range {
            Some((start, end)) => match process_range(*start, end.as_ref(), surface_chars.len()) {
                Some(range) => Some(range),
                None => {
                    tracing::debug!("invalid surface range {}..{:?}", start, end);
                    return Vec::new();
                }
            },
            None => None,
        };

        let input_start = input_range.as_ref().map(|r| r.0).unwrap_or(0);
        let surface_start = surface_range.as_ref().map(|r| r.0).unwrap_or(0);
        let need_bos = input_range.as_ref().is_some_and(|r| r.0 == 0)
            || surface_range.as_ref().is_some_and(|r| r.0 == 0);
        let make_node = |data: DicdataElement, end: LatticeIndex| {
            let range = match end {
                LatticeIndex::Input(e) => LatticeRange::Input {
                    from: input_start,
                    to: e + 1,
                },
                LatticeIndex::Surface(e) => LatticeRange::Surface {
                    from: surface_start,
                    to: e + 1,
                },
            };
            if need_bos {
                LatticeNode::with_bos(data, range)
            } else {
                LatticeNode::new(data, range)
            }
        };

        let search = self.moving_toward_prefix_search(
            text,
            input_process.as_ref(),
            surface_process.as_ref(),
            &surface_chars,
            need_typo_correction,
            state,
        );

        let mut nodes = Vec::new();
        let mut push_penalized = |data: &DicdataElement| {
            let ruby: Vec<char> = data.ruby.chars().collect();
            let Some((end, penalty)) = search.string_to_info.get(&ruby) else {
                return;
            };
            if let Some(data) = dicdata::penalized(data, ruby.len(), *penalty) {
                nodes.push(make_node(data, *end));
            }
        };
        for (_, data) in search
            .additional
            .iter()
            .filter(|(len, _)| *len >= search.min_count)
        {
            push_penalized(data);
        }
        let min_depth = search.min_count.saturating_sub(1);
        for walker in &search.walkers {
            let indices = walker.indices_from_depth(min_depth);
            for data in walker.trie().entries(&indices) {
                push_penalized(&data);
            }
        }

        if let Some(process) = &surface_process {
            for i in process.right_range.clone() {
                let segment: String = surface_chars[process.left..=i].iter().collect();
                let wise = wise::wise_dicdata(
                    &segment,
                    process.left..i + 1,
                    &surface_chars,
                    state.keyboard_language,
                );
                nodes.extend(
                    wise.into_iter()
                        .map(|data| make_node(data, LatticeIndex::Surface(i))),
                );
            }
        }
        tracing::trace!(
            "lookup input {:?} surface {:?}: {} nodes",
            input_range,
            surface_range,
            nodes.len()
        );
        nodes
    }

    fn moving_toward_prefix_search(
        &self,
        text: &ComposingText,
        input_process: Option<&ProcessRange>,
        surface_process: Option<&ProcessRange>,
        surface_chars: &[char],
        need_typo_correction: bool,
        state: &mut DicdataStoreState,
    ) -> PrefixSearch {
        let surface = surface_process.map(|range| SurfaceGenerator::new(surface_chars.to_vec(), range.clone()));
        let typo = match input_process {
            Some(range) if need_typo_correction => {
                Some(TypoCorrectionGenerator::new(text.input(), range.clone()))
            }
            _ => None,
        };
        let mut generator = ReadingGenerator::new(surface, typo);
        let use_memory = state.learning().enabled();

        let mut walkers: HashMap<TrieKey, Option<MovingTowardPrefixSearch>> = HashMap::new();
        let mut found: Vec<(Vec<char>, LatticeIndex, f32)> = Vec::new();
        let mut additional: Vec<(usize, DicdataElement)> = Vec::new();
        let mut seen_additional: HashSet<(usize, String, String, usize, usize, usize)> = HashSet::new();

        while let Some(reading) = generator.next() {
            let Some(&first) = reading.chars.first() else {
                continue;
            };
            let keys = self.char_ids.encode(&reading.chars);
            let mut tries = vec![TrieKey::Shard(first), TrieKey::User];
            if use_memory {
                tries.push(TrieKey::Memory);
            }

            let mut updated = false;
            let mut available_max = 0;
            for key in tries {
                let walker = walkers
                    .entry(key)
                    .or_insert_with(|| self.trie_for(key, state).map(|trie| trie.walker()));
                if let Some(walker) = walker {
                    let result = walker.update(&keys);
                    updated |= result.updated;
                    available_max = available_max.max(result.available_max_index);
                }
            }

            let mut collected = Vec::new();
            if use_memory {
                let (temporary, temporary_max) =
                    state.learning().moving_toward_prefix_search_on_temporary(&keys);
                available_max = available_max.max(temporary_max);
                collected.extend(
                    temporary
                        .into_iter()
                        .flat_map(|(len, entries)| entries.into_iter().map(move |e| (len, e))),
                );
            }
            if !state.dynamic_user_dictionary().is_empty() {
                // dynamic entries keep their readings reachable like a trie would
                let reach = state
                    .dynamic_user_dictionary()
                    .iter()
                    .map(|e| {
                        e.ruby
                            .chars()
                            .zip(&reading.chars)
                            .take_while(|(a, b)| a == *b)
                            .count()
                    })
                    .max()
                    .unwrap_or(0);
                if let Some(index) = reach.checked_sub(1) {
                    available_max = available_max.max(index);
                }
                let ruby: String = reading.chars.iter().collect();
                collected.extend(
                    self.match_dynamic_user_dict(&ruby, state)
                        .into_iter()
                        .map(|e| (reading.chars.len(), e)),
                );
            }
            for (len, data) in collected {
                let key = (
                    len,
                    data.ruby.clone(),
                    data.word.clone(),
                    data.lcid,
                    data.rcid,
                    data.mid,
                );
                if seen_additional.insert(key) {
                    updated = true;
                    additional.push((len, data));
                }
            }

            if available_max + 1 < reading.chars.len() {
                generator.set_unreachable_path(&reading.chars[..=available_max + 1]);
            }
            if updated {
                found.push((reading.chars, reading.end, reading.penalty));
            }
        }

        let min_count = found
            .iter()
            .map(|(chars, _, _)| chars.len())
            .min()
            .unwrap_or(0);
        let mut string_to_info: HashMap<Vec<char>, (LatticeIndex, f32)> = HashMap::new();
        for (chars, end, penalty) in found {
            match string_to_info.entry(chars) {
                Entry::Vacant(slot) => {
                    slot.insert((end, penalty));
                }
                Entry::Occupied(mut slot) => {
                    let (current_end, current_penalty) = *slot.get();
                    let surface_wins = matches!(
                        (current_end, end),
                        (LatticeIndex::Input(_), LatticeIndex::Surface(_))
                    );
                    if penalty < current_penalty || (penalty == current_penalty && surface_wins) {
                        slot.insert((end, penalty));
                    }
                }
            }
        }
        PrefixSearch {
            string_to_info,
            walkers: walkers.into_values().flatten().collect(),
            additional,
            min_count,
        }
    }

    /// User shortcuts registered for exactly `ruby`.
    pub fn perfect_matched_user_shortcuts(
        &self,
        ruby: &str,
        state: &mut DicdataStoreState,
    ) -> Vec<DicdataElement> {
        let Some(trie) = state.user_shortcuts_trie() else {
            return Vec::new();
        };
        let keys = self.char_ids.encode_str(&utils::to_katakana(ruby));
        trie.exact(&keys)
            .map(|index| trie.payload(index))
            .unwrap_or_default()
    }

    /// Entries whose reading starts with `key`.
    ///
    /// Short keys only look a few characters ahead. Entries whose right
    /// class cannot end a prediction are skipped.
    pub fn prediction_dicdata(&self, key: &str, state: &mut DicdataStoreState) -> Vec<DicdataElement> {
        let key = utils::to_katakana(key);
        let chars: Vec<char> = key.chars().collect();
        let Some(&first) = chars.first() else {
            return Vec::new();
        };
        let max_depth = match chars.len() {
            1 => 3,
            2 => 5,
            _ => usize::MAX,
        };
        let keys = self.char_ids.encode(&chars);

        let mut result: Vec<DicdataElement> = Vec::new();
        if let Some(shard) = self.shard(first) {
            let indices = shard.prefix_node_indices(&keys, max_depth, PREDICTION_MAX_COUNT);
            result.extend(
                shard
                    .entries(&indices)
                    .into_iter()
                    .filter(|e| word_class::prediction_usable(e.rcid)),
            );
        }
        if let Some(user) = state.user_trie() {
            let indices = user.prefix_node_indices(&keys, usize::MAX, PREDICTION_MAX_COUNT);
            result.extend(user.entries(&indices));
        }
        if state.learning().enabled() {
            if let Some(memory) = state.memory_trie() {
                let indices = memory.prefix_node_indices(&keys, usize::MAX, PREDICTION_MAX_COUNT);
                result.extend(memory.entries(&indices));
            }
            result.extend(state.learning().temporary_prefix_match(&keys));
        }
        result
    }

    /// Zero-hint predictions following a word whose right class is `rcid`.
    pub fn zero_hint_prediction_dicdata(&self, rcid: usize) -> Vec<DicdataElement> {
        let path = self.dir.join("p").join(format!("pc_{rcid}.csv"));
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("zero-hint file {} unavailable: {}", path.display(), e);
                return Vec::new();
            }
        };
        content
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(|line| {
                let fields: Vec<&str> = line.split(',').collect();
                parse_entry_fields(&fields)
            })
            .collect()
    }

    /// Dynamic user dictionary entries read exactly `ruby`.
    pub fn match_dynamic_user_dict(&self, ruby: &str, state: &DicdataStoreState) -> Vec<DicdataElement> {
        let ruby = utils::to_katakana(ruby);
        state
            .dynamic_user_dictionary()
            .iter()
            .filter(|e| e.ruby == ruby)
            .cloned()
            .collect()
    }

    /// Dynamic user dictionary entries whose reading starts with `ruby`.
    pub fn prefix_match_dynamic_user_dict(&self, ruby: &str, state: &DicdataStoreState) -> Vec<DicdataElement> {
        let ruby = utils::to_katakana(ruby);
        state
            .dynamic_user_dictionary()
            .iter()
            .filter(|e| e.ruby.starts_with(&ruby))
            .cloned()
            .collect()
    }
}

/// Clamp a lookup request to the buffer. `None` when nothing is left.
fn process_range(start: usize, end: Option<&Range<usize>>, len: usize) -> Option<ProcessRange> {
    let left = end.map(|r| r.start).unwrap_or(start);
    if left < start {
        return None;
    }
    let right = end
        .map(|r| r.end)
        .unwrap_or(len)
        .min(len)
        .min(start + MAX_LENGTH);
    if left >= right {
        return None;
    }
    Some(ProcessRange {
        left: start,
        right_range: left..right,
    })
}
