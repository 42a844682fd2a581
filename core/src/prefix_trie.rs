//! Prefix tries over character-id keys.
//!
//! Dictionary readings are stored as byte strings of character ids (see
//! [`CharIds`]) in an `fst::Map` whose value is an index into a bincode
//! payload vector of [`DicdataRecord`] lists.
//!
//! Public API:
//! - `PrefixTrie` - exact, prefix enumeration and incremental walks
//! - `FstTrie` - fst map + bincode payload implementation
//! - `MovingTowardPrefixSearch` - incremental walker reused across
//!   readings that share a prefix
//! - `CharIds` - character to id table (`charID.chid`)
use crate::dicdata::{DicdataElement, DicdataMetadata, DicdataRecord};
use anyhow::{bail, Context};
use fst::raw::Output;
use fst::{Map, MapBuilder};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

/// Id given to characters missing from the table.
pub const UNKNOWN_CHAR_ID: u8 = u8::MAX;

/// Character to small integer id table.
///
/// The file is UTF-8 text; the i-th character has id i.
#[derive(Debug, Clone, Default)]
pub struct CharIds {
    ids: HashMap<char, u8>,
    chars: Vec<char>,
}

impl CharIds {
    pub fn from_chars(text: &str) -> anyhow::Result<Self> {
        let chars: Vec<char> = text.chars().filter(|c| *c != '\n').collect();
        if chars.len() > UNKNOWN_CHAR_ID as usize {
            bail!("{} characters do not fit in u8 ids", chars.len());
        }
        let ids = chars
            .iter()
            .enumerate()
            .map(|(i, c)| (*c, i as u8))
            .collect();
        Ok(Self { ids, chars })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading char id table {}", path.display()))?;
        Self::from_chars(&text)
    }

    pub fn id(&self, c: char) -> u8 {
        self.ids.get(&c).copied().unwrap_or(UNKNOWN_CHAR_ID)
    }

    pub fn encode(&self, chars: &[char]) -> Vec<u8> {
        chars.iter().map(|c| self.id(*c)).collect()
    }

    pub fn encode_str(&self, s: &str) -> Vec<u8> {
        s.chars().map(|c| self.id(c)).collect()
    }

    pub fn as_string(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

/// Position inside a trie: a node address plus the output accumulated on
/// the way there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrieCursor {
    addr: usize,
    output: u64,
}

/// A step taken by [`PrefixTrie::step`]: the child cursor and, when the
/// child ends a stored key, its payload index.
pub type TrieStep = (TrieCursor, Option<usize>);

/// Read-only prefix trie keyed by character ids.
pub trait PrefixTrie: Send + Sync {
    fn root(&self) -> TrieCursor;

    /// Follow the edge labelled `key` from `from`.
    fn step(&self, from: TrieCursor, key: u8) -> Option<TrieStep>;

    /// All outgoing edges of `from`, ordered by key.
    fn children(&self, from: TrieCursor) -> Vec<(u8, TrieStep)>;

    /// Entries stored under a payload index.
    fn payload(&self, index: usize) -> Vec<DicdataElement>;

    /// Payload index of exactly `keys`.
    fn exact(&self, keys: &[u8]) -> Option<usize> {
        let mut cursor = self.root();
        let mut found = None;
        for key in keys {
            let (next, index) = self.step(cursor, *key)?;
            cursor = next;
            found = index;
        }
        found
    }

    /// Payload indices of stored keys that extend `keys` by 1 to
    /// `max_depth` characters, breadth first, at most `max_count` of them.
    fn prefix_node_indices(&self, keys: &[u8], max_depth: usize, max_count: usize) -> Vec<usize> {
        let mut cursor = self.root();
        let mut own = None;
        for key in keys {
            match self.step(cursor, *key) {
                Some((next, index)) => {
                    cursor = next;
                    own = index;
                }
                None => return Vec::new(),
            }
        }
        let mut result: Vec<usize> = own.into_iter().collect();
        let mut frontier = vec![cursor];
        let mut depth = 0;
        while !frontier.is_empty() && depth < max_depth && result.len() < max_count {
            let mut next_frontier = Vec::new();
            for node in frontier {
                for (_, (child, index)) in self.children(node) {
                    if let Some(index) = index {
                        result.push(index);
                        if result.len() >= max_count {
                            return result;
                        }
                    }
                    next_frontier.push(child);
                }
            }
            frontier = next_frontier;
            depth += 1;
        }
        result
    }

    /// Incremental walker over this trie.
    fn walker(self: Arc<Self>) -> MovingTowardPrefixSearch
    where
        Self: Sized + 'static,
    {
        MovingTowardPrefixSearch::new(self)
    }

    /// Payload entries for a list of indices.
    fn entries(&self, indices: &[usize]) -> Vec<DicdataElement> {
        let mut seen = ahash::AHashSet::new();
        indices
            .iter()
            .filter(|i| seen.insert(**i))
            .flat_map(|i| self.payload(*i))
            .collect()
    }
}

/// Incremental exact-match walker.
///
/// Successive calls to [`update`](Self::update) with readings that share a
/// prefix reuse the nodes already visited.
pub struct MovingTowardPrefixSearch {
    trie: Arc<dyn PrefixTrie>,
    /// (depth, payload index) of every key found so far
    indices: Vec<(usize, usize)>,
    stack: Vec<(TrieCursor, u8)>,
}

/// Outcome of one [`MovingTowardPrefixSearch::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkResult {
    /// New stored keys were found.
    pub updated: bool,
    /// Deepest index of `target` reachable in the trie.
    pub available_max_index: usize,
}

impl MovingTowardPrefixSearch {
    pub fn new(trie: Arc<dyn PrefixTrie>) -> Self {
        Self {
            trie,
            indices: Vec::new(),
            stack: Vec::new(),
        }
    }

    pub fn trie(&self) -> &Arc<dyn PrefixTrie> {
        &self.trie
    }

    pub fn update(&mut self, target: &[u8]) -> WalkResult {
        let mut updated = false;
        let mut available_max_index = 0;
        for (i, key) in target.iter().enumerate() {
            if let Some((_, seen)) = self.stack.get(i) {
                if seen == key {
                    available_max_index = i;
                    continue;
                }
                self.stack.truncate(i);
            }
            let from = self
                .stack
                .last()
                .map(|(cursor, _)| *cursor)
                .unwrap_or_else(|| self.trie.root());
            match self.trie.step(from, *key) {
                Some((cursor, index)) => {
                    if let Some(index) = index {
                        self.indices.push((i, index));
                        updated = true;
                    }
                    available_max_index = i;
                    self.stack.push((cursor, *key));
                }
                None => break,
            }
        }
        WalkResult {
            updated,
            available_max_index,
        }
    }

    /// Payload indices found at depth `min_depth` or deeper.
    pub fn indices_from_depth(&self, min_depth: usize) -> Vec<usize> {
        self.indices
            .iter()
            .filter(|(depth, _)| *depth >= min_depth)
            .map(|(_, index)| *index)
            .collect()
    }
}

/// `fst::Map` keyed by character ids with bincode payloads.
pub struct FstTrie {
    map: Map<Vec<u8>>,
    payloads: Vec<Vec<DicdataRecord>>,
    metadata: DicdataMetadata,
}

impl std::fmt::Debug for FstTrie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FstTrie")
            .field("keys", &self.map.len())
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl FstTrie {
    pub fn new(
        map: Map<Vec<u8>>,
        payloads: Vec<Vec<DicdataRecord>>,
        metadata: DicdataMetadata,
    ) -> Self {
        Self {
            map,
            payloads,
            metadata,
        }
    }

    /// Load `{stem}.fst` and `{stem}.bin`.
    pub fn load<P: AsRef<Path>>(stem: P, metadata: DicdataMetadata) -> anyhow::Result<Self> {
        let stem = stem.as_ref();
        let fst_path = stem.with_extension("fst");
        let bin_path = stem.with_extension("bin");
        let buf = std::fs::read(&fst_path)
            .with_context(|| format!("reading {}", fst_path.display()))?;
        let map = Map::new(buf).with_context(|| format!("parsing {}", fst_path.display()))?;
        let bytes = std::fs::read(&bin_path)
            .with_context(|| format!("reading {}", bin_path.display()))?;
        let payloads: Vec<Vec<DicdataRecord>> = bincode::deserialize(&bytes)
            .with_context(|| format!("decoding {}", bin_path.display()))?;
        Ok(Self::new(map, payloads, metadata))
    }

    /// Build an in-memory trie from entries.
    pub fn from_entries<'e>(
        entries: impl IntoIterator<Item = &'e DicdataElement>,
        char_ids: &CharIds,
        metadata: DicdataMetadata,
    ) -> anyhow::Result<Self> {
        let (map_bytes, payloads) = build_trie_bytes(entries, char_ids)?;
        let map = Map::new(map_bytes)?;
        Ok(Self::new(map, payloads, metadata))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn final_index(&self, addr: usize, output: u64) -> Option<usize> {
        let node = self.map.as_fst().node(addr);
        if node.is_final() {
            Some(Output::new(output).cat(node.final_output()).value() as usize)
        } else {
            None
        }
    }
}

impl PrefixTrie for FstTrie {
    fn root(&self) -> TrieCursor {
        TrieCursor {
            addr: self.map.as_fst().root().addr(),
            output: 0,
        }
    }

    fn step(&self, from: TrieCursor, key: u8) -> Option<TrieStep> {
        let fst = self.map.as_fst();
        let node = fst.node(from.addr);
        let i = node.find_input(key)?;
        let t = node.transition(i);
        let output = Output::new(from.output).cat(t.out).value();
        let cursor = TrieCursor {
            addr: t.addr,
            output,
        };
        Some((cursor, self.final_index(t.addr, output)))
    }

    fn children(&self, from: TrieCursor) -> Vec<(u8, TrieStep)> {
        let fst = self.map.as_fst();
        let node = fst.node(from.addr);
        node.transitions()
            .map(|t| {
                let output = Output::new(from.output).cat(t.out).value();
                let cursor = TrieCursor {
                    addr: t.addr,
                    output,
                };
                (t.inp, (cursor, self.final_index(t.addr, output)))
            })
            .collect()
    }

    fn payload(&self, index: usize) -> Vec<DicdataElement> {
        self.payloads
            .get(index)
            .map(|records| {
                records
                    .iter()
                    .map(|r| r.to_element().with_metadata(self.metadata))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Serialize entries into fst bytes plus the payload vector. Entries with
/// the same reading share one payload slot.
pub fn build_trie_bytes<'e>(
    entries: impl IntoIterator<Item = &'e DicdataElement>,
    char_ids: &CharIds,
) -> anyhow::Result<(Vec<u8>, Vec<Vec<DicdataRecord>>)> {
    let mut grouped: BTreeMap<Vec<u8>, Vec<DicdataRecord>> = BTreeMap::new();
    for entry in entries {
        if entry.ruby.is_empty() {
            continue;
        }
        grouped
            .entry(char_ids.encode_str(&entry.ruby))
            .or_default()
            .push(DicdataRecord::from(entry));
    }
    let mut builder = MapBuilder::new(Vec::new())?;
    let mut payloads = Vec::with_capacity(grouped.len());
    for (i, (key, records)) in grouped.into_iter().enumerate() {
        builder.insert(&key, i as u64)?;
        payloads.push(records);
    }
    Ok((builder.into_inner()?, payloads))
}
