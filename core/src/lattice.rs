//! Conversion lattice.
//!
//! Nodes live in an arena and are bucketed by the index they start at,
//! either a keystroke index (`Input`) or a derived-kana index (`Surface`).
//! Best paths are stored in a second arena of [`RegisteredNode`]s that point
//! at their predecessor by [`PathId`]; a node's `prevs` holds the N best
//! paths reaching it, sorted by descending total value.
//!
//! Public API:
//! - `LatticeIndex`, `LatticeRange` - positions and spans in the buffer
//! - `DualIndex`, `DualIndexMap` - input/surface index correspondence
//! - `LatticeNode`, `RegisteredNode` - arena entries
//! - `Lattice` - the arena with bucket lists and path storage
use crate::candidate::{CandidateData, ClauseDataUnit, ComposingCount};
use crate::composing_text::ComposingText;
use crate::dicdata::DicdataElement;
use crate::word_class;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LatticeIndex {
    Input(usize),
    Surface(usize),
}

impl LatticeIndex {
    pub fn is_zero(&self) -> bool {
        matches!(self, LatticeIndex::Input(0) | LatticeIndex::Surface(0))
    }
}

/// Half-open span of the buffer covered by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LatticeRange {
    Input { from: usize, to: usize },
    Surface { from: usize, to: usize },
}

impl LatticeRange {
    pub const ZERO: LatticeRange = LatticeRange::Input { from: 0, to: 0 };

    pub fn count(&self) -> ComposingCount {
        match *self {
            LatticeRange::Input { from, to } => ComposingCount::InputCount(to - from),
            LatticeRange::Surface { from, to } => ComposingCount::SurfaceCount(to - from),
        }
    }

    pub fn start_index(&self) -> LatticeIndex {
        match *self {
            LatticeRange::Input { from, .. } => LatticeIndex::Input(from),
            LatticeRange::Surface { from, .. } => LatticeIndex::Surface(from),
        }
    }

    pub fn end_index(&self) -> LatticeIndex {
        match *self {
            LatticeRange::Input { to, .. } => LatticeIndex::Input(to),
            LatticeRange::Surface { to, .. } => LatticeIndex::Surface(to),
        }
    }

    /// Shift the span left by the given amounts, saturating at zero.
    pub fn shifted_back(&self, input_offset: usize, surface_offset: usize) -> Self {
        match *self {
            LatticeRange::Input { from, to } => LatticeRange::Input {
                from: from.saturating_sub(input_offset),
                to: to.saturating_sub(input_offset),
            },
            LatticeRange::Surface { from, to } => LatticeRange::Surface {
                from: from.saturating_sub(surface_offset),
                to: to.saturating_sub(surface_offset),
            },
        }
    }
}

/// A processing position that may be addressable in one or both index
/// spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DualIndex {
    Input(usize),
    Surface(usize),
    Both { input: usize, surface: usize },
}

impl DualIndex {
    pub fn input_index(&self) -> Option<usize> {
        match *self {
            DualIndex::Input(i) | DualIndex::Both { input: i, .. } => Some(i),
            DualIndex::Surface(_) => None,
        }
    }

    pub fn surface_index(&self) -> Option<usize> {
        match *self {
            DualIndex::Surface(s) | DualIndex::Both { surface: s, .. } => Some(s),
            DualIndex::Input(_) => None,
        }
    }

    pub fn is_head(&self) -> bool {
        self.input_index() == Some(0) && self.surface_index() == Some(0)
    }
}

/// Input index to surface index correspondence of one buffer.
#[derive(Debug, Clone, Default)]
pub struct DualIndexMap {
    input_to_surface: HashMap<usize, usize>,
}

impl DualIndexMap {
    pub fn new(text: &ComposingText) -> Self {
        Self {
            input_to_surface: text.input_index_to_surface_index_map(),
        }
    }

    pub fn dual_index(&self, index: LatticeIndex) -> DualIndex {
        match index {
            LatticeIndex::Input(i) => match self.input_to_surface.get(&i) {
                Some(&s) => DualIndex::Both { input: i, surface: s },
                None => DualIndex::Input(i),
            },
            LatticeIndex::Surface(s) => {
                let input = self
                    .input_to_surface
                    .iter()
                    .filter(|(_, v)| **v == s)
                    .map(|(k, _)| *k)
                    .min();
                match input {
                    Some(i) => DualIndex::Both { input: i, surface: s },
                    None => DualIndex::Surface(s),
                }
            }
        }
    }

    /// Processing order of every start position of a buffer with
    /// `input_count` keystrokes and `surface_count` kana.
    pub fn indices(&self, input_count: usize, surface_count: usize) -> Vec<DualIndex> {
        let mut indices = Vec::new();
        let mut surface_pointer = 0;
        for i in 0..input_count {
            match self.input_to_surface.get(&i) {
                Some(&s) => {
                    for j in surface_pointer.min(s)..s {
                        indices.push(DualIndex::Surface(j));
                    }
                    if surface_pointer <= s && s < surface_count {
                        indices.push(DualIndex::Both { input: i, surface: s });
                    } else {
                        indices.push(DualIndex::Input(i));
                    }
                    surface_pointer = s + 1;
                }
                None => indices.push(DualIndex::Input(i)),
            }
        }
        for j in surface_count.min(surface_pointer)..surface_count {
            indices.push(DualIndex::Surface(j));
        }
        indices
    }
}

pub type NodeId = usize;
pub type PathId = usize;

/// Path id of the sentence start in every lattice.
pub const BOS_PATH: PathId = 0;

/// One step of a best path.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredNode {
    pub data: DicdataElement,
    pub prev: Option<PathId>,
    pub total_value: f32,
    pub range: LatticeRange,
}

impl RegisteredNode {
    pub fn bos() -> Self {
        Self {
            data: DicdataElement::bos(),
            prev: None,
            total_value: 0.0,
            range: LatticeRange::ZERO,
        }
    }

    /// Start node continuing from an accepted candidate.
    pub fn from_last_candidate(last_rcid: Option<usize>, last_mid: usize) -> Self {
        Self {
            data: DicdataElement::new(
                "",
                "",
                word_class::cid::BOS,
                last_rcid.unwrap_or(word_class::cid::BOS),
                last_mid,
                0.0,
            ),
            prev: None,
            total_value: 0.0,
            range: LatticeRange::ZERO,
        }
    }
}

/// A dictionary entry placed on a span.
#[derive(Debug, Clone, PartialEq)]
pub struct LatticeNode {
    pub data: DicdataElement,
    pub range: LatticeRange,
    /// Best incoming paths, descending by total value.
    pub prevs: Vec<PathId>,
    /// Path value through this node for each entry of `prevs`.
    pub values: Vec<f32>,
}

impl LatticeNode {
    pub fn new(data: DicdataElement, range: LatticeRange) -> Self {
        Self {
            data,
            range,
            prevs: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Node attached to the sentence start.
    pub fn with_bos(data: DicdataElement, range: LatticeRange) -> Self {
        let mut node = Self::new(data, range);
        node.prevs.push(BOS_PATH);
        node
    }
}

/// Node arena with input- and surface-indexed buckets.
#[derive(Debug, Clone)]
pub struct Lattice {
    nodes: Vec<LatticeNode>,
    input_indexed: Vec<Vec<NodeId>>,
    surface_indexed: Vec<Vec<NodeId>>,
    paths: Vec<RegisteredNode>,
    generation: u64,
}

impl Default for Lattice {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            input_indexed: Vec::new(),
            surface_indexed: Vec::new(),
            paths: vec![RegisteredNode::bos()],
            generation: 0,
        }
    }
}

impl Lattice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lattice over a buffer from lookup results. Every node goes to the
    /// bucket of its own start index.
    pub fn from_raw_nodes(
        input_count: usize,
        surface_count: usize,
        raw_nodes: Vec<Vec<LatticeNode>>,
    ) -> Self {
        let mut lattice = Self {
            input_indexed: vec![Vec::new(); input_count],
            surface_indexed: vec![Vec::new(); surface_count],
            ..Self::default()
        };
        for node in raw_nodes.into_iter().flatten() {
            let bucket = match node.range.start_index() {
                LatticeIndex::Input(i) if i < input_count => &mut lattice.input_indexed[i],
                LatticeIndex::Surface(s) if s < surface_count => &mut lattice.surface_indexed[s],
                index => {
                    tracing::debug!("dropping a node starting outside the buffer: {:?}", index);
                    continue;
                }
            };
            bucket.push(lattice.nodes.len());
            lattice.nodes.push(node);
        }
        lattice
    }

    pub fn is_empty(&self) -> bool {
        self.input_indexed.is_empty() && self.surface_indexed.is_empty()
    }

    pub fn input_count(&self) -> usize {
        self.input_indexed.len()
    }

    pub fn surface_count(&self) -> usize {
        self.surface_indexed.len()
    }

    /// Bumped whenever stored paths are invalidated.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn node(&self, id: NodeId) -> &LatticeNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut LatticeNode {
        &mut self.nodes[id]
    }

    pub fn path(&self, id: PathId) -> &RegisteredNode {
        &self.paths[id]
    }

    pub fn push_path(&mut self, path: RegisteredNode) -> PathId {
        self.paths.push(path);
        self.paths.len() - 1
    }

    /// Path through `node` continuing its `index`-th best predecessor.
    pub fn register(&mut self, node: NodeId, index: usize, value: f32) -> PathId {
        let n = &self.nodes[node];
        let path = RegisteredNode {
            data: n.data.clone(),
            prev: n.prevs.get(index).copied(),
            total_value: value,
            range: n.range,
        };
        self.push_path(path)
    }

    /// Nodes starting at `index`: input bucket first, then surface bucket.
    pub fn nodes_at(&self, index: DualIndex) -> Vec<NodeId> {
        let mut ids = Vec::new();
        if let Some(bucket) = index.input_index().and_then(|i| self.input_indexed.get(i)) {
            ids.extend_from_slice(bucket);
        }
        if let Some(bucket) = index.surface_index().and_then(|s| self.surface_indexed.get(s)) {
            ids.extend_from_slice(bucket);
        }
        ids
    }

    /// Node ids in bucket order: every surface bucket, then every input
    /// bucket.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.surface_indexed
            .iter()
            .chain(self.input_indexed.iter())
            .flat_map(|bucket| bucket.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.node_ids().count()
    }

    /// Nodes starting before the given counts and ending no later.
    pub fn prefix(&self, input_count: usize, surface_count: usize) -> Lattice {
        let keep = |node: &LatticeNode| match node.range.end_index() {
            LatticeIndex::Input(v) => v <= input_count,
            LatticeIndex::Surface(v) => v <= surface_count,
        };
        let mut lattice = Lattice {
            nodes: Vec::new(),
            input_indexed: Vec::new(),
            surface_indexed: Vec::new(),
            paths: self.paths.clone(),
            generation: self.generation,
        };
        for bucket in self.input_indexed.iter().take(input_count) {
            let ids = lattice.copy_nodes(self, bucket, keep);
            lattice.input_indexed.push(ids);
        }
        for bucket in self.surface_indexed.iter().take(surface_count) {
            let ids = lattice.copy_nodes(self, bucket, keep);
            lattice.surface_indexed.push(ids);
        }
        lattice
    }

    /// The last `input_count` / `surface_count` buckets. Stored paths are
    /// dropped; callers re-attach start paths.
    pub fn suffix(&self, input_count: usize, surface_count: usize) -> Lattice {
        let mut lattice = Lattice {
            generation: self.generation + 1,
            ..Lattice::default()
        };
        let input_skip = self.input_indexed.len().saturating_sub(input_count);
        let surface_skip = self.surface_indexed.len().saturating_sub(surface_count);
        for bucket in self.input_indexed.iter().skip(input_skip) {
            let ids = lattice.copy_nodes(self, bucket, |_| true);
            lattice.input_indexed.push(ids);
        }
        for bucket in self.surface_indexed.iter().skip(surface_skip) {
            let ids = lattice.copy_nodes(self, bucket, |_| true);
            lattice.surface_indexed.push(ids);
        }
        for node in &mut lattice.nodes {
            node.prevs.clear();
            node.values.clear();
        }
        lattice
    }

    fn copy_nodes(
        &mut self,
        from: &Lattice,
        bucket: &[NodeId],
        keep: impl Fn(&LatticeNode) -> bool,
    ) -> Vec<NodeId> {
        let mut ids = Vec::new();
        for id in bucket {
            let node = &from.nodes[*id];
            if keep(node) {
                ids.push(self.nodes.len());
                self.nodes.push(node.clone());
            }
        }
        ids
    }

    /// Append `other`'s nodes bucket by bucket. Returns the new ids of the
    /// merged nodes.
    pub fn merge(&mut self, other: Lattice) -> Vec<NodeId> {
        let Lattice {
            nodes,
            input_indexed,
            surface_indexed,
            paths,
            ..
        } = other;
        // other's BOS maps onto ours; everything else is appended
        let path_offset = self.paths.len() - 1;
        let remap = |id: PathId| if id == BOS_PATH { BOS_PATH } else { id + path_offset };
        for mut path in paths.into_iter().skip(1) {
            path.prev = path.prev.map(remap);
            self.paths.push(path);
        }
        let node_offset = self.nodes.len();
        let mut merged = Vec::with_capacity(nodes.len());
        for mut node in nodes {
            node.prevs = node.prevs.into_iter().map(remap).collect();
            merged.push(self.nodes.len());
            self.nodes.push(node);
        }
        merge_buckets(&mut self.input_indexed, input_indexed, node_offset);
        merge_buckets(&mut self.surface_indexed, surface_indexed, node_offset);
        merged
    }

    /// Drop every computed path. Nodes starting at zero get the sentence
    /// start as their only predecessor.
    pub fn reset_node_states(&mut self) {
        self.paths.truncate(1);
        self.paths[BOS_PATH] = RegisteredNode::bos();
        self.generation += 1;
        for node in &mut self.nodes {
            node.prevs.clear();
            node.values.clear();
            if node.range.start_index().is_zero() {
                node.prevs.push(BOS_PATH);
            }
        }
    }

    /// Walk a path back to the start and split it into clauses.
    pub fn candidate_data(&self, path: PathId) -> CandidateData {
        let mut chain: Vec<&RegisteredNode> = Vec::new();
        let mut cursor = Some(path);
        while let Some(id) = cursor {
            let Some(node) = self.paths.get(id) else {
                break;
            };
            chain.push(node);
            cursor = node.prev;
        }
        chain.reverse();
        let Some(head) = chain.first() else {
            return CandidateData::default();
        };

        let mut clauses: Vec<(ClauseDataUnit, f32)> = Vec::new();
        let mut data: Vec<DicdataElement> = Vec::new();
        clauses.push((
            ClauseDataUnit {
                mid: head.data.mid,
                ranges: vec![head.range],
                ..Default::default()
            },
            0.0,
        ));
        for pair in chain.windows(2) {
            let (prev, node) = (pair[0], pair[1]);
            if node.data.word.is_empty() {
                continue;
            }
            let last = clauses.len() - 1;
            let continues = clauses[last].0.text.is_empty()
                || !word_class::is_clause(prev.data.rcid, node.data.lcid);
            data.push(node.data.clone());
            if continues {
                let (clause, value) = &mut clauses[last];
                clause.text.push_str(&node.data.word);
                clause.ranges.push(node.range);
                if (clause.mid == word_class::mid::EOS && node.data.mid != word_class::mid::EOS)
                    || word_class::include_mm_value_calculation(&node.data)
                {
                    clause.mid = node.data.mid;
                }
                clause.data_end_index = Some(data.len() - 1);
                *value = node.total_value;
            } else {
                clauses[last].0.next_lcid = node.data.lcid;
                let mut unit = ClauseDataUnit {
                    text: node.data.word.clone(),
                    ranges: vec![node.range],
                    data_end_index: Some(data.len() - 1),
                    ..Default::default()
                };
                if word_class::include_mm_value_calculation(&node.data) {
                    unit.mid = node.data.mid;
                }
                clauses.push((unit, node.total_value));
            }
        }
        CandidateData { clauses, data }
    }
}

fn merge_buckets(into: &mut Vec<Vec<NodeId>>, from: Vec<Vec<NodeId>>, offset: usize) {
    for (i, bucket) in from.into_iter().enumerate() {
        let ids = bucket.into_iter().map(|id| id + offset);
        match into.get_mut(i) {
            Some(existing) => existing.extend(ids),
            None => into.push(ids.collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input_piece::InputStyle;
    use crate::word_class::{cid, mid};

    fn noun(word: &str, ruby: &str) -> DicdataElement {
        DicdataElement::new(word, ruby, cid::GENERAL_NOUN, cid::GENERAL_NOUN, mid::GENERAL, -5.0)
    }

    #[test]
    fn indices_interleave_surface_positions() {
        let mut text = ComposingText::new();
        text.insert_at_cursor_position("kanto", InputStyle::Roman2Kana);
        let map = DualIndexMap::new(&text);
        let indices = map.indices(text.input().len(), text.surface_len());
        assert_eq!(indices.first(), Some(&DualIndex::Both { input: 0, surface: 0 }));
        // every surface position appears exactly once
        for s in 0..text.surface_len() {
            assert_eq!(
                indices.iter().filter(|d| d.surface_index() == Some(s)).count(),
                1
            );
        }
        assert!(indices.iter().all(|d| d.input_index().map_or(true, |i| i < 5)));
    }

    #[test]
    fn direct_input_is_fully_dual() {
        let mut text = ComposingText::new();
        text.insert_at_cursor_position("あい", InputStyle::Direct);
        let map = DualIndexMap::new(&text);
        assert_eq!(
            map.indices(2, 2),
            vec![
                DualIndex::Both { input: 0, surface: 0 },
                DualIndex::Both { input: 1, surface: 1 }
            ]
        );
        assert_eq!(
            map.dual_index(LatticeIndex::Surface(1)),
            DualIndex::Both { input: 1, surface: 1 }
        );
    }

    #[test]
    fn prefix_filters_by_end() {
        let raw = vec![
            vec![
                LatticeNode::with_bos(noun("亜", "ア"), LatticeRange::Surface { from: 0, to: 1 }),
                LatticeNode::with_bos(noun("愛", "アイ"), LatticeRange::Surface { from: 0, to: 2 }),
            ],
            vec![LatticeNode::new(noun("胃", "イ"), LatticeRange::Surface { from: 1, to: 2 })],
        ];
        let lattice = Lattice::from_raw_nodes(0, 2, raw);
        assert_eq!(lattice.len(), 3);
        let prefix = lattice.prefix(0, 1);
        assert_eq!(prefix.len(), 1);
        assert_eq!(prefix.surface_count(), 1);
        let suffix = lattice.suffix(0, 1);
        assert_eq!(suffix.len(), 1);
        assert!(suffix.node(0).prevs.is_empty());
    }

    #[test]
    fn merge_remaps_paths() {
        let mut a = Lattice::from_raw_nodes(
            0,
            2,
            vec![vec![LatticeNode::with_bos(noun("亜", "ア"), LatticeRange::Surface { from: 0, to: 1 })]],
        );
        a.register(0, 0, -5.0);
        let mut b = Lattice::from_raw_nodes(
            0,
            2,
            vec![vec![LatticeNode::new(noun("胃", "イ"), LatticeRange::Surface { from: 1, to: 2 })]],
        );
        let p = b.register(0, 0, -3.0);
        b.node_mut(0).prevs.push(p);
        let merged = a.merge(b);
        assert_eq!(merged, vec![1]);
        assert_eq!(a.nodes_at(DualIndex::Surface(1)), vec![1]);
        assert_eq!(a.node(1).prevs, vec![2]);
        assert_eq!(a.path(2).total_value, -3.0);
    }

    #[test]
    fn candidate_data_groups_clauses() {
        let mut lattice = Lattice::new();
        let kyou = lattice.push_path(RegisteredNode {
            data: noun("今日", "キョウ"),
            prev: Some(BOS_PATH),
            total_value: -5.0,
            range: LatticeRange::Surface { from: 0, to: 3 },
        });
        let ha = lattice.push_path(RegisteredNode {
            data: DicdataElement::new("は", "ハ", cid::TOPIC_HA, cid::TOPIC_HA, mid::EOS, -2.0),
            prev: Some(kyou),
            total_value: -8.0,
            range: LatticeRange::Surface { from: 3, to: 4 },
        });
        let hare = lattice.push_path(RegisteredNode {
            data: noun("晴れ", "ハレ"),
            prev: Some(ha),
            total_value: -15.0,
            range: LatticeRange::Surface { from: 4, to: 6 },
        });
        let data = lattice.candidate_data(hare);
        assert_eq!(data.data.len(), 3);
        assert_eq!(data.clauses.len(), 2);
        assert_eq!(data.clauses[0].0.text, "今日は");
        assert_eq!(data.clauses[0].1, -8.0);
        assert_eq!(data.clauses[0].0.next_lcid, cid::GENERAL_NOUN);
        assert_eq!(data.clauses[1].0.text, "晴れ");
        assert_eq!(data.clauses[1].0.data_end_index, Some(2));
    }

    #[test]
    fn reset_restores_bos_prevs() {
        let mut lattice = Lattice::from_raw_nodes(
            0,
            2,
            vec![
                vec![LatticeNode::with_bos(noun("亜", "ア"), LatticeRange::Surface { from: 0, to: 1 })],
                vec![LatticeNode::new(noun("胃", "イ"), LatticeRange::Surface { from: 1, to: 2 })],
            ],
        );
        let p = lattice.register(0, 0, -5.0);
        lattice.node_mut(1).prevs.push(p);
        lattice.reset_node_states();
        assert_eq!(lattice.node(0).prevs, vec![BOS_PATH]);
        assert!(lattice.node(1).prevs.is_empty());
        assert_eq!(lattice.generation(), 1);
    }
}
