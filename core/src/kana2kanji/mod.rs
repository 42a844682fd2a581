//! Lattice strategies and path scoring.
//!
//! Every strategy returns a [`LatticeResult`]: the lattice to cache for
//! the next request and the best paths reaching the end of the buffer.
//! Path values follow one rule everywhere: a node's value for a
//! predecessor path is `path.total + w(node)`, plus `cc(prev, node)` for
//! nodes at the head of the buffer; the connection cost to a following
//! node is added when a path is registered into it.
//!
//! Public API:
//! - `Kana2Kanji::kana2lattice_all` - full rebuild
//! - `Kana2Kanji::kana2lattice_no_change` - reuse of an identical buffer
//! - `Kana2Kanji::kana2lattice_changed` - suffix replacement
//! - `Kana2Kanji::kana2lattice_after_complete` - after a prefix was accepted
//! - `Kana2Kanji::process_clause_candidate` - path to candidate
//! - `Kana2Kanji::get_prediction_candidates` - completions of the last clause
use crate::candidate::{Candidate, CandidateData, ComposingCount};
use crate::dicdata;
use crate::dictionary::DicdataStore;
use crate::lattice::{DualIndex, DualIndexMap, Lattice, NodeId, PathId};
use crate::word_class::{self, mid};
use std::collections::HashSet;
use std::sync::Arc;

mod full;
mod prediction;
mod prefix_completion;
mod suffix;
mod unchanged;

/// A computed lattice and the paths that reach the end of the buffer.
#[derive(Debug, Clone, Default)]
pub struct LatticeResult {
    pub lattice: Lattice,
    /// Registered end-of-buffer paths, unsorted.
    pub result: Vec<PathId>,
}

impl LatticeResult {
    /// Clause data of every end-of-buffer path.
    pub fn candidate_data(&self) -> Vec<CandidateData> {
        self.result
            .iter()
            .map(|path| self.lattice.candidate_data(*path))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Kana2Kanji {
    store: Arc<DicdataStore>,
}

impl Kana2Kanji {
    pub fn new(store: Arc<DicdataStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<DicdataStore> {
        &self.store
    }

    /// Candidate for a whole path, adding the semantic connection of
    /// consecutive clauses.
    pub fn process_clause_candidate(&self, data: &CandidateData) -> Candidate {
        let mut mm_value = 0.0;
        let mut last_mid = mid::EOS;
        let mut text = String::new();
        let mut composing_count = ComposingCount::InputCount(0);
        for (clause, _) in &data.clauses {
            mm_value += self.store.mm_value(last_mid, clause.mid);
            last_mid = clause.mid;
            text.push_str(&clause.text);
            for range in &clause.ranges {
                composing_count = ComposingCount::composite(composing_count, range.count());
            }
        }
        let value = data.clauses.last().map(|(_, v)| *v).unwrap_or(0.0) + mm_value;
        Candidate::new(text, value, composing_count, last_mid, data.data.clone())
    }

    /// Concatenate two consecutive candidates.
    pub fn merge_candidates(&self, left: &Candidate, right: &Candidate) -> Candidate {
        let (Some(left_last), Some(right_first)) = (left.data.last(), right.data.first()) else {
            return if left.data.is_empty() { right.clone() } else { left.clone() };
        };
        let cc_value = self.store.cc_value(left_last.rcid, right_first.lcid);
        let mm_value = if word_class::include_mm_value_calculation(right_first) {
            self.store.mm_value(left.last_mid, right_first.mid)
        } else {
            0.0
        };
        let last_mid = if right.last_mid == mid::EOS {
            left.last_mid
        } else {
            right.last_mid
        };
        let mut data = left.data.clone();
        data.extend(right.data.iter().cloned());
        let mut merged = Candidate::new(
            format!("{}{}", left.text, right.text),
            left.value + right.value + cc_value + mm_value,
            ComposingCount::composite(left.composing_count.clone(), right.composing_count.clone()),
            last_mid,
            data,
        );
        merged.actions = right.actions.clone();
        merged.inputable = left.inputable && right.inputable;
        merged.is_learning_target = left.is_learning_target && right.is_learning_target;
        merged
    }

    /// Fill `node`'s values from its predecessors. `false` when the node
    /// has no predecessor or falls below the admission threshold.
    fn compute_values(&self, lattice: &mut Lattice, node: NodeId, is_head: bool) -> bool {
        let current = lattice.node(node);
        if current.prevs.is_empty() || dicdata::should_be_removed(&current.data) {
            return false;
        }
        let w_value = current.data.value();
        let lcid = current.data.lcid;
        let values: Vec<f32> = current
            .prevs
            .iter()
            .map(|prev| {
                let path = lattice.path(*prev);
                let cc = if is_head {
                    self.store.cc_value(path.data.rcid, lcid)
                } else {
                    0.0
                };
                path.total_value + w_value + cc
            })
            .collect();
        lattice.node_mut(node).values = values;
        true
    }

    /// Forward pass over `indices`: fill each node's values, then hand its
    /// paths to the following nodes or to the result. With `only`, nodes
    /// outside the set are neither processed nor offered paths.
    fn propagate(
        &self,
        lattice: &mut Lattice,
        map: &DualIndexMap,
        indices: &[DualIndex],
        counts: (usize, usize),
        n_best: usize,
        only: Option<&HashSet<NodeId>>,
    ) -> Vec<PathId> {
        let (input_count, surface_count) = counts;
        let allowed = |id: &NodeId| only.map_or(true, |set| set.contains(id));
        let mut result = Vec::new();
        for index in indices {
            for node in lattice.nodes_at(*index).into_iter().filter(allowed) {
                if !self.compute_values(lattice, node, index.is_head()) {
                    continue;
                }
                let next = map.dual_index(lattice.node(node).range.end_index());
                if reaches_end(next, input_count, surface_count) {
                    Self::update_result_node(lattice, node, &mut result);
                } else {
                    let next_nodes: Vec<NodeId> = lattice.nodes_at(next).into_iter().filter(allowed).collect();
                    self.update_next_nodes(lattice, node, &next_nodes, n_best);
                }
            }
        }
        result
    }

    /// Register every path through `node` into the end-of-buffer list.
    fn update_result_node(lattice: &mut Lattice, node: NodeId, result: &mut Vec<PathId>) {
        let values = lattice.node(node).values.clone();
        for (index, value) in values.into_iter().enumerate() {
            result.push(lattice.register(node, index, value));
        }
    }

    /// Offer every path through `node` to the nodes starting where it ends,
    /// keeping at most `n_best` predecessors per node, best first.
    fn update_next_nodes(&self, lattice: &mut Lattice, node: NodeId, next_nodes: &[NodeId], n_best: usize) {
        let rcid = lattice.node(node).data.rcid;
        let values = lattice.node(node).values.clone();
        for &next in next_nodes {
            if dicdata::should_be_removed(&lattice.node(next).data) {
                continue;
            }
            let cc_value = self.store.cc_value(rcid, lattice.node(next).data.lcid);
            for (index, value) in values.iter().enumerate() {
                let new_value = cc_value + value;
                let position = lattice
                    .node(next)
                    .prevs
                    .iter()
                    .rposition(|p| lattice.path(*p).total_value >= new_value)
                    .map_or(0, |i| i + 1);
                if position >= n_best {
                    continue;
                }
                let path = lattice.register(node, index, new_value);
                let prevs = &mut lattice.node_mut(next).prevs;
                if prevs.len() >= n_best {
                    prevs.pop();
                }
                prevs.insert(position.min(prevs.len()), path);
            }
        }
    }
}

/// Whether a node ending at `index` closes the buffer.
fn reaches_end(index: DualIndex, input_count: usize, surface_count: usize) -> bool {
    index.input_index() == Some(input_count) || index.surface_index() == Some(surface_count)
}
