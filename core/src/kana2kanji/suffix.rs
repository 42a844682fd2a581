use super::{reaches_end, Kana2Kanji, LatticeResult};
use crate::composing_text::{ComposingText, DifferenceSuffix};
use crate::dicdata;
use crate::dictionary::DicdataStoreState;
use crate::lattice::{DualIndexMap, Lattice, LatticeIndex, NodeId};
use std::collections::HashSet;

impl Kana2Kanji {
    /// The buffer's tail changed: keep the nodes lying inside the common
    /// prefix together with their scores and rescore only what touches the
    /// new tail.
    pub fn kana2lattice_changed(
        &self,
        text: &ComposingText,
        diff: &DifferenceSuffix,
        previous: &Lattice,
        n_best: usize,
        need_typo_correction: bool,
        state: &mut DicdataStoreState,
    ) -> LatticeResult {
        let input_count = text.input().len();
        let surface_count = text.surface_len();
        let common_input = previous.input_count().saturating_sub(diff.deleted_input);
        let common_surface = previous.surface_count().saturating_sub(diff.deleted_surface);
        let map = DualIndexMap::new(text);
        let indices = map.indices(input_count, surface_count);
        let mut lattice = previous.prefix(common_input, common_surface);
        let prefix_nodes: Vec<NodeId> = lattice.node_ids().collect();

        let mut merged: HashSet<NodeId> = HashSet::new();
        if diff.added_input > 0 || diff.added_surface > 0 {
            let raw_nodes = indices
                .iter()
                .map(|index| {
                    let input_range = index.input_index().and_then(|i| {
                        let from = common_input.max(i);
                        (from < input_count).then(|| (i, Some(from..input_count)))
                    });
                    let surface_range = index.surface_index().and_then(|s| {
                        let from = common_surface.max(s);
                        (from < surface_count).then(|| (s, Some(from..surface_count)))
                    });
                    if input_range.is_none() && surface_range.is_none() {
                        return Vec::new();
                    }
                    self.store
                        .lookup_dicdata(text, input_range, surface_range, need_typo_correction, state)
                })
                .collect();
            let added = Lattice::from_raw_nodes(input_count, surface_count, raw_nodes);
            merged = lattice.merge(added).into_iter().collect();

            // connect the kept nodes that end where the new tail starts
            for &node in &prefix_nodes {
                let current = lattice.node(node);
                if current.prevs.is_empty() || dicdata::should_be_removed(&current.data) {
                    continue;
                }
                let next = map.dual_index(current.range.end_index());
                if reaches_end(next, input_count, surface_count) {
                    continue;
                }
                let next_nodes: Vec<NodeId> = lattice
                    .nodes_at(next)
                    .into_iter()
                    .filter(|id| merged.contains(id))
                    .collect();
                self.update_next_nodes(&mut lattice, node, &next_nodes, n_best);
            }
        }

        let mut terminal = merged;
        terminal.extend(prefix_nodes.into_iter().filter(|id| {
            match lattice.node(*id).range.end_index() {
                LatticeIndex::Input(i) => i == input_count,
                LatticeIndex::Surface(s) => s == surface_count,
            }
        }));
        tracing::trace!(
            "suffix change: kept {} of {} positions, rescoring {} nodes",
            common_input.max(common_surface),
            indices.len(),
            terminal.len()
        );
        let result = self.propagate(
            &mut lattice,
            &map,
            &indices,
            (input_count, surface_count),
            n_best,
            Some(&terminal),
        );
        LatticeResult { lattice, result }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{store, text};
    use super::*;
    use crate::input_piece::InputStyle;

    fn texts(k: &Kana2Kanji, result: &LatticeResult) -> Vec<String> {
        let mut texts: Vec<String> = result
            .candidate_data()
            .iter()
            .map(|d| k.process_clause_candidate(d).text)
            .collect();
        texts.sort();
        texts.dedup();
        texts
    }

    #[test]
    fn appended_input_matches_a_full_rebuild() {
        let k = Kana2Kanji::new(store(
            "changed_append",
            &[("漢字", "カンジ", -7.0), ("缶", "カン", -9.0), ("字", "ジ", -8.0), ("漢", "カン", -9.5)],
        ));
        let mut state = k.store().prepare_state();
        let before = text("かん", InputStyle::Direct);
        let first = k.kana2lattice_all(&before, 10, false, &mut state);
        let after = text("かんじ", InputStyle::Direct);
        let diff = after.difference_suffix(&before);
        let changed = k.kana2lattice_changed(&after, &diff, &first.lattice, 10, false, &mut state);
        let full = k.kana2lattice_all(&after, 10, false, &mut state);
        assert_eq!(texts(&k, &changed), texts(&k, &full));
        assert!(texts(&k, &changed).contains(&"漢字".to_string()));
    }

    #[test]
    fn deletion_keeps_the_prefix_paths() {
        let k = Kana2Kanji::new(store("changed_delete", &[("漢字", "カンジ", -7.0), ("缶", "カン", -9.0)]));
        let mut state = k.store().prepare_state();
        let before = text("かんじ", InputStyle::Direct);
        let first = k.kana2lattice_all(&before, 10, false, &mut state);
        let after = text("かん", InputStyle::Direct);
        let diff = after.difference_suffix(&before);
        assert_eq!(diff.added_surface, 0);
        let changed = k.kana2lattice_changed(&after, &diff, &first.lattice, 10, false, &mut state);
        let texts = texts(&k, &changed);
        assert!(texts.contains(&"缶".to_string()));
        assert!(!texts.iter().any(|t| t.contains("漢字")));
    }
}
