use super::{reaches_end, Kana2Kanji, LatticeResult};
use crate::composing_text::ComposingText;
use crate::dicdata;
use crate::lattice::{DualIndexMap, Lattice, NodeId};

impl Kana2Kanji {
    /// The buffer did not change: collect the end-of-buffer paths of the
    /// cached lattice again.
    pub fn kana2lattice_no_change(&self, text: &ComposingText, previous: Lattice) -> LatticeResult {
        let mut lattice = previous;
        let map = DualIndexMap::new(text);
        let (input_count, surface_count) = (text.input().len(), text.surface_len());
        let terminal: Vec<NodeId> = lattice
            .node_ids()
            .filter(|id| {
                let node = lattice.node(*id);
                !node.prevs.is_empty()
                    && !dicdata::should_be_removed(&node.data)
                    && reaches_end(map.dual_index(node.range.end_index()), input_count, surface_count)
            })
            .collect();
        let mut result = Vec::new();
        for node in terminal {
            Self::update_result_node(&mut lattice, node, &mut result);
        }
        LatticeResult { lattice, result }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{store, text};
    use super::*;
    use crate::input_piece::InputStyle;

    #[test]
    fn same_input_yields_the_same_paths() {
        let k = Kana2Kanji::new(store("no_change", &[("漢字", "カンジ", -7.0), ("缶", "カン", -9.0)]));
        let mut state = k.store().prepare_state();
        let t = text("かんじ", InputStyle::Direct);
        let first = k.kana2lattice_all(&t, 10, false, &mut state);
        let mut expected: Vec<String> = first
            .candidate_data()
            .iter()
            .map(|d| k.process_clause_candidate(d).text)
            .collect();
        let again = k.kana2lattice_no_change(&t, first.lattice.clone());
        let mut texts: Vec<String> = again
            .candidate_data()
            .iter()
            .map(|d| k.process_clause_candidate(d).text)
            .collect();
        expected.sort();
        texts.sort();
        assert_eq!(texts, expected);
    }
}
