use super::{Kana2Kanji, LatticeResult};
use crate::composing_text::ComposingText;
use crate::dictionary::DicdataStoreState;
use crate::lattice::{DualIndexMap, Lattice};

impl Kana2Kanji {
    /// Build the lattice for the whole buffer from scratch.
    pub fn kana2lattice_all(
        &self,
        text: &ComposingText,
        n_best: usize,
        need_typo_correction: bool,
        state: &mut DicdataStoreState,
    ) -> LatticeResult {
        let input_count = text.input().len();
        let surface_count = text.surface_len();
        let map = DualIndexMap::new(text);
        let indices = map.indices(input_count, surface_count);
        let raw_nodes = indices
            .iter()
            .map(|index| {
                let input_range = index.input_index().map(|i| (i, None));
                let surface_range = index.surface_index().map(|s| (s, None));
                self.store
                    .lookup_dicdata(text, input_range, surface_range, need_typo_correction, state)
            })
            .collect();
        let mut lattice = Lattice::from_raw_nodes(input_count, surface_count, raw_nodes);
        tracing::trace!("full lattice: {} nodes over {} positions", lattice.len(), indices.len());
        let result = self.propagate(
            &mut lattice,
            &map,
            &indices,
            (input_count, surface_count),
            n_best,
            None,
        );
        LatticeResult { lattice, result }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{store, text};
    use super::*;
    use crate::input_piece::InputStyle;

    fn ranked(k: &Kana2Kanji, result: &LatticeResult) -> Vec<(String, f32)> {
        let mut candidates: Vec<(String, f32)> = result
            .candidate_data()
            .iter()
            .map(|data| {
                let c = k.process_clause_candidate(data);
                (c.text, c.value)
            })
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        candidates
    }

    #[test]
    fn best_path_uses_the_strongest_word() {
        let k = Kana2Kanji::new(store("all_direct", &[("漢字", "カンジ", -7.0), ("感じ", "カンジ", -8.0), ("缶", "カン", -9.0)]));
        let mut state = k.store().prepare_state();
        let result = k.kana2lattice_all(&text("かんじ", InputStyle::Direct), 10, false, &mut state);
        let ranked = ranked(&k, &result);
        assert_eq!(ranked[0].0, "漢字");
        assert!(ranked.iter().any(|(t, _)| t == "感じ"));
        for data in result.candidate_data() {
            let ruby: String = data.data.iter().map(|d| d.ruby.as_str()).collect();
            assert_eq!(ruby, "カンジ");
        }
    }

    #[test]
    fn roman_input_reaches_the_surface_end() {
        let k = Kana2Kanji::new(store("all_roman", &[("漢字", "カンジ", -7.0), ("缶", "カン", -9.0)]));
        let mut state = k.store().prepare_state();
        let t = text("kanji", InputStyle::Roman2Kana);
        let result = k.kana2lattice_all(&t, 10, false, &mut state);
        assert_eq!(result.lattice.input_count(), 5);
        assert_eq!(result.lattice.surface_count(), 3);
        assert_eq!(ranked(&k, &result)[0].0, "漢字");
    }

    #[test]
    fn n_best_bounds_predecessors() {
        let k = Kana2Kanji::new(store("all_nbest", &[("缶", "カン", -9.0), ("館", "カン", -9.5), ("巻", "カン", -10.0), ("字", "ジ", -8.0)]));
        let mut state = k.store().prepare_state();
        let result = k.kana2lattice_all(&text("かんじ", InputStyle::Direct), 2, false, &mut state);
        for id in result.lattice.node_ids() {
            assert!(result.lattice.node(id).prevs.len() <= 2);
        }
        assert!(!result.result.is_empty());
    }
}
