use super::{Kana2Kanji, LatticeResult};
use crate::candidate::Candidate;
use crate::composing_text::ComposingText;
use crate::lattice::{DualIndexMap, Lattice, NodeId, RegisteredNode};

impl Kana2Kanji {
    /// A prefix of the buffer was accepted as `completed`. The remaining
    /// nodes are reused; paths start from the accepted candidate's last
    /// word instead of the sentence start.
    pub fn kana2lattice_after_complete(
        &self,
        text: &ComposingText,
        completed: &Candidate,
        previous: &Lattice,
        n_best: usize,
    ) -> LatticeResult {
        let input_count = text.input().len();
        let surface_count = text.surface_len();
        let converted_input = previous.input_count().saturating_sub(input_count);
        let converted_surface = previous.surface_count().saturating_sub(surface_count);
        let mut lattice = previous.suffix(input_count, surface_count);
        let start = lattice.push_path(RegisteredNode::from_last_candidate(
            completed.data.last().map(|d| d.rcid),
            completed.last_mid,
        ));
        let ids: Vec<NodeId> = lattice.node_ids().collect();
        for id in ids {
            let node = lattice.node_mut(id);
            node.range = node.range.shifted_back(converted_input, converted_surface);
            if node.range.start_index().is_zero() {
                node.prevs = vec![start];
            }
        }
        tracing::trace!(
            "after completion: dropped {} keystrokes / {} kana, {} nodes left",
            converted_input,
            converted_surface,
            lattice.len()
        );
        let map = DualIndexMap::new(text);
        let indices = map.indices(input_count, surface_count);
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
