//! Candidate types produced by the converter.
//!
//! Public API:
//! - `ComposingCount` - how much of the composing buffer a candidate consumes
//! - `CompleteAction` - side effect requested when a candidate is accepted
//! - `Candidate` - one ranked conversion result
//! - `ClauseDataUnit` / `CandidateData` - a lattice path grouped into clauses
use crate::dicdata::DicdataElement;
use crate::lattice::LatticeRange;
use crate::template;
use crate::word_class::{self, cid, mid};
use serde::{Deserialize, Serialize};

/// Amount of the composing buffer covered by a candidate.
///
/// `InputCount` counts keystrokes, `SurfaceCount` counts derived kana. A
/// candidate built from mixed lattice spans carries a `Composite`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ComposingCount {
    InputCount(usize),
    SurfaceCount(usize),
    Composite(Box<ComposingCount>, Box<ComposingCount>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CountKind {
    Input,
    Surface,
}

impl ComposingCount {
    /// Concatenate two counts. Counts of the same kind are summed.
    pub fn composite(lhs: ComposingCount, rhs: ComposingCount) -> ComposingCount {
        match (lhs, rhs) {
            (ComposingCount::InputCount(l), ComposingCount::InputCount(r)) => {
                ComposingCount::InputCount(l + r)
            }
            (ComposingCount::SurfaceCount(l), ComposingCount::SurfaceCount(r)) => {
                ComposingCount::SurfaceCount(l + r)
            }
            (lhs, rhs) => ComposingCount::Composite(Box::new(lhs), Box::new(rhs)),
        }
    }

    /// Zero-free sequence with adjacent runs of the same kind merged.
    fn flatten(&self) -> Vec<(CountKind, usize)> {
        match self {
            ComposingCount::InputCount(0) | ComposingCount::SurfaceCount(0) => Vec::new(),
            ComposingCount::InputCount(n) => vec![(CountKind::Input, *n)],
            ComposingCount::SurfaceCount(n) => vec![(CountKind::Surface, *n)],
            ComposingCount::Composite(lhs, rhs) => {
                let mut left = lhs.flatten();
                let right = rhs.flatten();
                let mut rest = right.into_iter();
                if let (Some(last), Some(first)) = (left.last_mut(), rest.as_slice().first()) {
                    if last.0 == first.0 {
                        last.1 += first.1;
                        rest.next();
                    }
                }
                left.extend(rest);
                left
            }
        }
    }
}

impl PartialEq for ComposingCount {
    fn eq(&self, other: &Self) -> bool {
        self.flatten() == other.flatten()
    }
}

impl Eq for ComposingCount {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompleteAction {
    /// Move the cursor by the given offset after insertion.
    MoveCursor(isize),
}

/// A single conversion candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub text: String,
    pub value: f32,
    pub composing_count: ComposingCount,
    /// Last meaning id, used to continue scoring in prediction.
    pub last_mid: usize,
    pub data: Vec<DicdataElement>,
    pub actions: Vec<CompleteAction>,
    pub inputable: bool,
    /// Total reading length in characters.
    pub ruby_count: usize,
    /// Shortcuts and expanded templates are not learned.
    pub is_learning_target: bool,
}

impl Candidate {
    pub fn new(
        text: impl Into<String>,
        value: f32,
        composing_count: ComposingCount,
        last_mid: usize,
        data: Vec<DicdataElement>,
    ) -> Self {
        let ruby_count = data.iter().map(|d| d.ruby.chars().count()).sum();
        Self {
            text: text.into(),
            value,
            composing_count,
            last_mid,
            data,
            actions: Vec::new(),
            inputable: true,
            ruby_count,
            is_learning_target: true,
        }
    }

    pub fn not_learning_target(mut self) -> Self {
        self.is_learning_target = false;
        self
    }

    pub fn with_actions(&mut self, actions: Vec<CompleteAction>) {
        self.actions = actions;
    }

    /// Expand `<date ...>` and `<random ...>` templates in `text`.
    ///
    /// `data` keeps the raw template words; an expanded candidate stops
    /// being a learning target.
    pub fn parse_template(&mut self) {
        let expanded = template::expand(&self.text);
        if expanded != self.text {
            self.text = expanded;
            self.is_learning_target = false;
        }
    }

    /// Reading of the candidate in katakana.
    pub fn ruby(&self) -> String {
        self.data.iter().map(|d| d.ruby.as_str()).collect()
    }

    /// Candidate for the first clause of `data`, treating `data` as a sentence.
    pub fn make_prefix_clause_candidate(data: &[DicdataElement]) -> Candidate {
        let mut text = String::new();
        let mut composing_count = 0;
        let mut last_rcid = cid::BOS;
        let mut last_mid = mid::GENERAL;
        let mut clause = Vec::new();
        for item in data {
            if word_class::is_clause(last_rcid, item.lcid) {
                break;
            }
            text.push_str(&item.word);
            composing_count += item.ruby.chars().count();
            last_rcid = item.rcid;
            if item.mid != mid::EOS && word_class::include_mm_value_calculation(item) {
                last_mid = item.mid;
            }
            clause.push(item.clone());
        }
        Candidate::new(
            text,
            -5.0,
            ComposingCount::SurfaceCount(composing_count),
            last_mid,
            clause,
        )
    }
}

/// One clause of a lattice path.
#[derive(Debug, Clone)]
pub struct ClauseDataUnit {
    pub mid: usize,
    /// Left class id of the clause that follows.
    pub next_lcid: usize,
    pub text: String,
    pub ranges: Vec<LatticeRange>,
    /// Last index into `CandidateData::data` belonging to this clause.
    pub data_end_index: Option<usize>,
}

impl Default for ClauseDataUnit {
    fn default() -> Self {
        Self {
            mid: mid::EOS,
            next_lcid: cid::EOS,
            text: String::new(),
            ranges: Vec::new(),
            data_end_index: None,
        }
    }
}

impl PartialEq for ClauseDataUnit {
    fn eq(&self, other: &Self) -> bool {
        self.mid == other.mid
            && self.next_lcid == other.next_lcid
            && self.text == other.text
            && self.ranges == other.ranges
    }
}

impl ClauseDataUnit {
    /// Append `unit` to this clause.
    pub fn merge(&mut self, unit: &ClauseDataUnit) {
        self.text.push_str(&unit.text);
        self.ranges.extend(unit.ranges.iter().copied());
        self.next_lcid = unit.next_lcid;
    }

    /// Composing count spanned by the clause.
    pub fn composing_count(&self) -> ComposingCount {
        self.ranges
            .iter()
            .fold(ComposingCount::InputCount(0), |acc, r| {
                ComposingCount::composite(acc, r.count())
            })
    }
}

/// A lattice path split into clauses, each with its cumulative value.
#[derive(Debug, Clone, Default)]
pub struct CandidateData {
    pub clauses: Vec<(ClauseDataUnit, f32)>,
    pub data: Vec<DicdataElement>,
}

impl CandidateData {
    pub fn last_clause(&self) -> Option<&ClauseDataUnit> {
        self.clauses.last().map(|(c, _)| c)
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_collapses_like_kinds() {
        let c = ComposingCount::composite(
            ComposingCount::InputCount(2),
            ComposingCount::InputCount(3),
        );
        assert!(matches!(c, ComposingCount::InputCount(5)));
        let mixed = ComposingCount::composite(
            ComposingCount::InputCount(2),
            ComposingCount::SurfaceCount(1),
        );
        assert!(matches!(mixed, ComposingCount::Composite(_, _)));
    }

    #[test]
    fn equality_uses_flattened_form() {
        let nested = ComposingCount::Composite(
            Box::new(ComposingCount::Composite(
                Box::new(ComposingCount::InputCount(0)),
                Box::new(ComposingCount::SurfaceCount(2)),
            )),
            Box::new(ComposingCount::SurfaceCount(3)),
        );
        assert_eq!(nested, ComposingCount::SurfaceCount(5));
        assert_ne!(nested, ComposingCount::InputCount(5));
        assert_eq!(ComposingCount::InputCount(0), ComposingCount::SurfaceCount(0));
    }

    #[test]
    fn ruby_count_sums_readings() {
        let data = vec![
            DicdataElement::new("今日", "キョウ", 1285, 1285, 501, -8.0),
            DicdataElement::new("は", "ハ", 261, 261, 501, -3.0),
        ];
        let c = Candidate::new("今日は", -11.0, ComposingCount::SurfaceCount(4), 501, data);
        assert_eq!(c.ruby_count, 4);
        assert_eq!(c.ruby(), "キョウハ");
        assert!(c.is_learning_target);
    }

    #[test]
    fn prefix_clause_stops_at_boundary() {
        let data = vec![
            DicdataElement::new("今日", "キョウ", cid::GENERAL_NOUN, cid::GENERAL_NOUN, 501, -8.0),
            DicdataElement::new("は", "ハ", cid::TOPIC_HA, cid::TOPIC_HA, mid::EOS, -3.0),
            DicdataElement::new("晴れ", "ハレ", cid::GENERAL_NOUN, cid::GENERAL_NOUN, 501, -9.0),
        ];
        let c = Candidate::make_prefix_clause_candidate(&data);
        assert_eq!(c.text, "今日は");
        assert_eq!(c.composing_count, ComposingCount::SurfaceCount(4));
        assert_eq!(c.value, -5.0);
    }

    #[test]
    fn clause_merge_extends_ranges() {
        let mut a = ClauseDataUnit {
            text: "今日".into(),
            ranges: vec![LatticeRange::Surface { from: 0, to: 3 }],
            ..Default::default()
        };
        let b = ClauseDataUnit {
            text: "は".into(),
            next_lcid: 7,
            ranges: vec![LatticeRange::Surface { from: 3, to: 4 }],
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.text, "今日は");
        assert_eq!(a.next_lcid, 7);
        assert_eq!(a.composing_count(), ComposingCount::SurfaceCount(4));
    }
}
