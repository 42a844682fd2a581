//! Part-of-speech class tables.
//!
//! Connection class ids (cid) and meaning ids (mid) come from the system
//! dictionary. The tables here are built once on first use and are
//! read-only afterwards.
use once_cell::sync::Lazy;

use crate::dicdata::DicdataElement;

/// Number of connection class ids. Tables are sized `CID_COUNT + 1`.
pub const CID_COUNT: usize = 1319;

/// Number of meaning ids.
pub const MID_COUNT: usize = 502;

/// Connection class ids used directly by the engine.
pub mod cid {
    pub const BOS: usize = 0;
    pub const EOS: usize = 1316;
    pub const SYMBOL: usize = 5;
    /// Topic particle "ha".
    pub const TOPIC_HA: usize = 261;
    /// Polite copula "desu".
    pub const AUX_DESU: usize = 460;
    pub const GENERAL_NOUN: usize = 1285;
    pub const PROPER_NOUN: usize = 1288;
    pub const PERSON_NAME: usize = 1289;
    pub const NUMBER: usize = 1295;

    /// Particles (joshi).
    pub fn is_joshi(cid: usize) -> bool {
        (147..=368).contains(&cid)
    }
}

/// Meaning ids used directly by the engine.
pub mod mid {
    /// Shared by BOS and EOS; ignored by the semantic matrix.
    pub const EOS: usize = 500;
    pub const GENERAL: usize = 501;
    pub const NUMBER: usize = 237;
    pub const SMALL_NUMBER: usize = 361;
    pub const ENGLISH_WORD: usize = 40;
}

/// Word type: 0 prefix, 1 content word, 2 suffix/function word, 3 BOS/EOS.
static WORD_TYPES: Lazy<Vec<u8>> = Lazy::new(|| (0..=CID_COUNT).map(judge_word_type).collect());

static PENALTY_RATIO: Lazy<Vec<f32>> = Lazy::new(|| {
    (0..=CID_COUNT)
        .map(|lcid| if (147..=554).contains(&lcid) { 2.5 } else { 1.0 })
        .collect()
});

static PREDICTION_USABLE: Lazy<Vec<bool>> = Lazy::new(|| {
    let mut usable = vec![true; CID_COUNT + 1];
    for rcid in PREDICTION_UNUSABLE.iter().flat_map(|r| r.clone()) {
        if let Some(slot) = usable.get_mut(rcid) {
            *slot = false;
        }
    }
    usable
});

fn judge_word_type(cid: usize) -> u8 {
    const PREFIX: [usize; 6] = [1315, 6, 557, 558, 559, 560];
    const CONTENT_EXTRA: [usize; 7] = [1314, 3, 2, 4, 5, 1, 9];
    const CONTENT_RANGES: [std::ops::Range<usize>; 6] = [
        561..868,
        1283..1297,
        1306..1310,
        11..53,
        555..557,
        1281..1283,
    ];
    if cid == cid::BOS || cid == cid::EOS {
        3
    } else if PREFIX.contains(&cid) {
        0
    } else if CONTENT_EXTRA.contains(&cid) || CONTENT_RANGES.iter().any(|r| r.contains(&cid)) {
        1
    } else {
        2
    }
}

/// Word type of `cid`; out-of-range ids count as function words.
pub fn word_type(cid: usize) -> u8 {
    WORD_TYPES.get(cid).copied().unwrap_or(2)
}

/// Whether a clause boundary lies between a word ending in `former`
/// and one starting with `latter`.
///
/// Boundaries are function word -> prefix, function word -> content word,
/// content word -> prefix and content word -> content word.
pub fn is_clause(former: usize, latter: usize) -> bool {
    let latter_type = word_type(latter);
    if latter_type == 3 {
        return false;
    }
    let former_type = word_type(former);
    if former_type == 3 {
        return false;
    }
    match latter_type {
        0 | 1 => former_type != 0,
        _ => false,
    }
}

/// Whether the semantic matrix should consider this entry's meaning id.
pub fn include_mm_value_calculation(data: &DicdataElement) -> bool {
    let in_ranges = |c: usize| (895..=1280).contains(&c) || (1297..=1305).contains(&c);
    in_ranges(data.lcid)
        || in_ranges(data.rcid)
        || word_type(data.lcid) == 1
        || word_type(data.rcid) == 1
}

/// Multiplier applied to typo penalties; particles and auxiliaries are
/// penalized harder.
pub fn penalty_ratio(lcid: usize) -> f32 {
    PENALTY_RATIO.get(lcid).copied().unwrap_or(1.0)
}

/// Whether an entry ending in `rcid` may be offered as a completion.
/// Conjugation forms that cannot end an utterance are excluded.
pub fn prediction_usable(rcid: usize) -> bool {
    PREDICTION_USABLE.get(rcid).copied().unwrap_or(true)
}

/// Whether learning should remember the word value for this entry.
pub fn need_w_value_memory(data: &DicdataElement) -> bool {
    let lcid = data.lcid;
    if (147..=554).contains(&lcid)
        || (557..=560).contains(&lcid)
        || (1297..=1305).contains(&lcid)
        || (6..=9).contains(&lcid)
    {
        return false;
    }
    !(lcid == cid::BOS || lcid == cid::EOS)
}

macro_rules! ids {
    ($($a:literal $(..= $b:literal)?),* $(,)?) => {
        &[$(ids!(@r $a $(, $b)?)),*]
    };
    (@r $a:literal, $b:literal) => { $a..=$b };
    (@r $a:literal) => { $a..=$a };
}

/// rcids of conjugation forms unusable as a completion: ta-connective,
/// contracted conditional, irrealis forms, nominal connective, conditional
/// and the "-yo" imperative.
static PREDICTION_UNUSABLE: &[std::ops::RangeInclusive<usize>] = ids![
    // ta-connective
    33, 34, 50, 86, 87, 88, 103, 127, 128, 144, 397, 398, 408, 426, 427, 450, 457, 480, 687, 688,
    703, 704, 727, 742, 750, 758, 766, 786, 787, 798, 810, 811, 829, 830, 831, 893, 973..=977,
    1007..=1010, 1063, 1182..=1194, 1240..=1243, 1268..=1271,
    // contracted conditional
    15, 16, 17, 18, 41, 42, 59..=64, 94, 95, 109..=112, 135, 136, 379..=382, 402, 412, 413, 442,
    443, 471, 472, 562, 572, 582, 591, 598, 618, 627, 677, 678, 693, 694, 709, 710, 722, 730, 737,
    745, 753, 761, 770, 771, 791, 869, 878, 885, 896, 906, 917, 918, 932, 948..=952, 987..=990,
    1017, 1018, 1033..=1036, 1058, 1078..=1090, 1212..=1215,
    // irrealis
    372, 406, 418, 419, 431, 437, 438, 455, 462, 463, 464, 495, 496, 504, 533, 534, 540, 551, 567,
    577, 587, 595, 606, 614, 622, 630, 641, 647, 653, 659, 665, 672, 683, 684, 699, 700, 715, 716,
    725, 733, 740, 748, 756, 764, 780, 781, 794, 806, 807, 823, 824, 825, 837, 842, 847, 852, 859,
    865, 873, 881, 890, 901, 911, 925, 935, 963..=967, 999..=1002, 1023, 1024, 1045..=1048, 1061,
    1143..=1155, 1224..=1227, 1260..=1263, 1278,
    // irrealis, special
    420, 421, 631, 782, 783, 795, 891, 936, 1156..=1168, 1228..=1231,
    // irrealis, volitional connective
    25, 26, 46, 74, 75, 76, 99, 119, 120, 140, 389, 390, 405, 416, 417, 447, 476, 493, 494, 566,
    576, 585, 594, 603, 621, 629, 671, 681, 682, 697, 698, 713, 714, 724, 732, 739, 747, 755, 763,
    778, 779, 793, 804, 805, 820, 821, 822, 872, 880, 889, 900, 910, 923, 924, 934, 958..=962,
    995..=998, 1021, 1022, 1041..=1044, 1060, 1130..=1142, 1220..=1223, 1256..=1259,
    // irrealis, negative connective
    27, 28, 47, 77, 78, 79, 100, 121, 122, 141, 391, 392, 448, 477, 604,
    // nominal connective, special
    404, 564, 565, 574, 575, 600, 601, 620, 774..=777, 871, 887, 888, 898, 899, 908, 909, 921, 922,
    1104..=1129,
    // conditional
    13, 14, 40, 56, 57, 58, 93, 107, 108, 134, 369, 377, 378, 401, 410, 411, 433, 434, 441, 452,
    470, 483, 489, 490, 527, 528, 537, 542, 548, 561, 571, 581, 590, 597, 611, 617, 626, 636, 638,
    644, 650, 656, 662, 668, 675, 676, 691, 692, 707, 708, 721, 729, 736, 744, 752, 760, 768, 769,
    790, 800, 801, 814, 815, 816, 835, 840, 845, 850, 855, 862, 868, 877, 884, 895, 905, 915, 916,
    931, 941, 943..=947, 983..=986, 1015, 1016, 1029..=1032, 1057, 1065..=1077, 1208..=1211,
    1248..=1251, 1276,
    // imperative "-yo"
    373, 553, 569, 579, 589, 596, 609, 624, 634, 642, 648, 654, 660, 666, 673, 860, 866, 875, 903,
    913, 928, 929, 939,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_types() {
        assert_eq!(word_type(cid::BOS), 3);
        assert_eq!(word_type(cid::EOS), 3);
        assert_eq!(word_type(6), 0);
        assert_eq!(word_type(cid::GENERAL_NOUN), 1);
        assert_eq!(word_type(cid::SYMBOL), 1);
        assert_eq!(word_type(cid::TOPIC_HA), 2);
        assert_eq!(word_type(868), 2);
    }

    #[test]
    fn clause_boundaries() {
        // noun -> particle stays in the clause
        assert!(!is_clause(cid::GENERAL_NOUN, cid::TOPIC_HA));
        // particle -> noun starts a new clause
        assert!(is_clause(cid::TOPIC_HA, cid::GENERAL_NOUN));
        // noun -> noun starts a new clause
        assert!(is_clause(cid::GENERAL_NOUN, cid::PROPER_NOUN));
        // prefix -> noun does not
        assert!(!is_clause(6, cid::GENERAL_NOUN));
        assert!(!is_clause(cid::BOS, cid::GENERAL_NOUN));
        assert!(!is_clause(cid::GENERAL_NOUN, cid::EOS));
    }

    #[test]
    fn typo_penalty_ratio() {
        assert_eq!(penalty_ratio(cid::TOPIC_HA), 2.5);
        assert_eq!(penalty_ratio(cid::GENERAL_NOUN), 1.0);
        assert_eq!(penalty_ratio(100_000), 1.0);
    }

    #[test]
    fn prediction_filter() {
        assert!(!prediction_usable(33));
        assert!(!prediction_usable(975));
        assert!(!prediction_usable(1276));
        assert!(prediction_usable(cid::GENERAL_NOUN));
        assert!(prediction_usable(cid::TOPIC_HA));
    }

    #[test]
    fn mm_inclusion() {
        let noun = DicdataElement::with_cid("キョウ", cid::GENERAL_NOUN, 501, -8.0);
        let particle = DicdataElement::with_cid("ハ", cid::TOPIC_HA, 501, -3.0);
        assert!(include_mm_value_calculation(&noun));
        assert!(!include_mm_value_calculation(&particle));
        assert!(need_w_value_memory(&noun));
        assert!(!need_w_value_memory(&particle));
    }
}
