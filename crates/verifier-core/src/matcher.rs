//! Category matching: does any of the oracle's top labels contain a keyword
//! associated with the reported category?
//!
//! Matching is plain substring containment on the lowercased label, so
//! "road" also matches "roadster". Every candidate is scanned and the
//! highest-probability hit wins, not the first one.

use crate::categories::{Category, CategoryVocabulary};
use crate::inference::LabelPrediction;

pub const UNKNOWN_CATEGORY: &str = "Unknown category";

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryMatch {
    pub matched: bool,
    pub confidence: f32,
    pub label: String,
}

impl CategoryMatch {
    fn none(label: &str) -> Self {
        Self {
            matched: false,
            confidence: 0.0,
            label: label.to_string(),
        }
    }
}

/// Scan `predictions` (ranked, highest first) for keywords of `reported_category`.
pub fn match_category(
    predictions: &[LabelPrediction],
    reported_category: &str,
    vocabulary: &CategoryVocabulary,
) -> CategoryMatch {
    let Some(category) = Category::parse(reported_category).filter(|c| vocabulary.contains(*c))
    else {
        return CategoryMatch::none(UNKNOWN_CATEGORY);
    };
    let keywords = vocabulary.keywords(category);

    let mut best: Option<&LabelPrediction> = None;
    for pred in predictions {
        let class_name = pred.label.to_lowercase();
        if !keywords.iter().any(|k| class_name.contains(k.as_str())) {
            continue;
        }
        match best {
            Some(b) if b.probability >= pred.probability => {}
            _ => best = Some(pred),
        }
    }

    match best {
        Some(pred) => CategoryMatch {
            matched: true,
            confidence: pred.probability,
            label: pred.label.clone(),
        },
        None => CategoryMatch::none(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn preds(items: &[(&str, f32)]) -> Vec<LabelPrediction> {
        items
            .iter()
            .map(|(l, p)| LabelPrediction::new(*l, *p))
            .collect()
    }

    #[test]
    fn unknown_category_never_matches() {
        let vocab = CategoryVocabulary::builtin();
        let p = preds(&[("pothole", 0.99), ("street_sign", 0.01)]);
        let m = match_category(&p, "SINKHOLE", &vocab);
        assert_eq!(m, CategoryMatch::none(UNKNOWN_CATEGORY));
    }

    #[test]
    fn category_is_canonicalized() {
        let vocab = CategoryVocabulary::builtin();
        let p = preds(&[("trash_can", 0.7)]);
        let m = match_category(&p, "  garbage\n", &vocab);
        assert!(m.matched);
        assert_eq!(m.label, "trash_can");
    }

    #[test]
    fn category_missing_from_custom_vocabulary_is_unknown() {
        let vocab = CategoryVocabulary::from_map(HashMap::from([(
            Category::Flood,
            vec!["water".to_string()],
        )]));
        let m = match_category(&preds(&[("pothole", 0.9)]), "POTHOLE", &vocab);
        assert_eq!(m.label, UNKNOWN_CATEGORY);
        assert!(!m.matched);
    }

    #[test]
    fn no_keyword_hit_returns_empty_label() {
        let vocab = CategoryVocabulary::builtin();
        let p = preds(&[("tabby", 0.8), ("tiger_cat", 0.1), ("Egyptian_cat", 0.05)]);
        let m = match_category(&p, "POTHOLE", &vocab);
        assert_eq!(m, CategoryMatch::none(""));
    }

    #[test]
    fn substring_matching_is_preserved() {
        let vocab = CategoryVocabulary::builtin();
        let m = match_category(&preds(&[("roadster", 0.4)]), "POTHOLE", &vocab);
        assert!(m.matched);
        assert_eq!(m.label, "roadster");
        assert_eq!(m.confidence, 0.4);
    }

    #[test]
    fn label_is_lowercased_before_matching() {
        let vocab = CategoryVocabulary::builtin();
        let m = match_category(&preds(&[("Traffic_Light", 0.66)]), "STREETLIGHT", &vocab);
        assert!(m.matched);
        assert_eq!(m.label, "Traffic_Light");
    }

    #[test]
    fn match_only_at_last_rank_is_found() {
        let vocab = CategoryVocabulary::builtin();
        let p = preds(&[
            ("tabby", 0.5),
            ("lynx", 0.2),
            ("tiger_cat", 0.1),
            ("Persian_cat", 0.08),
            ("water_tower", 0.03),
        ]);
        let m = match_category(&p, "FLOOD", &vocab);
        assert!(m.matched);
        assert_eq!(m.confidence, 0.03);
        assert_eq!(m.label, "water_tower");
    }

    #[test]
    fn highest_probability_match_wins_over_first_hit() {
        let vocab = CategoryVocabulary::builtin();
        // Deliberately not sorted: the later hit has the higher probability.
        let p = preds(&[("street_sign", 0.2), ("tabby", 0.15), ("car_wheel", 0.45)]);
        let m = match_category(&p, "TRAFFIC", &vocab);
        assert!(m.matched);
        assert_eq!(m.confidence, 0.45);
        assert_eq!(m.label, "car_wheel");
    }

    #[test]
    fn equal_probability_keeps_earlier_hit() {
        let vocab = CategoryVocabulary::builtin();
        let p = preds(&[("street_sign", 0.3), ("car_mirror", 0.3)]);
        let m = match_category(&p, "TRAFFIC", &vocab);
        assert_eq!(m.label, "street_sign");
    }

    #[test]
    fn zero_probability_hit_still_counts_as_match() {
        let vocab = CategoryVocabulary::builtin();
        let m = match_category(&preds(&[("garbage_truck", 0.0)]), "GARBAGE", &vocab);
        assert!(m.matched);
        assert_eq!(m.confidence, 0.0);
    }

    #[test]
    fn empty_predictions_do_not_match() {
        let vocab = CategoryVocabulary::builtin();
        assert!(!match_category(&[], "OTHER", &vocab).matched);
    }
}
