//! Ordering of per-key press counts.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::key_label;

/// Number of presses recorded for one key label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCount {
    pub label: String,
    pub count: i64,
}

impl KeyCount {
    pub fn new(label: impl Into<String>, count: i64) -> Self {
        Self {
            label: label.into(),
            count,
        }
    }
}

/// Ranking order: count descending, then the display order of the label.
pub fn compare_ranked(a: &KeyCount, b: &KeyCount) -> Ordering {
    b.count
        .cmp(&a.count)
        .then_with(|| key_label::compare_labels(&a.label, &b.label))
}

/// Sorts key counts into ranking order in place.
pub fn sort_key_counts(counts: &mut [KeyCount]) {
    counts.sort_by(compare_ranked);
}

/// Returns the `limit` highest-ranked keys.
pub fn top_keys(mut counts: Vec<KeyCount>, limit: usize) -> Vec<KeyCount> {
    sort_key_counts(&mut counts);
    counts.truncate(limit);
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(counts: &[KeyCount]) -> Vec<&str> {
        counts.iter().map(|c| c.label.as_str()).collect()
    }

    #[test]
    fn ranks_by_count_descending() {
        let ranked = top_keys(
            vec![
                KeyCount::new("B", 3),
                KeyCount::new("A", 10),
                KeyCount::new("Space", 7),
            ],
            10,
        );
        assert_eq!(labels(&ranked), vec!["A", "Space", "B"]);
    }

    #[test]
    fn ties_break_on_category_then_label() {
        let ranked = top_keys(
            vec![
                KeyCount::new(";", 5),
                KeyCount::new("Space", 5),
                KeyCount::new("7", 5),
                KeyCount::new("Q", 5),
                KeyCount::new("E", 5),
            ],
            10,
        );
        assert_eq!(labels(&ranked), vec!["E", "Q", "7", "Space", ";"]);
    }

    #[test]
    fn ordering_is_stable_across_input_permutations() {
        let base = vec![
            KeyCount::new("a", 2),
            KeyCount::new("A", 2),
            KeyCount::new("Enter", 2),
            KeyCount::new("Z", 1),
        ];
        let mut reversed = base.clone();
        reversed.reverse();

        let first = top_keys(base, 10);
        let second = top_keys(reversed, 10);
        assert_eq!(first, second);
        assert_eq!(labels(&first), vec!["A", "a", "Enter", "Z"]);
    }

    #[test]
    fn limit_bounds_the_result() {
        let ranked = top_keys(
            vec![KeyCount::new("A", 1), KeyCount::new("B", 2), KeyCount::new("C", 3)],
            2,
        );
        assert_eq!(labels(&ranked), vec!["C", "B"]);
        assert!(top_keys(vec![KeyCount::new("A", 1)], 0).is_empty());
    }
}
