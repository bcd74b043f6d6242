//! Facet aggregation over a user's fragments
//!
//! Counts themes and emotions, derives the "popular" lists shown as search
//! filters, and finds the creation date range of the set.
//!
//! # Rules
//!
//! - Counting is exact and case-sensitive; one count per (fragment, value)
//!   membership pair.
//! - A value is popular when it occurs at least [`POPULAR_MIN_COUNT`] times.
//! - Popular lists are ranked by count descending. The sort is stable, so
//!   equal counts keep first-encounter order.
//! - Lists are truncated to [`THEME_CAP`] and [`EMOTION_CAP`].
//!
//! Pure in-memory computation: the caller fetches the fragments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::models::Fragment;

/// Minimum occurrences for a value to be listed as popular
pub const POPULAR_MIN_COUNT: usize = 2;

/// Maximum number of popular themes returned
pub const THEME_CAP: usize = 15;

/// Maximum number of popular emotions returned
pub const EMOTION_CAP: usize = 10;

/// One ranked facet value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    pub value: String,
    pub count: usize,
}

/// Earliest and latest creation timestamps of a fragment set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
}

impl DateRange {
    fn include(range: Option<DateRange>, ts: DateTime<Utc>) -> DateRange {
        match range {
            None => DateRange {
                earliest: ts,
                latest: ts,
            },
            Some(r) => DateRange {
                earliest: r.earliest.min(ts),
                latest: r.latest.max(ts),
            },
        }
    }
}

/// Aggregated facets of a fragment set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacetSummary {
    pub theme_counts: BTreeMap<String, usize>,
    pub emotion_counts: BTreeMap<String, usize>,
    pub popular_themes: Vec<FacetCount>,
    pub popular_emotions: Vec<FacetCount>,
    pub date_range: Option<DateRange>,
}

/// Occurrence counter that remembers first-encounter order
#[derive(Debug, Default)]
struct Tally {
    order: Vec<String>,
    counts: HashMap<String, usize>,
}

impl Tally {
    fn add(&mut self, value: &str) {
        match self.counts.get_mut(value) {
            Some(count) => *count += 1,
            None => {
                self.order.push(value.to_string());
                self.counts.insert(value.to_string(), 1);
            }
        }
    }

    fn popular(&self, cap: usize) -> Vec<FacetCount> {
        let mut ranked: Vec<FacetCount> = self
            .order
            .iter()
            .filter_map(|value| {
                let count = self.counts[value];
                (count >= POPULAR_MIN_COUNT).then(|| FacetCount {
                    value: value.clone(),
                    count,
                })
            })
            .collect();

        // Vec::sort_by is stable: ties stay in encounter order
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked.truncate(cap);
        ranked
    }

    fn into_map(self) -> BTreeMap<String, usize> {
        self.counts.into_iter().collect()
    }
}

/// Aggregate facets over `fragments`
///
/// # Examples
///
/// ```
/// use llhe_common::facets::aggregate;
/// use llhe_common::{Fragment, Visibility};
/// use uuid::Uuid;
///
/// let owner = Uuid::new_v4();
/// let mk = |themes: &[&str]| {
///     let mut f = Fragment::new(owner, "t".into(), "c".into(), chrono::Utc::now(), Visibility::Private);
///     f.themes = themes.iter().map(|s| s.to_string()).collect();
///     f
/// };
/// let fragments = vec![mk(&["growth"]), mk(&["growth", "family"]), mk(&["family"])];
///
/// let summary = aggregate(&fragments);
/// assert_eq!(summary.theme_counts["growth"], 2);
/// assert_eq!(summary.popular_themes[0].value, "growth");
/// assert_eq!(summary.popular_themes[1].value, "family");
/// ```
pub fn aggregate<'a, I>(fragments: I) -> FacetSummary
where
    I: IntoIterator<Item = &'a Fragment>,
{
    let mut themes = Tally::default();
    let mut emotions = Tally::default();
    let mut date_range = None;

    for fragment in fragments {
        for theme in &fragment.themes {
            themes.add(theme);
        }
        for emotion in &fragment.emotions {
            emotions.add(emotion);
        }
        date_range = Some(DateRange::include(date_range, fragment.created_at));
    }

    FacetSummary {
        popular_themes: themes.popular(THEME_CAP),
        popular_emotions: emotions.popular(EMOTION_CAP),
        theme_counts: themes.into_map(),
        emotion_counts: emotions.into_map(),
        date_range,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Visibility;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn fragment(themes: &[&str], emotions: &[&str]) -> Fragment {
        let mut f = Fragment::new(
            Uuid::new_v4(),
            "title".to_string(),
            "content".to_string(),
            Utc::now(),
            Visibility::Private,
        );
        f.themes = themes.iter().map(|s| s.to_string()).collect();
        f.emotions = emotions.iter().map(|s| s.to_string()).collect();
        f
    }

    #[test]
    fn test_empty_input() {
        let summary = aggregate(&Vec::<Fragment>::new());
        assert!(summary.theme_counts.is_empty());
        assert!(summary.emotion_counts.is_empty());
        assert!(summary.popular_themes.is_empty());
        assert!(summary.popular_emotions.is_empty());
        assert!(summary.date_range.is_none());
    }

    #[test]
    fn test_ties_keep_first_encounter_order() {
        let fragments = vec![
            fragment(&["growth"], &[]),
            fragment(&["growth", "family"], &[]),
            fragment(&["family"], &[]),
        ];
        let summary = aggregate(&fragments);

        assert_eq!(summary.theme_counts.len(), 2);
        assert_eq!(summary.theme_counts["growth"], 2);
        assert_eq!(summary.theme_counts["family"], 2);
        assert_eq!(
            summary.popular_themes,
            vec![
                FacetCount { value: "growth".to_string(), count: 2 },
                FacetCount { value: "family".to_string(), count: 2 },
            ]
        );
    }

    #[test]
    fn test_single_occurrence_is_counted_but_not_popular() {
        let fragments = vec![
            fragment(&["loss", "travel"], &["grief"]),
            fragment(&["loss"], &["grief"]),
        ];
        let summary = aggregate(&fragments);

        assert_eq!(summary.theme_counts["travel"], 1);
        assert!(summary.popular_themes.iter().all(|f| f.value != "travel"));
        assert_eq!(summary.popular_themes.len(), 1);
        assert_eq!(summary.popular_emotions[0], FacetCount { value: "grief".to_string(), count: 2 });
    }

    #[test]
    fn test_counts_sum_to_membership_pairs() {
        let fragments = vec![
            fragment(&["a", "b", "c"], &["x"]),
            fragment(&["a"], &["x", "y"]),
            fragment(&[], &[]),
            fragment(&["c", "d"], &["z"]),
        ];
        let membership_pairs: usize = fragments.iter().map(|f| f.themes.len()).sum();
        let summary = aggregate(&fragments);

        assert_eq!(summary.theme_counts.values().sum::<usize>(), membership_pairs);
        assert_eq!(summary.emotion_counts.values().sum::<usize>(), 4);
    }

    #[test]
    fn test_counting_is_case_sensitive() {
        let fragments = vec![fragment(&["Family"], &[]), fragment(&["family"], &[])];
        let summary = aggregate(&fragments);

        assert_eq!(summary.theme_counts["Family"], 1);
        assert_eq!(summary.theme_counts["family"], 1);
        assert!(summary.popular_themes.is_empty());
    }

    #[test]
    fn test_sorted_descending_by_count() {
        let fragments = vec![
            fragment(&["rare", "common"], &[]),
            fragment(&["rare", "common", "mid"], &[]),
            fragment(&["common", "mid"], &[]),
        ];
        let summary = aggregate(&fragments);
        let values: Vec<&str> = summary.popular_themes.iter().map(|f| f.value.as_str()).collect();

        // rare (2) was seen before mid (2), common (3) ranks first
        assert_eq!(values, vec!["common", "rare", "mid"]);
    }

    #[test]
    fn test_theme_cap_truncates_to_fifteen() {
        let names: Vec<String> = (0..20).map(|i| format!("theme-{:02}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let fragments = vec![fragment(&refs, &[]), fragment(&refs, &[])];

        let summary = aggregate(&fragments);

        assert_eq!(summary.theme_counts.len(), 20);
        assert_eq!(summary.popular_themes.len(), THEME_CAP);
        assert_eq!(summary.popular_themes[0].value, "theme-00");
        assert_eq!(summary.popular_themes[14].value, "theme-14");
    }

    #[test]
    fn test_emotion_cap_truncates_to_ten() {
        let names: Vec<String> = (0..12).map(|i| format!("emotion-{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let fragments = vec![fragment(&[], &refs), fragment(&[], &refs)];

        let summary = aggregate(&fragments);

        assert_eq!(summary.popular_emotions.len(), EMOTION_CAP);
    }

    #[test]
    fn test_no_truncation_below_cap() {
        let fragments = vec![
            fragment(&["a", "b", "c"], &["x", "y"]),
            fragment(&["a", "b", "c"], &["x", "y"]),
        ];
        let summary = aggregate(&fragments);

        assert_eq!(summary.popular_themes.len(), 3);
        assert_eq!(summary.popular_emotions.len(), 2);
    }

    #[test]
    fn test_date_range_spans_created_at() {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mut fragments = vec![fragment(&[], &[]), fragment(&[], &[]), fragment(&[], &[])];
        fragments[0].created_at = base + Duration::days(3);
        fragments[1].created_at = base;
        fragments[2].created_at = base + Duration::days(10);

        let range = aggregate(&fragments).date_range.unwrap();

        assert_eq!(range.earliest, base);
        assert_eq!(range.latest, base + Duration::days(10));
    }

    #[test]
    fn test_input_is_not_mutated() {
        let fragments = vec![fragment(&["b", "a"], &["y"]), fragment(&["a"], &[])];
        let before = fragments.clone();
        let _ = aggregate(&fragments);
        assert_eq!(fragments, before);
    }
}
