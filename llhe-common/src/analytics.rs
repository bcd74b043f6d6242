//! Analytics shaping over a user's fragments

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::facets::{self, DateRange, FacetCount};
use crate::models::Fragment;

/// Summary statistics returned by the analytics query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_fragments: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_visibility: BTreeMap<String, usize>,
    /// Fragments created per calendar month, keyed `YYYY-MM`
    pub per_month: BTreeMap<String, usize>,
    pub average_word_count: f64,
    pub total_media: usize,
    pub popular_themes: Vec<FacetCount>,
    pub popular_emotions: Vec<FacetCount>,
    pub date_range: Option<DateRange>,
}

pub fn summarize(fragments: &[Fragment]) -> AnalyticsSummary {
    let facets = facets::aggregate(fragments);

    let mut by_status = BTreeMap::new();
    let mut by_visibility = BTreeMap::new();
    let mut per_month = BTreeMap::new();
    let mut words = 0usize;
    let mut total_media = 0usize;

    for fragment in fragments {
        *by_status.entry(fragment.status.to_string()).or_insert(0) += 1;
        *by_visibility.entry(fragment.visibility.to_string()).or_insert(0) += 1;
        *per_month
            .entry(fragment.created_at.format("%Y-%m").to_string())
            .or_insert(0) += 1;
        words += fragment.word_count();
        total_media += fragment.media.len();
    }

    let average_word_count = if fragments.is_empty() {
        0.0
    } else {
        words as f64 / fragments.len() as f64
    };

    AnalyticsSummary {
        total_fragments: fragments.len(),
        by_status,
        by_visibility,
        per_month,
        average_word_count,
        total_media,
        popular_themes: facets.popular_themes,
        popular_emotions: facets.popular_emotions,
        date_range: facets.date_range,
    }
}
