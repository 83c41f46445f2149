//! Reshaping of precomputed snapshot tables for presentation. Nothing
//! in here recomputes a score.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt::{self, Display};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::snapshot::{KeywordRow, PublisherRow, ScoreBucket};

/// The keyword metric used to rank keywords.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ValueEnum,
)]
pub(crate) enum KeywordMetric {
    #[default]
    #[serde(rename = "datasets_total")]
    #[value(name = "datasets_total")]
    Total,

    #[serde(rename = "datasets_new_12m")]
    #[value(name = "datasets_new_12m")]
    New,

    #[serde(rename = "datasets_upd_12m")]
    #[value(name = "datasets_upd_12m")]
    Updated,
}

impl KeywordMetric {
    #[inline]
    pub(crate) fn value(&self, row: &KeywordRow) -> u64 {
        match self {
            Self::Total => row.datasets_total,
            Self::New => row.datasets_new_12m,
            Self::Updated => row.datasets_upd_12m,
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Total => "total datasets",
            Self::New => "new datasets (12m)",
            Self::Updated => "updated datasets (12m)",
        }
    }
}

impl Display for KeywordMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Total => write!(f, "datasets_total"),
            Self::New => write!(f, "datasets_new_12m"),
            Self::Updated => write!(f, "datasets_upd_12m"),
        }
    }
}

/// Returns the `n` highest ranked keywords according to `metric`. Ties
/// are ordered by keyword.
pub(crate) fn top_keywords(
    mut rows: Vec<KeywordRow>,
    metric: KeywordMetric,
    n: usize,
) -> Vec<KeywordRow> {
    rows.sort_by(|a, b| {
        metric
            .value(b)
            .cmp(&metric.value(a))
            .then_with(|| a.keyword.cmp(&b.keyword))
    });
    rows.truncate(n);
    rows
}

/// Returns the first `n` publishers. The publisher table is already
/// ranked by average score.
pub(crate) fn top_publishers(
    mut rows: Vec<PublisherRow>,
    n: usize,
) -> Vec<PublisherRow> {
    rows.truncate(n);
    rows
}

/// Pivot of the publisher score distribution: one row per publisher,
/// one column per tier plus one for datasets without a score.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub(crate) struct ScoreMatrix {
    pub(crate) rows: Vec<ScoreMatrixRow>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub(crate) struct ScoreMatrixRow {
    pub(crate) publisher: String,
    /// Dataset counts for the tiers 1 to 5.
    pub(crate) tiers: [u64; 5],
    pub(crate) missing: u64,
}

impl ScoreMatrix {
    /// Builds the matrix. Rows are ordered by the counts of the highest
    /// tier first (most mature publishers on top), then by name. This
    /// differs from the Streamlit dashboard, which ranks by the tier 1
    /// count first.
    pub(crate) fn from_buckets(buckets: &[ScoreBucket], n: usize) -> Self {
        let mut rows: BTreeMap<&str, ScoreMatrixRow> = BTreeMap::new();

        for bucket in buckets.iter() {
            let row = rows.entry(bucket.publisher.as_str()).or_insert_with(|| {
                ScoreMatrixRow {
                    publisher: bucket.publisher.clone(),
                    ..Default::default()
                }
            });

            match bucket.dataset_best_score {
                Some(score @ 1..=5) => {
                    row.tiers[score as usize - 1] += bucket.datasets
                }
                Some(score) => {
                    log::warn!("ignoring invalid tier {score}");
                }
                None => row.missing += bucket.datasets,
            }
        }

        let mut rows: Vec<_> = rows.into_values().collect();
        rows.sort_by_key(|row| {
            let mut tiers = row.tiers;
            tiers.reverse();
            Reverse(tiers)
        });
        rows.truncate(n);

        Self { rows }
    }
}
