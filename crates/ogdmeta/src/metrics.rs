//! Keyword and publisher rollups over the normalized catalog.
//!
//! The catalog is first exploded into flat tables (one row per
//! keyword, one row per publisher of a dataset). All group-by work is
//! done on these tables; the resulting frames are the snapshot tables.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use polars::prelude::*;

use crate::catalog::Catalog;
use crate::prelude::*;
use crate::snapshot::Snapshot;

/// Width of the "recent" window for new and updated datasets.
pub(crate) const RECENT_DAYS: i64 = 365;

/// Computes all snapshot tables. Nothing is written here, so a failure
/// in any of the aggregations leaves existing files untouched.
pub(crate) fn compute(
    catalog: &Catalog,
    now: DateTime<Utc>,
) -> OgdResult<Snapshot> {
    let keywords = keyword_frame(catalog)?;
    let publishers = publisher_frame(catalog)?;
    let scores = score_frame(catalog)?;

    let kw_metrics = keyword_metrics(keywords, now)?;
    log::info!("aggregated {} keywords", kw_metrics.height());

    let joined = publishers
        .lazy()
        .left_join(scores.lazy(), col("identifier"), col("identifier"));

    let publisher_scores = publisher_scores(joined.clone())?;
    let publisher_score_dist = publisher_score_dist(joined)?;
    log::info!("aggregated {} publishers", publisher_scores.height());

    Ok(Snapshot {
        kw_metrics,
        publisher_scores,
        publisher_score_dist,
        kpis: kpis(catalog, now)?,
    })
}

/// Explodes the keywords: one row per (dataset, keyword) pair.
pub(crate) fn keyword_frame(catalog: &Catalog) -> PolarsResult<DataFrame> {
    let mut identifier: Vec<&str> = vec![];
    let mut keyword: Vec<&str> = vec![];
    let mut issued: Vec<Option<i64>> = vec![];
    let mut modified: Vec<Option<i64>> = vec![];

    for record in catalog.records.iter() {
        for kw in record.keywords.iter() {
            identifier.push(&record.identifier);
            keyword.push(kw);
            issued.push(record.issued.map(|dt| dt.timestamp_millis()));
            modified.push(record.modified.map(|dt| dt.timestamp_millis()));
        }
    }

    DataFrame::new(vec![
        Series::new("identifier", identifier),
        Series::new("keyword", keyword),
        Series::new("issued", issued),
        Series::new("modified", modified),
    ])
}

/// Explodes the publishers: one row per distinct (dataset, publisher)
/// pair.
pub(crate) fn publisher_frame(
    catalog: &Catalog,
) -> PolarsResult<DataFrame> {
    let pairs: BTreeSet<(&str, &str)> = catalog
        .records
        .iter()
        .flat_map(|record| {
            record
                .publishers
                .iter()
                .map(|p| (record.identifier.as_str(), p.as_str()))
        })
        .collect();

    let (identifier, publisher): (Vec<&str>, Vec<&str>) =
        pairs.into_iter().unzip();

    DataFrame::new(vec![
        Series::new("identifier", identifier),
        Series::new("publisher", publisher),
    ])
}

/// One row per dataset with its best tier (null without
/// distributions).
pub(crate) fn score_frame(catalog: &Catalog) -> PolarsResult<DataFrame> {
    let scores = catalog.best_scores();
    let mut identifier: Vec<&str> = Vec::with_capacity(scores.len());
    let mut best: Vec<Option<u8>> = Vec::with_capacity(scores.len());

    for (id, score) in scores.into_iter() {
        identifier.push(id);
        best.push(score.map(|tier| tier.value()));
    }

    DataFrame::new(vec![
        Series::new("identifier", identifier),
        Series::new("dataset_best_score", best),
    ])
}

pub(crate) fn keyword_metrics(
    keywords: DataFrame,
    now: DateTime<Utc>,
) -> PolarsResult<DataFrame> {
    let cutoff = (now - Duration::days(RECENT_DAYS)).timestamp_millis();

    keywords
        .lazy()
        .group_by([col("keyword")])
        .agg([
            col("identifier").n_unique().alias("datasets_total"),
            col("identifier")
                .filter(col("issued").gt_eq(lit(cutoff)))
                .n_unique()
                .alias("datasets_new_12m"),
            col("identifier")
                .filter(col("modified").gt_eq(lit(cutoff)))
                .n_unique()
                .alias("datasets_upd_12m"),
        ])
        .select([
            col("keyword"),
            col("datasets_total").cast(DataType::UInt64),
            col("datasets_new_12m").cast(DataType::UInt64),
            col("datasets_upd_12m").cast(DataType::UInt64),
        ])
        .sort(
            ["datasets_total", "keyword"],
            SortMultipleOptions::default()
                .with_order_descending_multi([true, false]),
        )
        .collect()
}

pub(crate) fn publisher_scores(
    joined: LazyFrame,
) -> PolarsResult<DataFrame> {
    joined
        .group_by([col("publisher")])
        .agg([
            col("identifier").n_unique().alias("datasets"),
            col("dataset_best_score")
                .cast(DataType::Float64)
                .mean()
                .alias("avg_score"),
            col("dataset_best_score")
                .cast(DataType::Float64)
                .median()
                .alias("med_score"),
        ])
        .select([
            col("publisher"),
            col("datasets").cast(DataType::UInt64),
            col("avg_score"),
            col("med_score"),
        ])
        .sort(
            ["avg_score", "datasets", "publisher"],
            SortMultipleOptions::default()
                .with_order_descending_multi([true, true, false])
                .with_nulls_last(true),
        )
        .collect()
}

pub(crate) fn publisher_score_dist(
    joined: LazyFrame,
) -> PolarsResult<DataFrame> {
    joined
        .group_by([col("publisher"), col("dataset_best_score")])
        .agg([col("identifier").n_unique().alias("datasets")])
        .select([
            col("publisher"),
            col("dataset_best_score"),
            col("datasets").cast(DataType::UInt64),
        ])
        .sort(
            ["publisher", "dataset_best_score"],
            SortMultipleOptions::default().with_nulls_last(true),
        )
        .collect()
}

pub(crate) fn kpis(
    catalog: &Catalog,
    now: DateTime<Utc>,
) -> PolarsResult<DataFrame> {
    let datasets: BTreeSet<&str> = catalog
        .records
        .iter()
        .map(|record| record.identifier.as_str())
        .collect();

    let publishers: BTreeSet<&str> = catalog
        .records
        .iter()
        .flat_map(|record| record.publishers.iter().map(String::as_str))
        .collect();

    let keywords: BTreeSet<&str> = catalog
        .records
        .iter()
        .flat_map(|record| record.keywords.iter().map(String::as_str))
        .collect();

    let last_modified = catalog
        .records
        .iter()
        .filter_map(|record| record.modified)
        .max()
        .map(|dt| dt.timestamp_millis());

    let datetime = DataType::Datetime(TimeUnit::Milliseconds, None);

    DataFrame::new(vec![
        Series::new("datasets_total", [datasets.len() as u64]),
        Series::new("publishers_total", [publishers.len() as u64]),
        Series::new("keywords_total", [keywords.len() as u64]),
        Series::new("last_modified_max", [last_modified])
            .cast(&datetime)?,
        Series::new("run_timestamp", [now.timestamp_millis()])
            .cast(&datetime)?,
    ])
}
