use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use comfy_table::{presets, Row, Table};

use crate::prelude::*;
use crate::snapshot::{Kpis, Snapshot, SnapshotFormat};
use crate::view::{top_keywords, top_publishers, KeywordMetric, ScoreMatrix};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Section {
    All,
    Kpis,
    Keywords,
    Momentum,
    Publishers,
    Matrix,
}

/// Show the metrics of the latest snapshot.
#[derive(Debug, Parser)]
pub(crate) struct Show {
    /// Show only the given section.
    #[arg(short, long, default_value = "all")]
    section: Section,

    /// The number of keywords to show.
    #[arg(short = 'n', long, default_value = "50")]
    top: usize,

    /// The metric used to rank keywords.
    #[arg(short, long, default_value = "datasets_total")]
    metric: KeywordMetric,

    /// The number of publishers to show.
    #[arg(short, long, default_value = "25")]
    publishers: usize,

    /// The file format of the snapshot tables. Defaults to the
    /// `output.format` option of the project config.
    #[arg(long)]
    format: Option<SnapshotFormat>,

    /// Read the snapshot from `dir` instead of the project's output
    /// directory.
    #[arg(value_name = "dir")]
    dir: Option<PathBuf>,
}

/// The number of keywords in the momentum ranking.
const MOMENTUM_TOP: usize = 30;

fn table<I, S>(header: I) -> Table
where
    I: IntoIterator<Item = S>,
    S: ToString,
{
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_header(Row::from(
        header.into_iter().map(|s| s.to_string()).collect::<Vec<_>>(),
    ));
    table
}

#[inline]
fn fmt_score(score: Option<f64>) -> String {
    match score {
        Some(score) => format!("{score:.2}"),
        None => "-".into(),
    }
}

fn kpi_table(kpis: &Kpis) -> Table {
    let last_modified = kpis
        .last_modified_max
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".into());

    let mut table = table(["datasets", "publishers", "keywords", "last update"]);
    table.add_row([
        kpis.datasets_total.to_string(),
        kpis.publishers_total.to_string(),
        kpis.keywords_total.to_string(),
        last_modified,
    ]);

    table
}

impl Show {
    pub(crate) fn execute(self) -> OgdResult<()> {
        let project = Project::discover_or_current()?;
        let config = project.config()?;
        let format = self.format.unwrap_or(config.output.format);
        let dir = self
            .dir
            .clone()
            .unwrap_or_else(|| project.output_dir(&config));

        // fails as a whole before anything is printed
        let snapshot = Snapshot::read(&dir, format)?;
        let kpis = snapshot.kpis()?;
        let keywords = snapshot.keywords()?;
        let publishers = snapshot.publishers()?;
        let buckets = snapshot.score_buckets()?;

        let all = self.section == Section::All;

        if all || self.section == Section::Kpis {
            if let Some(dt) = kpis.run_timestamp {
                eprintln!(
                    "snapshot taken at {}",
                    dt.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }

            println!("{}", kpi_table(&kpis));
        }

        if all || self.section == Section::Keywords {
            println!("\nKeywords by {}", self.metric.label());
            let mut table = table([
                "keyword",
                "datasets_total",
                "datasets_new_12m",
                "datasets_upd_12m",
            ]);

            for row in top_keywords(keywords.clone(), self.metric, self.top) {
                table.add_row([
                    row.keyword,
                    row.datasets_total.to_string(),
                    row.datasets_new_12m.to_string(),
                    row.datasets_upd_12m.to_string(),
                ]);
            }

            println!("{table}");
        }

        if all || self.section == Section::Momentum {
            println!("\nKeyword momentum (new datasets, last 12 months)");
            let mut table = table(["keyword", "datasets_new_12m"]);
            for row in
                top_keywords(keywords, KeywordMetric::New, MOMENTUM_TOP)
            {
                table.add_row([row.keyword, row.datasets_new_12m.to_string()]);
            }

            println!("{table}");
        }

        if all || self.section == Section::Publishers {
            println!("\nPublishers by average maturity (1-5)");
            let mut table =
                table(["publisher", "datasets", "avg_score", "med_score"]);
            for row in top_publishers(publishers, self.publishers) {
                table.add_row([
                    row.publisher,
                    row.datasets.to_string(),
                    fmt_score(row.avg_score),
                    fmt_score(row.med_score),
                ]);
            }

            println!("{table}");
        }

        if all || self.section == Section::Matrix {
            println!("\nPublisher x maturity tier (datasets)");
            let mut table =
                table(["publisher", "1", "2", "3", "4", "5", "-"]);
            let matrix = ScoreMatrix::from_buckets(&buckets, self.publishers);
            for row in matrix.rows {
                let mut cells = vec![row.publisher];
                cells.extend(row.tiers.iter().map(u64::to_string));
                cells.push(row.missing.to_string());
                table.add_row(cells);
            }

            println!("{table}");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn kpi_table_rows() {
        let kpis = Kpis {
            datasets_total: 3,
            publishers_total: 2,
            keywords_total: 4,
            last_modified_max: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).single(),
            run_timestamp: None,
        };

        let table = kpi_table(&kpis);
        assert_eq!(table.row_iter().count(), 1);

        let rendered = table.to_string();
        assert!(rendered.contains("2025-06-01"));
        assert!(!rendered.contains("snapshot taken"));
    }

    #[test]
    fn kpi_table_without_modification_date() {
        let kpis = Kpis {
            datasets_total: 0,
            publishers_total: 0,
            keywords_total: 0,
            last_modified_max: None,
            run_timestamp: None,
        };

        let rendered = kpi_table(&kpis).to_string();
        assert!(rendered.contains('-'));
    }
}
