use std::fmt::{self, Display};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::prelude::*;

pub(crate) const KW_METRICS: &str = "kw_metrics";
pub(crate) const PUBLISHER_SCORES: &str = "publisher_scores";
pub(crate) const PUBLISHER_SCORE_DIST: &str = "publisher_score_dist";
pub(crate) const KPIS: &str = "kpis";

/// The file format of the snapshot tables.
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
#[serde(rename_all = "lowercase")]
pub(crate) enum SnapshotFormat {
    #[default]
    Parquet,
    Ipc,
}

impl SnapshotFormat {
    #[inline]
    pub(crate) fn extension(&self) -> &'static str {
        match self {
            Self::Parquet => "parquet",
            Self::Ipc => "ipc",
        }
    }

    /// Returns the path of the table `name` inside of `dir`.
    #[inline]
    pub(crate) fn path(&self, dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{name}.{}", self.extension()))
    }
}

impl Display for SnapshotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// The four tables produced by one pipeline run.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub(crate) kw_metrics: DataFrame,
    pub(crate) publisher_scores: DataFrame,
    pub(crate) publisher_score_dist: DataFrame,
    pub(crate) kpis: DataFrame,
}

impl Snapshot {
    /// Writes all tables into `dir`, replacing any previous snapshot.
    ///
    /// Every table goes to a temporary file first. Only if all of them
    /// could be written, the temporary files are renamed into place.
    pub(crate) fn write(
        &mut self,
        dir: &Path,
        format: SnapshotFormat,
    ) -> OgdResult<()> {
        fs::create_dir_all(dir).map_err(|e| OgdError::write(dir, e))?;

        let mut staged = vec![];
        for (name, df) in self.tables_mut() {
            let path = format.path(dir, name);
            let tmp = path.with_extension(format!("{format}.tmp"));

            if let Err(e) = write_frame(&tmp, df, format) {
                let _ = fs::remove_file(&tmp);
                for (tmp, _) in staged {
                    let _ = fs::remove_file(tmp);
                }

                return Err(e);
            }

            staged.push((tmp, path));
        }

        let mut staged = staged.into_iter();
        while let Some((tmp, path)) = staged.next() {
            if let Err(e) = fs::rename(&tmp, &path) {
                let _ = fs::remove_file(&tmp);
                for (tmp, _) in staged {
                    let _ = fs::remove_file(tmp);
                }

                return Err(OgdError::write(&path, e));
            }

            log::debug!("wrote {}", path.display());
        }

        Ok(())
    }

    /// Reads a snapshot from `dir`. A missing or unreadable table is
    /// reported as [OgdError::DataNotFound].
    pub(crate) fn read(dir: &Path, format: SnapshotFormat) -> OgdResult<Self> {
        Ok(Self {
            kw_metrics: read_frame(&format.path(dir, KW_METRICS), format)?,
            publisher_scores: read_frame(
                &format.path(dir, PUBLISHER_SCORES),
                format,
            )?,
            publisher_score_dist: read_frame(
                &format.path(dir, PUBLISHER_SCORE_DIST),
                format,
            )?,
            kpis: read_frame(&format.path(dir, KPIS), format)?,
        })
    }

    fn tables_mut(&mut self) -> [(&'static str, &mut DataFrame); 4] {
        [
            (KW_METRICS, &mut self.kw_metrics),
            (PUBLISHER_SCORES, &mut self.publisher_scores),
            (PUBLISHER_SCORE_DIST, &mut self.publisher_score_dist),
            (KPIS, &mut self.kpis),
        ]
    }

    pub(crate) fn keywords(&self) -> OgdResult<Vec<KeywordRow>> {
        let df = &self.kw_metrics;
        let keyword = str_values(df, "keyword")?;
        let total = u64_values(df, "datasets_total")?;
        let new = u64_values(df, "datasets_new_12m")?;
        let upd = u64_values(df, "datasets_upd_12m")?;

        Ok((0..df.height())
            .map(|i| KeywordRow {
                keyword: keyword[i].clone(),
                datasets_total: total[i],
                datasets_new_12m: new[i],
                datasets_upd_12m: upd[i],
            })
            .collect())
    }

    pub(crate) fn publishers(&self) -> OgdResult<Vec<PublisherRow>> {
        let df = &self.publisher_scores;
        let publisher = str_values(df, "publisher")?;
        let datasets = u64_values(df, "datasets")?;
        let avg = f64_values(df, "avg_score")?;
        let med = f64_values(df, "med_score")?;

        Ok((0..df.height())
            .map(|i| PublisherRow {
                publisher: publisher[i].clone(),
                datasets: datasets[i],
                avg_score: avg[i],
                med_score: med[i],
            })
            .collect())
    }

    pub(crate) fn score_buckets(&self) -> OgdResult<Vec<ScoreBucket>> {
        let df = &self.publisher_score_dist;
        let publisher = str_values(df, "publisher")?;
        let datasets = u64_values(df, "datasets")?;
        let score = df
            .column("dataset_best_score")?
            .cast(&DataType::UInt8)?;

        Ok(score
            .u8()?
            .into_iter()
            .enumerate()
            .map(|(i, score)| ScoreBucket {
                publisher: publisher[i].clone(),
                dataset_best_score: score,
                datasets: datasets[i],
            })
            .collect())
    }

    pub(crate) fn kpis(&self) -> OgdResult<Kpis> {
        let df = &self.kpis;
        if df.height() != 1 {
            bail!("expected a single kpi row, got {}", df.height());
        }

        Ok(Kpis {
            datasets_total: u64_values(df, "datasets_total")?[0],
            publishers_total: u64_values(df, "publishers_total")?[0],
            keywords_total: u64_values(df, "keywords_total")?[0],
            last_modified_max: datetime_values(df, "last_modified_max")?[0],
            run_timestamp: datetime_values(df, "run_timestamp")?[0],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct KeywordRow {
    pub(crate) keyword: String,
    pub(crate) datasets_total: u64,
    pub(crate) datasets_new_12m: u64,
    pub(crate) datasets_upd_12m: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct PublisherRow {
    pub(crate) publisher: String,
    pub(crate) datasets: u64,
    pub(crate) avg_score: Option<f64>,
    pub(crate) med_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ScoreBucket {
    pub(crate) publisher: String,
    pub(crate) dataset_best_score: Option<u8>,
    pub(crate) datasets: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Kpis {
    pub(crate) datasets_total: u64,
    pub(crate) publishers_total: u64,
    pub(crate) keywords_total: u64,
    pub(crate) last_modified_max: Option<DateTime<Utc>>,
    pub(crate) run_timestamp: Option<DateTime<Utc>>,
}

fn write_frame(
    path: &Path,
    df: &mut DataFrame,
    format: SnapshotFormat,
) -> OgdResult<()> {
    let file = File::create(path).map_err(|e| OgdError::write(path, e))?;
    let result = match format {
        SnapshotFormat::Parquet => ParquetWriter::new(file)
            .with_compression(ParquetCompression::Zstd(None))
            .finish(df)
            .map(|_| ()),
        SnapshotFormat::Ipc => IpcWriter::new(file)
            .with_compression(Some(IpcCompression::ZSTD))
            .finish(df),
    };

    result.map_err(|e| OgdError::write(path, io::Error::other(e)))
}

pub(crate) fn read_frame(
    path: &Path,
    format: SnapshotFormat,
) -> OgdResult<DataFrame> {
    let not_found = || OgdError::DataNotFound { path: path.into() };
    let file = File::open(path).map_err(|_| not_found())?;

    let result = match format {
        SnapshotFormat::Parquet => ParquetReader::new(file).finish(),
        SnapshotFormat::Ipc => IpcReader::new(file).finish(),
    };

    result.map_err(|e| {
        log::warn!("unable to read {}: {e}", path.display());
        not_found()
    })
}

fn str_values(df: &DataFrame, name: &str) -> OgdResult<Vec<String>> {
    Ok(df
        .column(name)?
        .str()?
        .into_iter()
        .map(|value| value.unwrap_or_default().to_string())
        .collect())
}

fn u64_values(df: &DataFrame, name: &str) -> OgdResult<Vec<u64>> {
    let series = df.column(name)?.cast(&DataType::UInt64)?;
    let values = series
        .u64()?
        .into_iter()
        .map(|value| value.unwrap_or_default())
        .collect();

    Ok(values)
}

fn f64_values(df: &DataFrame, name: &str) -> OgdResult<Vec<Option<f64>>> {
    let series = df.column(name)?.cast(&DataType::Float64)?;
    let values = series.f64()?.into_iter().collect();
    Ok(values)
}

fn datetime_values(
    df: &DataFrame,
    name: &str,
) -> OgdResult<Vec<Option<DateTime<Utc>>>> {
    let series = df
        .column(name)?
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        .cast(&DataType::Int64)?;

    let values = series
        .i64()?
        .into_iter()
        .map(|value| value.and_then(DateTime::from_timestamp_millis))
        .collect();

    Ok(values)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::catalog::{Catalog, Distribution, Record};
    use crate::metrics;

    type TestResult = anyhow::Result<()>;

    fn snapshot() -> anyhow::Result<Snapshot> {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let catalog = Catalog {
            records: vec![
                Record {
                    identifier: "a".into(),
                    keywords: vec!["geo".into()],
                    publishers: vec!["P1".into()],
                    distributions: vec![Distribution {
                        format: Some("sparql".into()),
                        ..Default::default()
                    }],
                    modified: Some(now),
                    ..Default::default()
                },
                Record {
                    identifier: "b".into(),
                    keywords: vec!["geo".into(), "zh".into()],
                    publishers: vec!["P1".into()],
                    ..Default::default()
                },
            ],
        };

        Ok(metrics::compute(&catalog, now)?)
    }

    fn write_and_read(format: SnapshotFormat) -> TestResult {
        let dir = tempfile::tempdir()?;
        let mut snapshot = snapshot()?;
        snapshot.write(dir.path(), format)?;

        for name in [KW_METRICS, PUBLISHER_SCORES, PUBLISHER_SCORE_DIST, KPIS]
        {
            assert!(format.path(dir.path(), name).is_file());
        }

        assert_eq!(tmp_files(dir.path())?, 0);

        let restored = Snapshot::read(dir.path(), format)?;
        assert_eq!(restored.keywords()?, snapshot.keywords()?);
        assert_eq!(restored.publishers()?, snapshot.publishers()?);
        assert_eq!(restored.score_buckets()?, snapshot.score_buckets()?);
        assert_eq!(restored.kpis()?, snapshot.kpis()?);

        let kpis = restored.kpis()?;
        assert_eq!(kpis.datasets_total, 2);
        assert_eq!(kpis.publishers_total, 1);
        assert_eq!(kpis.keywords_total, 2);
        assert_eq!(kpis.last_modified_max, kpis.run_timestamp);

        let buckets = restored.score_buckets()?;
        assert_eq!(
            buckets,
            vec![
                ScoreBucket {
                    publisher: "P1".into(),
                    dataset_best_score: Some(5),
                    datasets: 1,
                },
                ScoreBucket {
                    publisher: "P1".into(),
                    dataset_best_score: None,
                    datasets: 1,
                },
            ]
        );

        let publishers = restored.publishers()?;
        assert_eq!(publishers[0].avg_score, Some(5.0));
        assert_eq!(publishers[0].datasets, 2);

        Ok(())
    }

    #[test]
    fn write_and_read_parquet() -> TestResult {
        write_and_read(SnapshotFormat::Parquet)
    }

    #[test]
    fn write_and_read_ipc() -> TestResult {
        write_and_read(SnapshotFormat::Ipc)
    }

    #[test]
    fn write_overwrites_previous_snapshot() -> TestResult {
        let dir = tempfile::tempdir()?;
        let format = SnapshotFormat::Parquet;

        fs::write(format.path(dir.path(), KPIS), b"stale")?;
        snapshot()?.write(dir.path(), format)?;

        let restored = Snapshot::read(dir.path(), format)?;
        assert_eq!(restored.kpis()?.datasets_total, 2);
        Ok(())
    }

    fn tmp_files(dir: &Path) -> anyhow::Result<usize> {
        Ok(fs::read_dir(dir)?
            .filter_map(Result::ok)
            .filter(|entry| entry.path().to_string_lossy().ends_with(".tmp"))
            .count())
    }

    #[test]
    fn write_into_regular_file_fails() -> TestResult {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("data");
        fs::write(&out, b"not a directory")?;

        let result = snapshot()?.write(&out, SnapshotFormat::Parquet);
        assert!(matches!(result, Err(OgdError::Write { .. })));
        assert_eq!(fs::read(&out)?, b"not a directory");
        Ok(())
    }

    #[test]
    fn failed_rename_removes_staged_files() -> TestResult {
        let dir = tempfile::tempdir()?;
        let format = SnapshotFormat::Ipc;

        // a non-empty directory can't be replaced by a file
        let blocker = format.path(dir.path(), KW_METRICS);
        fs::create_dir(&blocker)?;
        fs::write(blocker.join("keep"), b"")?;

        let result = snapshot()?.write(dir.path(), format);
        assert!(matches!(result, Err(OgdError::Write { .. })));
        assert_eq!(tmp_files(dir.path())?, 0);
        assert!(!format.path(dir.path(), KPIS).exists());
        Ok(())
    }

    #[test]
    fn read_missing_snapshot() -> TestResult {
        let dir = tempfile::tempdir()?;
        let result = Snapshot::read(dir.path(), SnapshotFormat::Parquet);
        assert!(matches!(result, Err(OgdError::DataNotFound { .. })));

        fs::write(
            SnapshotFormat::Ipc.path(dir.path(), KW_METRICS),
            b"garbage",
        )?;
        let result = Snapshot::read(dir.path(), SnapshotFormat::Ipc);
        assert!(matches!(result, Err(OgdError::DataNotFound { .. })));
        Ok(())
    }

    #[test]
    fn snapshot_format_paths() {
        let dir = Path::new("/tmp/out");
        assert_eq!(
            SnapshotFormat::Parquet.path(dir, KPIS),
            PathBuf::from("/tmp/out/kpis.parquet")
        );
        assert_eq!(
            SnapshotFormat::Ipc.path(dir, KW_METRICS),
            PathBuf::from("/tmp/out/kw_metrics.ipc")
        );
    }
}
