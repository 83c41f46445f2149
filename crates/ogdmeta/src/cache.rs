use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use hashbrown::HashMap;
use polars::prelude::DataFrame;

use crate::prelude::*;
use crate::snapshot::{
    read_frame, Snapshot, SnapshotFormat, KPIS, KW_METRICS,
    PUBLISHER_SCORES, PUBLISHER_SCORE_DIST,
};

#[derive(Debug)]
struct Entry {
    modified: SystemTime,
    frame: DataFrame,
}

/// In-memory cache of snapshot tables, keyed by file path. An entry is
/// reloaded as soon as the modification time of its file changes.
#[derive(Debug, Default)]
pub(crate) struct SnapshotCache {
    entries: HashMap<PathBuf, Entry>,
    reads: usize,
}

impl SnapshotCache {
    /// Returns the snapshot in `dir`, reading only those tables that
    /// are not cached or whose files have changed.
    pub(crate) fn load(
        &mut self,
        dir: &Path,
        format: SnapshotFormat,
    ) -> OgdResult<Snapshot> {
        Ok(Snapshot {
            kw_metrics: self.frame(&format.path(dir, KW_METRICS), format)?,
            publisher_scores: self
                .frame(&format.path(dir, PUBLISHER_SCORES), format)?,
            publisher_score_dist: self
                .frame(&format.path(dir, PUBLISHER_SCORE_DIST), format)?,
            kpis: self.frame(&format.path(dir, KPIS), format)?,
        })
    }

    /// Number of file reads since the cache was created.
    #[cfg(test)]
    pub(crate) fn reads(&self) -> usize {
        self.reads
    }

    fn frame(
        &mut self,
        path: &Path,
        format: SnapshotFormat,
    ) -> OgdResult<DataFrame> {
        let modified = fs::metadata(path)
            .and_then(|metadata| metadata.modified())
            .map_err(|_| {
                self.entries.remove(path);
                OgdError::DataNotFound { path: path.into() }
            })?;

        if let Some(entry) = self.entries.get(path) {
            if entry.modified == modified {
                return Ok(entry.frame.clone());
            }
        }

        let frame = read_frame(path, format)?;
        self.reads += 1;
        log::debug!("loaded {} (read #{})", path.display(), self.reads);
        self.entries.insert(
            path.into(),
            Entry {
                modified,
                frame: frame.clone(),
            },
        );

        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::catalog::{Catalog, Record};
    use crate::metrics;

    type TestResult = anyhow::Result<()>;

    fn catalog(ids: &[&str]) -> Catalog {
        Catalog {
            records: ids
                .iter()
                .map(|id| Record {
                    identifier: id.to_string(),
                    keywords: vec!["kw".into()],
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn cache_reloads_changed_files() -> TestResult {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let dir = tempfile::tempdir()?;
        let format = SnapshotFormat::Ipc;
        metrics::compute(&catalog(&["a"]), now)?.write(dir.path(), format)?;

        let mut cache = SnapshotCache::default();
        let snapshot = cache.load(dir.path(), format)?;
        assert_eq!(snapshot.kpis()?.datasets_total, 1);
        assert_eq!(cache.reads(), 4);

        let _ = cache.load(dir.path(), format)?;
        assert_eq!(cache.reads(), 4);

        metrics::compute(&catalog(&["a", "b"]), now)?
            .write(dir.path(), format)?;

        // make sure the change is visible on file systems with a coarse
        // timestamp resolution
        let later = SystemTime::now() + Duration::from_secs(10);
        for name in [KW_METRICS, PUBLISHER_SCORES, PUBLISHER_SCORE_DIST, KPIS]
        {
            File::options()
                .write(true)
                .open(format.path(dir.path(), name))?
                .set_modified(later)?;
        }

        let snapshot = cache.load(dir.path(), format)?;
        assert_eq!(snapshot.kpis()?.datasets_total, 2);
        assert_eq!(cache.reads(), 8);
        Ok(())
    }

    #[test]
    fn cache_reports_missing_files() -> TestResult {
        let dir = tempfile::tempdir()?;
        let mut cache = SnapshotCache::default();
        let result = cache.load(dir.path(), SnapshotFormat::Parquet);
        assert!(matches!(result, Err(OgdError::DataNotFound { .. })));
        assert_eq!(cache.reads(), 0);
        Ok(())
    }
}
