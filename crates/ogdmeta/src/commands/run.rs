use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use url::Url;

use crate::catalog::Catalog;
use crate::config::check_scheme;
use crate::metrics;
use crate::prelude::*;
use crate::snapshot::SnapshotFormat;

const PBAR_FETCH: &str =
    "{spinner} Fetching catalog | elapsed: {elapsed_precise}{msg}";

/// Fetch the catalog, compute all metrics and write the snapshot.
#[derive(Debug, Default, Parser)]
pub(crate) struct Run {
    /// The location of the catalog. If not set, the `catalog.url`
    /// option of the project config (or the default catalog) is used.
    #[arg(
        long,
        env = "OGDMETA_CATALOG_URL",
        hide_env_values = true,
        conflicts_with = "input"
    )]
    url: Option<Url>,

    /// Request timeout in seconds. A request that takes longer
    /// aborts the run.
    #[arg(long, value_name = "seconds")]
    timeout: Option<u64>,

    /// Read the catalog from `filename` instead of fetching it.
    #[arg(short, long, value_name = "filename")]
    input: Option<PathBuf>,

    /// The file format of the snapshot tables.
    #[arg(long)]
    format: Option<SnapshotFormat>,

    /// Write the snapshot into `dir`. By default the snapshot is
    /// written into the `output.dir` directory of the project.
    #[arg(short, long, value_name = "dir")]
    output: Option<PathBuf>,
}

impl Run {
    pub(crate) fn execute(self, quiet: bool) -> OgdResult<()> {
        let started = Utc::now();
        let project = Project::discover_or_current()?;
        let config = project.config()?;

        let catalog = match self.input {
            Some(ref path) => Catalog::from_path(path)?,
            None => {
                let url = self.url.unwrap_or(config.catalog.url.clone());
                check_scheme(&url)?;

                let timeout = Duration::from_secs(
                    self.timeout.unwrap_or(config.catalog.timeout),
                );

                let pbar = ProgressBarBuilder::new(PBAR_FETCH, quiet).build();
                pbar.enable_steady_tick(Duration::from_millis(100));
                let result = Catalog::fetch(&url, timeout);
                pbar.finish_and_clear();
                result?
            }
        };

        log::info!("normalized {} datasets", catalog.len());

        let mut snapshot = metrics::compute(&catalog, started)?;
        let format = self.format.unwrap_or(config.output.format);
        let dir = self
            .output
            .unwrap_or_else(|| project.output_dir(&config));

        snapshot.write(&dir, format)?;
        log::info!("Pipeline finished. Files written to {}", dir.display());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::{fs, thread};

    use actix_web::dev::ServerHandle;
    use actix_web::http::StatusCode;
    use actix_web::{web, App, HttpResponse, HttpServer};

    use super::*;
    use crate::snapshot::Snapshot;

    type TestResult = anyhow::Result<()>;

    /// Starts a server on an ephemeral port, which answers every
    /// request with `status`.
    fn serve_status(status: StatusCode) -> anyhow::Result<(u16, ServerHandle)> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            actix_web::rt::System::new().block_on(async move {
                let server = HttpServer::new(move || {
                    App::new().default_service(web::to(move || async move {
                        HttpResponse::build(status).finish()
                    }))
                })
                .workers(1)
                .bind(("127.0.0.1", 0))?;

                let port = server.addrs()[0].port();
                let server = server.run();
                let _ = tx.send((port, server.handle()));
                server.await
            })
        });

        Ok(rx.recv()?)
    }

    #[test]
    fn run_from_file() -> TestResult {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("catalog.json");
        fs::write(
            &input,
            r#"{"dataset": [
                {"identifier": "x", "keyword": ["a"], "publisher": ["P"],
                 "distribution": [{"format": "CSV"}]}
            ]}"#,
        )?;

        let out = dir.path().join("data");
        let cmd = Run {
            input: Some(input),
            output: Some(out.clone()),
            format: Some(SnapshotFormat::Ipc),
            ..Default::default()
        };
        cmd.execute(true)?;

        let snapshot = Snapshot::read(&out, SnapshotFormat::Ipc)?;
        assert_eq!(snapshot.kpis()?.datasets_total, 1);
        assert_eq!(snapshot.publishers()?[0].avg_score, Some(2.0));
        Ok(())
    }

    #[test]
    fn run_with_invalid_catalog_writes_nothing() -> TestResult {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("catalog.json");
        fs::write(&input, "[1, 2, 3]")?;

        let out = dir.path().join("data");
        let cmd = Run {
            input: Some(input),
            output: Some(out.clone()),
            ..Default::default()
        };

        assert!(matches!(cmd.execute(true), Err(OgdError::Catalog(_))));
        assert!(!out.exists());
        Ok(())
    }

    #[test]
    fn run_fetch_error_writes_nothing() -> TestResult {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("data");
        let cmd = Run {
            url: Some(Url::parse("http://127.0.0.1:1/catalog.json")?),
            timeout: Some(2),
            output: Some(out.clone()),
            ..Default::default()
        };

        assert!(matches!(cmd.execute(true), Err(OgdError::Fetch(_))));
        assert!(!out.exists());
        Ok(())
    }

    #[test]
    fn run_non_success_status_writes_nothing() -> TestResult {
        let (port, handle) = serve_status(StatusCode::NOT_FOUND)?;

        let dir = tempfile::tempdir()?;
        let out = dir.path().join("data");
        let cmd = Run {
            url: Some(Url::parse(&format!(
                "http://127.0.0.1:{port}/catalog.json"
            ))?),
            timeout: Some(5),
            output: Some(out.clone()),
            ..Default::default()
        };

        let result = cmd.execute(true);
        actix_web::rt::System::new().block_on(handle.stop(false));

        match result {
            Err(OgdError::Fetch(e)) => {
                assert_eq!(e.status(), Some(reqwest::StatusCode::NOT_FOUND));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        assert!(!out.exists());
        Ok(())
    }
}
