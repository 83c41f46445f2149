use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Mutex;

use actix_web::{get, head, web, App, HttpResponse, HttpServer};
use clap::Parser;
use serde::Deserialize;

use crate::cache::SnapshotCache;
use crate::prelude::*;
use crate::snapshot::{Snapshot, SnapshotFormat};
use crate::view::{top_keywords, top_publishers, KeywordMetric, ScoreMatrix};

/// Serve the latest snapshot as a read-only JSON API.
#[derive(Debug, Default, Parser)]
pub(crate) struct Serve {
    #[arg(short, long)]
    port: Option<u16>,

    #[arg(long)]
    address: Option<IpAddr>,

    /// The file format of the snapshot tables. Defaults to the
    /// `output.format` option of the project config.
    #[arg(long)]
    format: Option<SnapshotFormat>,

    /// Serve the snapshot in `dir` instead of the project's output
    /// directory.
    #[arg(value_name = "dir")]
    dir: Option<PathBuf>,
}

struct AppState {
    dir: PathBuf,
    format: SnapshotFormat,
    cache: Mutex<SnapshotCache>,
}

impl AppState {
    fn snapshot(&self) -> OgdResult<Snapshot> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| OgdError::other("snapshot cache is poisoned"))?;
        cache.load(&self.dir, self.format)
    }
}

#[derive(Debug, Deserialize)]
struct TopQuery {
    top: Option<usize>,
    metric: Option<KeywordMetric>,
}

const DEFAULT_TOP_KEYWORDS: usize = 50;
const DEFAULT_TOP_PUBLISHERS: usize = 25;

fn error_response(e: OgdError) -> HttpResponse {
    match e {
        OgdError::DataNotFound { .. } => {
            HttpResponse::ServiceUnavailable().body(e.to_string())
        }
        e => {
            log::error!("{e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[get("/api/kpis")]
async fn kpis(state: web::Data<AppState>) -> HttpResponse {
    match state.snapshot().and_then(|s| s.kpis()) {
        Ok(kpis) => HttpResponse::Ok().json(kpis),
        Err(e) => error_response(e),
    }
}

#[get("/api/keywords")]
async fn keywords(
    state: web::Data<AppState>,
    query: web::Query<TopQuery>,
) -> HttpResponse {
    let metric = query.metric.unwrap_or_default();
    let top = query.top.unwrap_or(DEFAULT_TOP_KEYWORDS);

    match state.snapshot().and_then(|s| s.keywords()) {
        Ok(rows) => HttpResponse::Ok().json(top_keywords(rows, metric, top)),
        Err(e) => error_response(e),
    }
}

#[get("/api/publishers")]
async fn publishers(
    state: web::Data<AppState>,
    query: web::Query<TopQuery>,
) -> HttpResponse {
    let top = query.top.unwrap_or(DEFAULT_TOP_PUBLISHERS);

    match state.snapshot().and_then(|s| s.publishers()) {
        Ok(rows) => HttpResponse::Ok().json(top_publishers(rows, top)),
        Err(e) => error_response(e),
    }
}

#[get("/api/publishers/matrix")]
async fn matrix(
    state: web::Data<AppState>,
    query: web::Query<TopQuery>,
) -> HttpResponse {
    let top = query.top.unwrap_or(usize::MAX);

    match state.snapshot().and_then(|s| s.score_buckets()) {
        Ok(buckets) => {
            HttpResponse::Ok().json(ScoreMatrix::from_buckets(&buckets, top))
        }
        Err(e) => error_response(e),
    }
}

#[head("/health-check")]
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().finish()
}

impl Serve {
    pub(crate) fn execute(self) -> OgdResult<()> {
        let project = Project::discover_or_current()?;
        let config = project.config()?;

        let server_config = config.server.unwrap_or_default();
        let port = self.port.or(server_config.port).unwrap_or(9001);
        let addr = self
            .address
            .or(server_config.address)
            .unwrap_or(IpAddr::from([0, 0, 0, 0]));

        let dir = self
            .dir
            .unwrap_or_else(|| project.base_dir().join(&config.output.dir));

        let app_data = web::Data::new(AppState {
            format: self.format.unwrap_or(config.output.format),
            cache: Mutex::new(SnapshotCache::default()),
            dir,
        });

        log::info!("serving snapshot on http://{addr}:{port}");

        actix_web::rt::System::new().block_on(async move {
            HttpServer::new(move || {
                App::new()
                    .app_data(app_data.clone())
                    .service(health_check)
                    .service(kpis)
                    .service(keywords)
                    .service(matrix)
                    .service(publishers)
            })
            .workers(2)
            .bind((addr, port))?
            .run()
            .await
        })?;

        Ok(())
    }
}
