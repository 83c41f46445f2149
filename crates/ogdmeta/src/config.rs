use std::fs::{self, File};
use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{bail, OgdError, OgdResult};
use crate::snapshot::SnapshotFormat;

/// The catalog of the statistical office of the canton of Zurich.
pub(crate) const DEFAULT_CATALOG_URL: &str =
    "https://www.web.statistik.zh.ch/ogd/daten/zhweb.json";

/// Project config.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Config {
    /// The path of the config.
    #[serde(skip)]
    path: PathBuf,

    /// Project metadata.
    #[serde(default)]
    pub(crate) metadata: Metadata,

    /// Where and how to get the catalog.
    #[serde(default)]
    pub(crate) catalog: Catalog,

    /// Where and how to write the snapshot.
    #[serde(default)]
    pub(crate) output: Output,

    /// Options of the `serve` command.
    pub(crate) server: Option<Server>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Metadata {
    /// The name of the project.
    pub(crate) name: String,

    /// A short blurb about the project.
    pub(crate) description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Catalog {
    /// The location of the catalog document.
    pub(crate) url: Url,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub(crate) timeout: u64,
}

#[inline]
fn default_timeout() -> u64 {
    60
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            url: Url::parse(DEFAULT_CATALOG_URL).expect("valid url"),
            timeout: default_timeout(),
        }
    }
}

impl Catalog {
    /// Changes the catalog URL. Only `http` and `https` are accepted.
    pub(crate) fn set_url(&mut self, url: Url) -> OgdResult<()> {
        check_scheme(&url)?;
        self.url = url;
        Ok(())
    }
}

pub(crate) fn check_scheme(url: &Url) -> OgdResult<()> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => bail!("unsupported scheme {scheme}"),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Output {
    /// The snapshot directory, relative to the project root.
    pub(crate) dir: PathBuf,

    /// The file format of the snapshot tables.
    #[serde(default)]
    pub(crate) format: SnapshotFormat,
}

impl Default for Output {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(crate::project::Project::DATA_DIR),
            format: SnapshotFormat::default(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Server {
    pub(crate) address: Option<IpAddr>,
    pub(crate) port: Option<u16>,
}

impl Config {
    /// Creates a new default config and sets the file location.
    pub(crate) fn create<P>(path: P) -> Self
    where
        P: AsRef<Path>,
    {
        Self {
            path: path.as_ref().into(),
            ..Default::default()
        }
    }

    /// Loads an existing config from a path.
    pub(crate) fn from_path<P>(path: P) -> OgdResult<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref().into();
        let content = fs::read_to_string(&path)?;
        let mut config: Self = toml::from_str(&content)?;
        check_scheme(&config.catalog.url)?;
        config.path = path;

        Ok(config)
    }

    /// Saves the config.
    pub(crate) fn save(&self) -> OgdResult<()> {
        let content =
            toml::to_string(self).map_err(OgdError::other)?;
        let mut out = File::create(&self.path)
            .map_err(|e| OgdError::write(&self.path, e))?;
        out.write_all(content.as_bytes())
            .map_err(|e| OgdError::write(&self.path, e))?;
        Ok(())
    }
}
