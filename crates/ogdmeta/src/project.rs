use std::path::PathBuf;
use std::{env, fs};

use crate::config::Config;
use crate::prelude::*;

pub(crate) struct Project {
    /// The root directory of the project.
    root_dir: PathBuf,
}

impl Project {
    pub(crate) const CONFIG: &'static str = "ogdmeta.toml";
    pub(crate) const DATA_DIR: &'static str = "data";

    /// Discovers the root of the project.
    ///
    /// This function fails, if neither the current directory nor any
    /// parent directory contains a project [Config].
    pub(crate) fn discover() -> OgdResult<Self> {
        let mut root_dir = env::current_dir()?;

        loop {
            if let Ok(metadata) =
                fs::metadata(root_dir.join(Self::CONFIG))
            {
                if metadata.is_file() {
                    break;
                }
            }

            if !root_dir.pop() {
                bail!("not an ogdmeta project (or any parent directory)");
            }
        }

        Ok(Self { root_dir })
    }

    /// Like [Project::discover], but falls back to the current
    /// directory, if no project config could be found.
    pub(crate) fn discover_or_current() -> OgdResult<Self> {
        match Self::discover() {
            Ok(project) => Ok(project),
            Err(_) => {
                log::debug!("no {} found, using defaults", Self::CONFIG);
                Ok(Self {
                    root_dir: env::current_dir()?,
                })
            }
        }
    }

    /// Returns the config associated with the project. A missing
    /// config file yields the default config.
    pub(crate) fn config(&self) -> OgdResult<Config> {
        let path = self.root_dir.join(Self::CONFIG);
        if path.is_file() {
            Config::from_path(path)
        } else {
            Ok(Config::create(path))
        }
    }

    /// Returns the base directory of the project.
    #[inline]
    pub(crate) fn base_dir(&self) -> &PathBuf {
        &self.root_dir
    }

    /// Returns the snapshot directory configured in `config`.
    #[inline]
    pub(crate) fn output_dir(&self, config: &Config) -> PathBuf {
        self.root_dir.join(&config.output.dir)
    }
}
