use std::ffi::OsStr;
use std::path::PathBuf;
use std::{env, fs};

use clap::Parser;
use url::Url;

use crate::config::Config;
use crate::prelude::*;
use crate::snapshot::SnapshotFormat;

const GITIGNORE: &str = "# ogdmeta\n/data\n";

/// Initialize a new or re-initialize an existing project.
#[derive(Debug, Default, Parser)]
pub(crate) struct Init {
    /// The name of the project.
    #[arg(short, long)]
    name: Option<String>,

    /// A short blurb about the project.
    #[arg(short, long)]
    description: Option<String>,

    /// The location of the catalog.
    #[arg(long)]
    url: Option<Url>,

    /// The file format of the snapshot tables.
    #[arg(long)]
    format: Option<SnapshotFormat>,

    /// Whether to overwrite config with default values or not.
    #[arg(short, long)]
    force: bool,

    /// The location of the project.
    #[arg(default_value = ".")]
    path: PathBuf,
}

impl Init {
    pub(crate) fn execute(self) -> OgdResult<()> {
        let root_dir = env::current_dir()?.join(self.path);
        let data_dir = root_dir.join(Project::DATA_DIR);
        let config = root_dir.join(Project::CONFIG);

        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)
                .map_err(|e| OgdError::write(&root_dir, e))?;
            log::info!("Initialize new project in {}", root_dir.display());
        } else {
            log::info!(
                "Re-Initialize existing project in {}",
                root_dir.display()
            );
        }

        if !data_dir.exists() {
            fs::create_dir_all(&data_dir)
                .map_err(|e| OgdError::write(&data_dir, e))?;
        }

        let gitignore = root_dir.join(".gitignore");
        if !gitignore.is_file() {
            fs::write(&gitignore, GITIGNORE)
                .map_err(|e| OgdError::write(&gitignore, e))?;
        }

        if !config.exists() || self.force {
            let mut config = Config::create(config);
            config.metadata.description = self.description;
            config.metadata.name = self.name.unwrap_or(
                root_dir
                    .file_name()
                    .and_then(OsStr::to_str)
                    .unwrap_or_default()
                    .to_string(),
            );

            if let Some(url) = self.url {
                config.catalog.set_url(url)?;
            }

            if let Some(format) = self.format {
                config.output.format = format;
            }

            config.save()?;
        } else {
            log::warn!("config already exists, use --force to overwrite");
        }

        Ok(())
    }
}
