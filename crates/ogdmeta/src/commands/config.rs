use clap::{Parser, ValueEnum};
use url::Url;

use crate::config::Server;
use crate::prelude::*;
use crate::snapshot::SnapshotFormat;

const OPTIONS: [&str; 6] = [
    "catalog.url",
    "catalog.timeout",
    "output.dir",
    "output.format",
    "server.address",
    "server.port",
];

/// Get and set project config options.
#[derive(Debug, Parser)]
pub(crate) struct Config {
    /// Get the value for the given key.
    #[arg(long, conflicts_with_all = ["value", "unset", "set"])]
    get: bool,

    /// Reset the key to its default value.
    #[arg(long, conflicts_with_all = ["value", "get", "set"])]
    unset: bool,

    /// Set the value for the given key.
    #[arg(long, requires = "value", conflicts_with_all = ["get", "unset"])]
    set: bool,

    /// The name of the config option.
    name: String,

    /// The (new) value of the config option.
    #[arg(conflicts_with_all = ["get", "unset"])]
    value: Option<String>,
}

#[inline]
fn print_option<T>(key: &str, value: Option<T>)
where
    T: ToString,
{
    println!(
        "{key} = {}",
        match value {
            Some(value) => value.to_string(),
            None => "None".to_string(),
        }
    );
}

#[inline]
fn parse<T: std::str::FromStr>(value: &str) -> OgdResult<T> {
    value
        .parse::<T>()
        .map_err(|_| OgdError::Other(format!("invalid value `{value}`")))
}

fn set(
    config: &mut crate::config::Config,
    name: &str,
    value: &str,
) -> OgdResult<()> {
    match name {
        "catalog.url" => config.catalog.set_url(parse::<Url>(value)?)?,
        "catalog.timeout" => config.catalog.timeout = parse(value)?,
        "output.dir" => config.output.dir = value.into(),
        "output.format" => {
            config.output.format = SnapshotFormat::from_str(value, true)
                .map_err(OgdError::Other)?
        }
        "server.address" => {
            config.server.get_or_insert_with(Server::default).address =
                Some(parse(value)?)
        }
        "server.port" => {
            config.server.get_or_insert_with(Server::default).port =
                Some(parse(value)?)
        }
        _ => unreachable!(),
    }

    Ok(())
}

fn unset(config: &mut crate::config::Config, name: &str) {
    let defaults = crate::config::Config::default();

    match name {
        "catalog.url" => config.catalog.url = defaults.catalog.url,
        "catalog.timeout" => config.catalog.timeout = defaults.catalog.timeout,
        "output.dir" => config.output.dir = defaults.output.dir,
        "output.format" => config.output.format = defaults.output.format,
        "server.address" => {
            if let Some(ref mut server) = config.server {
                server.address = None;
            }
        }
        "server.port" => {
            if let Some(ref mut server) = config.server {
                server.port = None;
            }
        }
        _ => unreachable!(),
    }
}

fn get(config: &crate::config::Config, name: &str) {
    let server = config.server.as_ref();

    match name {
        "catalog.url" => print_option(name, Some(&config.catalog.url)),
        "catalog.timeout" => print_option(name, Some(config.catalog.timeout)),
        "output.dir" => {
            print_option(name, Some(config.output.dir.display()))
        }
        "output.format" => print_option(name, Some(config.output.format)),
        "server.address" => {
            print_option(name, server.and_then(|s| s.address))
        }
        "server.port" => print_option(name, server.and_then(|s| s.port)),
        _ => unreachable!(),
    }
}

impl Config {
    pub(crate) fn execute(self) -> OgdResult<()> {
        let project = Project::discover()?;
        let mut config = project.config()?;

        let name = match self.name.as_str() {
            name if OPTIONS.contains(&name) => name,
            name => {
                bail!("unknown config option `{name}`");
            }
        };

        if let Some(ref value) = self.value {
            set(&mut config, name, value)?;
            config.save()?;
        } else if self.unset {
            unset(&mut config, name);
            config.save()?;
        } else {
            get(&config, name);
        }

        Ok(())
    }
}
