use std::io::ErrorKind;
use std::process;

use clap::Parser;
use cli::{Args, Command};
use error::{OgdError, OgdResult};
use polars::error::PolarsError;

mod cache;
mod catalog;
mod cli;
mod commands;
mod config;
mod error;
mod metrics;
mod prelude;
mod progress;
mod project;
mod snapshot;
mod tier;
mod view;

fn run(args: Args) -> OgdResult<()> {
    let quiet = args.quiet;

    match args.cmd {
        Command::Completions(cmd) => cmd.execute(),
        Command::Config(cmd) => cmd.execute(),
        Command::Init(cmd) => cmd.execute(),
        Command::Run(cmd) => cmd.execute(quiet),
        Command::Serve(cmd) => cmd.execute(),
        Command::Show(cmd) => cmd.execute(),
    }
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level())
        .format_timestamp(None)
        .parse_default_env()
        .init();

    match run(args) {
        Ok(()) => process::exit(0),
        Err(OgdError::IO(e)) if e.kind() == ErrorKind::BrokenPipe => {
            process::exit(0)
        }
        Err(OgdError::Polars(PolarsError::IO { error, .. }))
            if error.kind() == ErrorKind::BrokenPipe =>
        {
            process::exit(0);
        }
        Err(e @ OgdError::DataNotFound { .. }) => {
            eprintln!("{e}");
            process::exit(2);
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}
