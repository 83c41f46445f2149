pub(crate) use completions::Completions;
pub(crate) use config::Config;
pub(crate) use init::Init;
pub(crate) use run::Run;
pub(crate) use serve::Serve;
pub(crate) use show::Show;

mod completions;
mod config;
mod init;
mod run;
mod serve;
mod show;
