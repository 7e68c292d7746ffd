use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "runonce",
    version,
    about = "Run a command at most once, recording its output as an execution log",
    override_usage = "runonce [OPTIONS] -- <COMMAND> [ARGS]..."
)]
pub struct Args {
    /// Directory for the execution log file.
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Run name; the log is stored as `<name><postfix>`.
    #[arg(long)]
    pub name: Option<String>,

    /// Also stream the log to an object store, e.g. `s3://bucket/prefix/`.
    #[arg(long, value_name = "URL")]
    pub s3_url_prefix: Option<String>,

    /// Day the run is scheduled for; the run is refused on any other day.
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub exec_date: Option<String>,

    #[arg(long)]
    pub no_confirm_dialog: bool,

    /// Config file; defaults to `~/.config/runonce/default.toml`.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}
