//! Merges command-line flags over the config file and runs the guard.

use std::path::Path;

use chrono::NaiveDate;
use reqwest::Url;
use runonce_core::api::{self as core_api, AppConfig, CliError, ExecutionGuard, GuardOptions};
use runonce_plugins::factory;

use crate::commands::cli::Args;
use crate::script::command_script;

/// What the flags decide beyond the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub name: Option<String>,
    pub exec_date: Option<NaiveDate>,
    pub command: Vec<String>,
}

pub fn load_config(args: &Args) -> Result<AppConfig, CliError> {
    let loaded = match &args.config {
        Some(path) => core_api::load_from_path(path),
        None => core_api::load_default(),
    };
    loaded.map_err(|e| CliError::Config(format!("{e:#}")))
}

pub fn apply_flags(cfg: &mut AppConfig, args: &Args) -> Result<RunPlan, CliError> {
    if args.no_confirm_dialog {
        cfg.confirm_dialog = false;
    }

    if let Some(prefix) = args.s3_url_prefix.as_deref().filter(|p| !p.is_empty()) {
        let url = Url::parse(prefix)
            .map_err(|e| CliError::Config(format!("s3-url-prefix can not parse: {e}")))?;
        if url.scheme() != "s3" {
            return Err(CliError::Config(
                "s3-url-prefix is not s3 url format".to_string(),
            ));
        }
        let bucket = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| CliError::Config("s3-url-prefix has no bucket".to_string()))?;
        cfg.s3.bucket = Some(bucket.to_string());
        cfg.s3.object_prefix = url.path().to_string();
    }

    if let Some(dir) = &args.dir {
        cfg.file.dir = Some(absolute(dir)?.to_string_lossy().into_owned());
    }

    let exec_date = args
        .exec_date
        .as_deref()
        .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d"))
        .transpose()
        .map_err(|e| CliError::Config(format!("exec date parse failed: {e}")))?;

    Ok(RunPlan {
        name: args.name.clone().filter(|n| !n.is_empty()),
        exec_date,
        command: args.command.clone(),
    })
}

fn absolute(dir: &Path) -> Result<std::path::PathBuf, CliError> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| CliError::Config(format!("can not convert to abs path: {e}")))?;
    Ok(cwd.join(dir))
}

#[tracing::instrument(name = "cli.run_app", skip_all)]
pub async fn run_app(args: Args, mut cfg: AppConfig) -> Result<i32, CliError> {
    let plan = apply_flags(&mut cfg, &args)?;
    if plan.command.is_empty() {
        return Err(CliError::Config("commands not found".to_string()));
    }

    let destination = factory::build_destination(&cfg)
        .await
        .map_err(|e| CliError::Config(format!("log destination: {e:#}")))?;

    let mut guard = ExecutionGuard::new(GuardOptions {
        name: plan.name,
        default_name_template: cfg.default_name_template.clone(),
        args: Some(plan.command.clone()),
        exec_date: plan.exec_date,
        confirm_dialog: Some(cfg.confirm_dialog),
        destination: Some(destination),
        script: Some(command_script(plan.command)),
        ..Default::default()
    });
    guard.run().await?;
    tracing::debug!(state = ?guard.state(), "guard finished");
    Ok(0)
}
