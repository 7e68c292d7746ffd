use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// `~/.config/runonce/default.toml`
pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".config").join("runonce").join("default.toml"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    let path = default_config_path()?;
    let cfg = if path.exists() {
        read_file(&path)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        AppConfig::default()
    };
    finish(cfg)
}

pub fn load_from_path(path: &Path) -> anyhow::Result<AppConfig> {
    finish(read_file(path)?)
}

fn read_file(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config {}: {e}", path.display()))?;
    toml::from_str::<AppConfig>(&s)
        .map_err(|e| anyhow::anyhow!("failed to parse config {}: {e}", path.display()))
}

fn finish(mut cfg: AppConfig) -> anyhow::Result<AppConfig> {
    cfg.file.dir = expand(cfg.file.dir.take())?;
    cfg.logging.directory = expand(cfg.logging.directory.take())?;
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());
    Ok(cfg)
}

fn expand(dir: Option<String>) -> anyhow::Result<Option<String>> {
    match dir {
        Some(d) if !d.trim().is_empty() => Ok(Some(shellexpand::full(&d)?.into_owned())),
        _ => Ok(None),
    }
}

// Environment variable overrides win over the file.
fn apply_env_overrides(cfg: &mut AppConfig, var: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = non_empty("RUNONCE_OBJECT_STORE_ENDPOINT") {
        cfg.s3.endpoint = Some(v);
    }
    if let Some(v) = non_empty("RUNONCE_OBJECT_STORE_TOKEN") {
        cfg.s3.token = Some(v);
    }
    if cfg.s3.region.is_none() {
        cfg.s3.region = non_empty("AWS_DEFAULT_REGION");
    }
}
