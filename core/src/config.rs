//! Per-reconciler configuration: compiled-in defaults plus an optional YAML
//! override from the host's config directory.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ProvisionError;
use crate::infrastructure::Environment;
use crate::types::config::{ConfigOverride, ReconcilerConfig};


pub const CONFIG_DIR_ENV: &str = "FIRSTBOOT_CONFIG_DIR";
pub const SYSTEM_CONFIG_DIR: &str = "/etc/firstboot";


pub fn resolve_config_dir(env: &dyn Environment) -> PathBuf {
    match env.var(CONFIG_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => PathBuf::from(SYSTEM_CONFIG_DIR),
    }
}


pub fn override_path(config_dir: &Path, name: &str) -> PathBuf {
    config_dir.join(format!("{}.yaml", name))
}


/// Read `<config_dir>/<name>.yaml` if it exists.
pub fn load_override(config_dir: &Path, name: &str) -> Result<Option<ConfigOverride>, ProvisionError> {
    let path = override_path(config_dir, name);
    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ProvisionError::io(path, e)),
    };
    if content.trim().is_empty() {
        return Ok(Some(ConfigOverride::default()));
    }
    serde_yaml::from_str(&content)
        .map(Some)
        .map_err(|e| ProvisionError::Config {
            path,
            message: e.to_string(),
        })
}


/// Defaults with any host override applied and checked.
pub fn load(defaults: ReconcilerConfig, config_dir: &Path) -> Result<ReconcilerConfig, ProvisionError> {
    let mut config = defaults;
    if let Some(o) = load_override(config_dir, &config.name)? {
        debug!(reconciler = %config.name, ?o, "applying config override");
        config.apply(&o);
        config.validate().map_err(|message| ProvisionError::Config {
            path: override_path(config_dir, &config.name),
            message,
        })?;
    }
    Ok(config)
}
