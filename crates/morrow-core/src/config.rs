use std::fs;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use serde::Deserialize;
use tracing::{debug, info, warn};

const DATA_ENV_VAR: &str = "MORROW_DATA";
const CONFIG_ENV_VAR: &str = "MORROW_CONFIG";
const CONFIG_FILE: &str = "morrow.toml";
const DATA_FILE: &str = "tasks.json";

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    data: Option<DataSection>,
}

#[derive(Debug, Default, Deserialize)]
struct DataSection {
    path: Option<String>,
}

// Resolution order: explicit override, MORROW_DATA, morrow.toml, then the
// default file under the home directory.
pub fn resolve_data_path(override_path: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(path) = override_path {
        return Ok(path.to_path_buf());
    }

    if let Ok(raw) = std::env::var(DATA_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            debug!(source = DATA_ENV_VAR, path = %trimmed, "data path from environment");
            return Ok(expand_tilde(Path::new(trimmed)));
        }
    }

    if let Some(path) = config_file_path()
        && let Some(configured) = load_configured_path(&path)
    {
        return Ok(configured);
    }

    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(home.join(".morrow").join(DATA_FILE))
}

fn config_file_path() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var(CONFIG_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    dirs::home_dir().map(|home| home.join(".morrow").join(CONFIG_FILE))
}

fn load_configured_path(path: &Path) -> Option<PathBuf> {
    if !path.exists() {
        debug!(file = %path.display(), "config file not found");
        return None;
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(file = %path.display(), error = %err, "failed reading config file");
            return None;
        }
    };

    let parsed = match toml::from_str::<ConfigFile>(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(file = %path.display(), error = %err, "failed parsing config file");
            return None;
        }
    };

    let configured = parsed.data.and_then(|section| section.path)?;
    let trimmed = configured.trim();
    if trimmed.is_empty() {
        warn!(file = %path.display(), "config data.path was empty");
        return None;
    }

    info!(file = %path.display(), path = %trimmed, "data path from config file");
    Some(expand_tilde(Path::new(trimmed)))
}

fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if let Some(rest) = text.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}
