use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SonedbConfig {
    /// JSON seed file loaded into the database on start
    pub seed: Option<String>,
    /// JSON checkpoint of known post and reply ids
    pub known: Option<String>,
    /// Default number of feed entries to show
    pub feed_limit: Option<usize>,
}

pub const DEFAULT_FEED_LIMIT: usize = 25;

impl SonedbConfig {
    pub fn feed_limit(&self) -> usize {
        self.feed_limit.unwrap_or(DEFAULT_FEED_LIMIT)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("sonedb.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<SonedbConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: SonedbConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &SonedbConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}
