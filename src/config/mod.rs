use serde::{Deserialize, Serialize};

use crate::tree::{MergeStrategy, TreeOptions};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub cache: CacheConfig,
    pub merge: MergeConfig,
    pub update: UpdateConfig,
    pub logging: LoggingConfig,
    pub snapshot: SnapshotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    pub default_strategy: MergeStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    pub verify_base_content: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Directory names skipped when capturing a host directory.
    pub ignore: Vec<String>,
}

impl Config {
    /// Defaults, overlaid by an optional `stagefs.toml` and then by
    /// `STAGEFS__SECTION__KEY` environment variables.
    pub fn load() -> anyhow::Result<Self> {
        let defaults = config::Config::try_from(&Config::default())?;
        let config = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name("stagefs").required(false))
            .add_source(config::Environment::with_prefix("STAGEFS").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn tree_options(&self) -> TreeOptions {
        TreeOptions {
            cache_capacity: self.cache.max_entries,
            default_strategy: self.merge.default_strategy,
            verify_base_content: self.update.verify_base_content,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig { max_entries: 10000 },
            merge: MergeConfig { default_strategy: MergeStrategy::DEFAULT },
            update: UpdateConfig { verify_base_content: false },
            logging: LoggingConfig { filter: "stagefs=info".to_string() },
            snapshot: SnapshotConfig {
                ignore: vec![".git".to_string(), "node_modules".to_string(), "target".to_string()],
            },
        }
    }
}
