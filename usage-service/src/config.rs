use rate_engine::{Catalog, QueryDefaults};
use serde::Deserialize;
use std::{fs, path::PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Derivation fan-out width.
    pub workers: usize,
    pub channel_capacity: usize,
    /// Fixed seed for synthetic readings; `None` gives natural variation.
    pub noise_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            channel_capacity: 1024,
            noise_seed: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub defaults: QueryDefaults,
    #[serde(default)]
    pub catalog: CatalogConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("USAGE_CONFIG").unwrap_or_else(|_| "usage-config.toml".to_string());
        match fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path, "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!("failed to read config '{path}': {e}")),
        }
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        if cfg.engine.workers == 0 {
            anyhow::bail!("engine.workers must be at least 1");
        }
        Ok(cfg)
    }

    /// The configured catalog file, or the built-in demo catalog.
    pub fn load_catalog(&self) -> anyhow::Result<Catalog> {
        let Some(path) = &self.catalog.path else {
            return Ok(Catalog::demo());
        };
        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read catalog '{}': {e}", path.display()))?;
        let catalog: Catalog = toml::from_str(&contents)?;

        for rs in catalog.tariffs.iter().chain(&catalog.carbon_profiles) {
            let issues = rs.validate();
            if !issues.is_empty() {
                tracing::warn!(rule_set = %rs.id, ?issues, "rule set has gaps or invalid windows");
            }
        }
        Ok(catalog)
    }
}
