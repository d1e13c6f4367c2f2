use crate::error::{RelayError, Result};
use crate::providers::ProviderKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub static_files: StaticConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_name")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticConfig {
    #[serde(default = "default_static_root")]
    pub root: PathBuf,
    #[serde(default = "default_assets_dir")]
    pub assets: PathBuf,
    #[serde(default = "default_index")]
    pub index: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

fn default_port() -> u16 {
    3000
}

fn default_provider_name() -> String {
    ProviderKind::OpenAi.as_str().to_string()
}

fn default_static_root() -> PathBuf {
    PathBuf::from("public")
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("public").join("assets")
}

fn default_index() -> String {
    "index.html".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("llm-relay.log")
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            provider: ProviderConfig::default(),
            static_files: StaticConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: None,
            model: None,
            api_key_env: None,
            upstream_timeout_secs: None,
        }
    }
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            root: default_static_root(),
            assets: default_assets_dir(),
            index: default_index(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
        }
    }
}

impl RelayConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file, falling back to defaults.
    /// Priority: CLI arg > CWD > XDG config > home dir
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Apply `LLM_PROVIDER` and `PORT` from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(provider) = lookup("LLM_PROVIDER").filter(|p| !p.trim().is_empty()) {
            self.provider.name = provider;
        }
        if let Some(port) = lookup("PORT").filter(|p| !p.trim().is_empty()) {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| RelayError::config(format!("PORT '{}' is not a valid port", port)))?;
        }
        Ok(())
    }

    /// The provider this relay forwards to. Anything other than `anthropic`
    /// is treated as OpenAI.
    pub fn provider_kind(&self) -> ProviderKind {
        ProviderKind::from_name(&self.provider.name).unwrap_or(ProviderKind::OpenAi)
    }

    /// Resolve the effective base URL (config override or provider preset default)
    pub fn effective_base_url(&self) -> String {
        self.provider
            .base_url
            .clone()
            .unwrap_or_else(|| self.provider_kind().preset().base_url.to_string())
    }

    pub fn effective_model(&self) -> String {
        self.provider
            .model
            .clone()
            .unwrap_or_else(|| self.provider_kind().preset().default_model.to_string())
    }

    pub fn api_key_env(&self) -> String {
        self.provider
            .api_key_env
            .clone()
            .unwrap_or_else(|| self.provider_kind().preset().default_api_key_env.to_string())
    }

    /// Resolve the API key from the configured environment variable
    pub fn resolve_api_key(&self) -> Result<String> {
        let var = self.api_key_env();
        std::env::var(&var).map_err(|_| {
            RelayError::config(format!(
                "Environment variable '{}' not set. Set it with your provider API key.",
                var
            ))
        })
    }

    /// Path of the index document served at `/`.
    pub fn index_path(&self) -> PathBuf {
        self.static_files.root.join(&self.static_files.index)
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("llm-relay.toml"));

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("llm-relay").join("config.toml"));
    }
    if let Some(home) = home_dir() {
        paths.push(home.join(".config").join("llm-relay").join("config.toml"));
        paths.push(home.join(".llm-relay.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
