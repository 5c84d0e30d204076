use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::provider::{ProviderId, ProviderRegistry, brasilapi, viacep};

pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Per-provider overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Replaces the provider's public endpoint, e.g. a mirror or a local stub.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Settings for the HTTP client used by [`crate::HttpFetcher`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_ms: u64,
    /// Upper bound for a single request, independent of the lookup budget.
    pub request_timeout_ms: u64,
    pub pool_max_idle_per_host: usize,
    pub user_agent: String,
    /// Responses larger than this are rejected instead of buffered.
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 500,
            request_timeout_ms: 5000,
            pool_max_idle_per_host: 4,
            user_agent: concat!("cep-core/", env!("CARGO_PKG_VERSION")).to_string(),
            max_body_bytes: 256 * 1024,
        }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Providers raced when none are given explicitly.
    pub default_providers: Vec<String>,

    /// Lookup budget in milliseconds.
    pub timeout_ms: u64,

    pub http: HttpConfig,

    /// Example TOML:
    /// [providers.viacep]
    /// base_url = "https://viacep.com.br/ws"
    pub providers: HashMap<String, ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_providers: vec![brasilapi::ID.to_string(), viacep::ID.to_string()],
            timeout_ms: DEFAULT_TIMEOUT_MS,
            http: HttpConfig::default(),
            providers: HashMap::new(),
        }
    }
}

impl Config {
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Replace the default provider list. Every name must be registered.
    pub fn set_default_providers(
        &mut self,
        names: &[String],
        registry: &ProviderRegistry,
    ) -> Result<()> {
        if names.is_empty() {
            return Err(anyhow!("At least one default provider is required."));
        }

        if let Some(unknown) = names.iter().find(|name| !registry.contains(name)) {
            let known: Vec<_> = registry.ids().iter().map(ProviderId::to_string).collect();
            return Err(anyhow!(
                "Unknown provider '{unknown}'. Supported providers: {}.",
                known.join(", ")
            ));
        }

        self.default_providers = names
            .iter()
            .filter_map(|name| registry.get(name))
            .map(|adapter| adapter.id().to_string())
            .collect();
        Ok(())
    }

    /// Base URL override for `name`. Table keys match regardless of case.
    pub fn provider_base_url(&self, name: &str) -> Option<&str> {
        self.providers
            .iter()
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(name.trim()))
            .and_then(|(_, cfg)| cfg.base_url.as_deref())
    }

    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        Self::from_toml(
            &fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?,
        )
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse config text, filling absent keys with defaults and rejecting a zero budget.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        if cfg.timeout_ms == 0 {
            return Err(anyhow!("timeout_ms must be greater than zero"));
        }
        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "cep-race", "cep-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_race_both_builtin_providers() {
        let cfg = Config::default();

        assert_eq!(cfg.default_providers, ["brasilapi", "viacep"]);
        assert_eq!(cfg.budget(), Duration::from_secs(1));
        assert!(cfg.provider_base_url("viacep").is_none());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let cfg = Config::from_toml(
            r#"
            timeout_ms = 250

            [http]
            user_agent = "test-agent"

            [providers.viacep]
            base_url = "http://localhost:9000/ws"
            "#,
        )
        .expect("config must parse");

        assert_eq!(cfg.budget(), Duration::from_millis(250));
        assert_eq!(cfg.default_providers, ["brasilapi", "viacep"]);
        assert_eq!(cfg.http.user_agent, "test-agent");
        assert_eq!(cfg.http.connect_timeout_ms, 500);
        assert_eq!(cfg.provider_base_url("viacep"), Some("http://localhost:9000/ws"));
    }

    #[test]
    fn provider_override_keys_ignore_case() {
        let cfg = Config::from_toml(
            r#"
            [providers.ViaCEP]
            base_url = "http://mirror"
            "#,
        )
        .expect("config must parse");

        assert_eq!(cfg.provider_base_url("viacep"), Some("http://mirror"));
        assert_eq!(cfg.provider_base_url("VIACEP"), Some("http://mirror"));
        assert!(cfg.provider_base_url("brasilapi").is_none());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = Config::from_toml("timeout_ms = 0").unwrap_err();
        assert!(err.to_string().contains("timeout_ms"));
    }

    #[test]
    fn toml_roundtrip_keeps_overrides() {
        let mut cfg = Config::default();
        cfg.providers.insert(
            "brasilapi".into(),
            ProviderConfig { base_url: Some("http://mirror".into()) },
        );

        let text = toml::to_string_pretty(&cfg).expect("serialize");
        let back = Config::from_toml(&text).expect("parse");

        assert_eq!(back.provider_base_url("brasilapi"), Some("http://mirror"));
        assert_eq!(back.timeout_ms, cfg.timeout_ms);
    }

    #[test]
    fn set_default_providers_validates_names() {
        let registry = ProviderRegistry::builtin();
        let mut cfg = Config::default();

        let err = cfg.set_default_providers(&["nope".to_string()], &registry).unwrap_err();
        assert!(err.to_string().contains("Unknown provider 'nope'"));

        let err = cfg.set_default_providers(&[], &registry).unwrap_err();
        assert!(err.to_string().contains("At least one"));

        cfg.set_default_providers(&["ViaCEP".to_string()], &registry).expect("known provider");
        assert_eq!(cfg.default_providers, ["viacep"]);
    }
}
