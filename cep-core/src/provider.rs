use crate::{
    CanonicalAddress, Config, PostalCode, ProviderRequest,
    error::DecodeError,
    provider::{brasilapi::BrasilApiAdapter, viacep::ViaCepAdapter},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt::Debug, sync::Arc};

pub mod brasilapi;
pub mod viacep;

/// Provider name, kept exactly as the adapter was registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ProviderId(Arc<str>);

impl ProviderId {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ProviderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProviderId {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<ProviderId> for String {
    fn from(value: ProviderId) -> Self {
        value.as_str().to_string()
    }
}

/// Per-provider knowledge: where to ask and how to read the answer.
///
/// Implementations hold no mutable state; `decode` is a pure function of its
/// input bytes.
pub trait ProviderAdapter: Send + Sync + Debug {
    fn id(&self) -> &ProviderId;

    /// Base URL the request is templated onto, for display.
    fn base_url(&self) -> &str;

    fn build_request(&self, code: &PostalCode) -> ProviderRequest;

    fn decode(&self, raw: &[u8]) -> Result<CanonicalAddress, DecodeError>;
}

/// Provider id to adapter mapping. Lookups ignore case and surrounding
/// whitespace.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

fn registry_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in adapter at its public endpoint.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(BrasilApiAdapter::new());
        registry.register(ViaCepAdapter::new());
        registry
    }

    /// Built-in adapters with base URL overrides taken from `config`.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();

        let brasilapi = match config.provider_base_url(brasilapi::ID) {
            Some(url) => BrasilApiAdapter::with_base_url(brasilapi::ID, url),
            None => BrasilApiAdapter::new(),
        };
        let viacep = match config.provider_base_url(viacep::ID) {
            Some(url) => ViaCepAdapter::with_base_url(viacep::ID, url),
            None => ViaCepAdapter::new(),
        };

        registry.register(brasilapi);
        registry.register(viacep);
        registry
    }

    /// Insert `adapter` under its id, returning the adapter it replaced.
    pub fn register(
        &mut self,
        adapter: impl ProviderAdapter + 'static,
    ) -> Option<Arc<dyn ProviderAdapter>> {
        let adapter: Arc<dyn ProviderAdapter> = Arc::new(adapter);
        self.adapters.insert(registry_key(adapter.id().as_str()), adapter)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&registry_key(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.adapters.contains_key(&registry_key(name))
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> Vec<ProviderId> {
        let mut ids: Vec<_> = self.adapters.values().map(|a| a.id().clone()).collect();
        ids.sort();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
