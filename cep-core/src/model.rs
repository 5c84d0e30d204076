use serde::{Deserialize, Serialize};
use std::fmt;

use crate::provider::ProviderId;

/// Postal code as typed by the caller. Passed to every provider unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostalCode(String);

impl PostalCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostalCode {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PostalCode {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A single GET a provider wants issued for a postal code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    provider: ProviderId,
    url: String,
}

impl ProviderRequest {
    pub fn new(provider: ProviderId, url: impl Into<String>) -> Self {
        Self { provider, url: url.into() }
    }

    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Normalized address, whichever provider answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalAddress {
    pub cep: String,
    pub state: String,
    pub city: String,
    pub neighborhood: String,
    pub street: String,
    pub provider: ProviderId,
}
