use serde::Deserialize;

use crate::{
    error::DecodeError,
    model::{CanonicalAddress, PostalCode, ProviderRequest},
};

use super::{ProviderAdapter, ProviderId};

pub const ID: &str = "brasilapi";
pub const DEFAULT_BASE_URL: &str = "https://brasilapi.com.br/api/cep/v1";

/// BrasilAPI CEP v1. Its payload is already close to the canonical shape.
#[derive(Debug, Clone)]
pub struct BrasilApiAdapter {
    id: ProviderId,
    base_url: String,
}

impl BrasilApiAdapter {
    pub fn new() -> Self {
        Self::with_base_url(ID, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(id: &str, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self { id: ProviderId::new(id), base_url: base_url.trim_end_matches('/').to_string() }
    }
}

impl Default for BrasilApiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct BrasilApiCep {
    cep: Option<String>,
    state: Option<String>,
    city: Option<String>,
    neighborhood: Option<String>,
    street: Option<String>,
}

impl ProviderAdapter for BrasilApiAdapter {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request(&self, code: &PostalCode) -> ProviderRequest {
        ProviderRequest::new(self.id.clone(), format!("{}/{}", self.base_url, code))
    }

    fn decode(&self, raw: &[u8]) -> Result<CanonicalAddress, DecodeError> {
        let parsed: BrasilApiCep = serde_json::from_slice(raw)?;

        Ok(CanonicalAddress {
            cep: parsed.cep.unwrap_or_default(),
            state: parsed.state.unwrap_or_default(),
            city: parsed.city.unwrap_or_default(),
            neighborhood: parsed.neighborhood.unwrap_or_default(),
            street: parsed.street.unwrap_or_default(),
            provider: self.id.clone(),
        })
    }
}
