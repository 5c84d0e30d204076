use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::DecodeError,
    model::{CanonicalAddress, PostalCode, ProviderRequest},
};

use super::{ProviderAdapter, ProviderId};

pub const ID: &str = "viacep";
pub const DEFAULT_BASE_URL: &str = "https://viacep.com.br/ws";

#[derive(Debug, Clone)]
pub struct ViaCepAdapter {
    id: ProviderId,
    base_url: String,
}

impl ViaCepAdapter {
    pub fn new() -> Self {
        Self::with_base_url(ID, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(id: &str, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self { id: ProviderId::new(id), base_url: base_url.trim_end_matches('/').to_string() }
    }
}

impl Default for ViaCepAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct ViaCep {
    cep: Option<String>,
    logradouro: Option<String>,
    bairro: Option<String>,
    localidade: Option<String>,
    uf: Option<String>,
    /// Present on 200 responses for codes ViaCEP does not know.
    /// Older deployments send `true`, newer ones `"true"`.
    erro: Option<Value>,
}

impl ViaCep {
    fn is_not_found(&self) -> bool {
        match &self.erro {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(flag)) => flag.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

impl ProviderAdapter for ViaCepAdapter {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request(&self, code: &PostalCode) -> ProviderRequest {
        ProviderRequest::new(self.id.clone(), format!("{}/{}/json/", self.base_url, code))
    }

    fn decode(&self, raw: &[u8]) -> Result<CanonicalAddress, DecodeError> {
        let parsed: ViaCep = serde_json::from_slice(raw)?;

        if parsed.is_not_found() {
            return Err(DecodeError::NotFound);
        }

        Ok(CanonicalAddress {
            cep: parsed.cep.unwrap_or_default(),
            state: parsed.uf.unwrap_or_default(),
            city: parsed.localidade.unwrap_or_default(),
            neighborhood: parsed.bairro.unwrap_or_default(),
            street: parsed.logradouro.unwrap_or_default(),
            provider: self.id.clone(),
        })
    }
}
