//! Error taxonomy.
//!
//! Provider-level errors ([`FetchError`], [`DecodeError`], [`ProviderError`])
//! stay inside the task that raised them. Only [`LookupError`] is returned
//! from [`crate::Resolver::resolve`].

use std::{fmt, time::Duration};

use thiserror::Error;

use crate::provider::ProviderId;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request cancelled")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to read response body: {0}")]
    Read(String),

    #[error("provider answered with status {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("provider has no address for this postal code")]
    NotFound,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("lookup task panicked")]
    Panicked,
}

/// A provider-level failure tagged with the provider that produced it.
#[derive(Debug, Error)]
#[error("{provider}: {error}")]
pub struct ProviderFailure {
    pub provider: ProviderId,
    #[source]
    pub error: ProviderError,
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error(
        "Unknown provider '{name}'. Supported providers: {}.",
        .known.join(", ")
    )]
    UnknownProvider { name: String, known: Vec<String> },

    #[error("No providers given for the lookup")]
    NoProviders,

    #[error("Time budget must be greater than zero")]
    InvalidBudget,

    #[error("No provider answered within {}ms", .budget.as_millis())]
    Timeout { budget: Duration },

    #[error("All providers failed: {}", FailureList(.failures))]
    AllProvidersFailed { failures: Vec<ProviderFailure> },
}

struct FailureList<'a>(&'a [ProviderFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}
