//! Core library for the `cep` CLI.
//!
//! This crate defines:
//! - Provider adapters that turn a postal code into a request and a provider
//!   payload into a [`CanonicalAddress`]
//! - A cancellable single-shot HTTP fetch client
//! - The [`Resolver`], which races every selected provider and keeps the
//!   first successful answer
//! - Configuration handling
//!
//! It is used by `cep-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod fetch;
pub mod model;
pub mod provider;
pub mod race;

pub use config::{Config, HttpConfig, ProviderConfig};
pub use error::{DecodeError, FetchError, LookupError, ProviderError, ProviderFailure};
pub use fetch::{Fetcher, HttpFetcher};
pub use model::{CanonicalAddress, PostalCode, ProviderRequest};
pub use provider::{ProviderAdapter, ProviderId, ProviderRegistry};
pub use race::Resolver;
