//! First-responder lookup across several providers.
//!
//! One task per provider runs build request, fetch, decode, publish. Results
//! go through a channel of capacity one written with `try_send`, so at most
//! one address is ever accepted; every later publish sees the slot full or
//! closed and is dropped. A shared [`CancellationToken`] is cancelled on the
//! first success, on budget expiry, or once every provider has failed, and
//! the remaining tasks are aborted and joined before `resolve` returns.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::{
    config::Config,
    error::{FetchError, LookupError, ProviderError, ProviderFailure},
    fetch::{Fetcher, HttpFetcher},
    model::{CanonicalAddress, PostalCode},
    provider::{ProviderAdapter, ProviderId, ProviderRegistry},
};

/// Races lookups for a postal code across registered providers.
#[derive(Debug, Clone)]
pub struct Resolver {
    registry: Arc<ProviderRegistry>,
    fetcher: Arc<dyn Fetcher>,
}

impl Resolver {
    pub fn new(registry: ProviderRegistry, fetcher: impl Fetcher + 'static) -> Self {
        Self { registry: Arc::new(registry), fetcher: Arc::new(fetcher) }
    }

    /// Registry with config overrides and an [`HttpFetcher`] built from `config.http`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let fetcher = HttpFetcher::new(&config.http)?;
        Ok(Self::new(ProviderRegistry::from_config(config), fetcher))
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Resolve `code` with whichever of `providers` answers first.
    ///
    /// Fails with [`LookupError::Timeout`] when `budget` elapses with no
    /// success, and with [`LookupError::AllProvidersFailed`] as soon as the
    /// last provider fails, without waiting for the budget.
    pub async fn resolve<S: AsRef<str>>(
        &self,
        code: &PostalCode,
        providers: &[S],
        budget: Duration,
    ) -> Result<CanonicalAddress, LookupError> {
        let adapters = self.select_adapters(providers)?;
        if budget.is_zero() {
            return Err(LookupError::InvalidBudget);
        }

        let budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
        self.race(code, adapters, budget).instrument(info_span!("resolve", %code, budget_ms)).await
    }

    fn select_adapters<S: AsRef<str>>(
        &self,
        providers: &[S],
    ) -> Result<Vec<Arc<dyn ProviderAdapter>>, LookupError> {
        if providers.is_empty() {
            return Err(LookupError::NoProviders);
        }

        let mut adapters: Vec<Arc<dyn ProviderAdapter>> = Vec::with_capacity(providers.len());
        for name in providers {
            let name = name.as_ref();
            let adapter = self.registry.get(name).ok_or_else(|| LookupError::UnknownProvider {
                name: name.to_string(),
                known: self.registry.ids().iter().map(ProviderId::to_string).collect(),
            })?;

            if adapters.iter().all(|a| a.id() != adapter.id()) {
                adapters.push(adapter);
            }
        }

        Ok(adapters)
    }

    async fn race(
        &self,
        code: &PostalCode,
        adapters: Vec<Arc<dyn ProviderAdapter>>,
        budget: Duration,
    ) -> Result<CanonicalAddress, LookupError> {
        let cancel = CancellationToken::new();
        let (slot, mut winner) = mpsc::channel::<CanonicalAddress>(1);
        let mut tasks = JoinSet::new();
        let mut owners = HashMap::with_capacity(adapters.len());

        for adapter in adapters {
            let provider = adapter.id().clone();
            let task = lookup_one(
                adapter,
                Arc::clone(&self.fetcher),
                code.clone(),
                cancel.clone(),
                slot.clone(),
            );
            let handle = tasks.spawn(task.instrument(info_span!("provider", %provider)));
            owners.insert(handle.id(), provider);
        }
        // Only the tasks hold senders now, so `recv` yields `None` once all are gone.
        drop(slot);

        let deadline = tokio::time::sleep(budget);
        tokio::pin!(deadline);

        let mut failures = Vec::new();
        let outcome = loop {
            tokio::select! {
                biased;

                Some(address) = winner.recv() => {
                    info!(provider = %address.provider, "lookup won");
                    break Ok(address);
                }

                joined = tasks.join_next_with_id() => match joined {
                    Some(Ok((_, Ok(())))) => {}
                    Some(Ok((id, Err(error)))) => failures.push(ProviderFailure {
                        provider: owner(&owners, id),
                        error,
                    }),
                    Some(Err(join_error)) => {
                        warn!(error = %join_error, "provider task did not finish");
                        failures.push(ProviderFailure {
                            provider: owner(&owners, join_error.id()),
                            error: ProviderError::Panicked,
                        });
                    }
                    // Every task has finished. A last-moment publish is still
                    // buffered in the slot, so prefer it over reporting failure.
                    None => match winner.try_recv() {
                        Ok(address) => {
                            info!(provider = %address.provider, "lookup won");
                            break Ok(address);
                        }
                        Err(_) => {
                            warn!(failed = failures.len(), "all providers failed");
                            break Err(LookupError::AllProvidersFailed { failures });
                        }
                    },
                },

                _ = &mut deadline => {
                    info!("lookup timed out");
                    break Err(LookupError::Timeout { budget });
                }
            }
        };

        cancel.cancel();
        winner.close();
        tasks.shutdown().await;

        outcome
    }
}

fn owner(owners: &HashMap<tokio::task::Id, ProviderId>, id: tokio::task::Id) -> ProviderId {
    owners.get(&id).cloned().unwrap_or_else(|| ProviderId::new("unknown"))
}

/// Single-provider pipeline. A success that loses the race is dropped
/// silently; only genuine failures are returned.
async fn lookup_one(
    adapter: Arc<dyn ProviderAdapter>,
    fetcher: Arc<dyn Fetcher>,
    code: PostalCode,
    cancel: CancellationToken,
    slot: mpsc::Sender<CanonicalAddress>,
) -> Result<(), ProviderError> {
    let request = adapter.build_request(&code);
    debug!(url = request.url(), "starting lookup");

    let result = fetcher
        .fetch(&request, &cancel)
        .await
        .map_err(ProviderError::from)
        .and_then(|raw| adapter.decode(&raw).map_err(ProviderError::from));

    let address = match result {
        Ok(address) => address,
        Err(error @ ProviderError::Fetch(FetchError::Cancelled)) => {
            debug!("lookup cancelled");
            return Err(error);
        }
        Err(error) => {
            warn!(%error, "provider lookup failed");
            return Err(error);
        }
    };

    if cancel.is_cancelled() {
        debug!("session already settled, discarding result");
        return Ok(());
    }

    match slot.try_send(address) {
        Ok(()) => debug!("result published"),
        Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
            debug!("slot already claimed, discarding result");
        }
    }

    Ok(())
}
