use crate::{contexts::seed_contexts, ContextStore};
use std::{sync::Arc, time::Duration};
use veemee_sdk::{ContextRow, CredentialStore, VeemeeApi, WastebasketPolicy};

/// How long fetched personas stay fresh.
pub const DEFAULT_PERSONA_TTL: Duration = Duration::from_secs(90);
/// Number of persona requests a prefetch keeps in flight.
pub const DEFAULT_PREFETCH_CONCURRENCY: usize = 3;

/// Parameters required to create a new store.
/// # Default Values
/// - `persona_ttl`: 90 seconds
/// - `prefetch_concurrency`: 3
/// - `wastebasket_policy`: unlimited retention
/// - `seed`: two built-in contexts, "Test 1" and "Test 2"
pub struct StoreParams {
    /// The API contexts and personas are loaded from.
    pub api: Arc<dyn VeemeeApi>,
    /// Holds the bearer token and the persisted active context id.
    pub credentials: Arc<dyn CredentialStore>,
    pub persona_ttl: Duration,
    pub prefetch_concurrency: usize,
    pub wastebasket_policy: WastebasketPolicy,
    /// Contexts used when the list cannot be loaded from the API.
    pub seed: Vec<ContextRow>,
}

impl StoreParams {
    pub fn new(api: Arc<dyn VeemeeApi>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            api,
            credentials,
            persona_ttl: DEFAULT_PERSONA_TTL,
            prefetch_concurrency: DEFAULT_PREFETCH_CONCURRENCY,
            wastebasket_policy: WastebasketPolicy::default(),
            seed: seed_contexts(),
        }
    }

    /// Set how long fetched personas stay fresh
    #[must_use]
    pub fn persona_ttl(mut self, persona_ttl: Duration) -> Self {
        self.persona_ttl = persona_ttl;
        self
    }

    /// Set the number of concurrent requests used by prefetching. Values
    /// below one are treated as one.
    #[must_use]
    pub fn prefetch_concurrency(mut self, prefetch_concurrency: usize) -> Self {
        self.prefetch_concurrency = prefetch_concurrency.max(1);
        self
    }

    #[must_use]
    pub fn wastebasket_policy(mut self, wastebasket_policy: WastebasketPolicy) -> Self {
        self.wastebasket_policy = wastebasket_policy;
        self
    }

    /// Set the fallback context list
    #[must_use]
    pub fn seed(mut self, seed: Vec<ContextRow>) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn build(self) -> ContextStore {
        ContextStore::new(self)
    }
}
