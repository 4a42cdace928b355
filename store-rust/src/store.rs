use crate::{
    auth,
    contexts::{ContextList, ContextPatch, NewContext},
    persona_cache::{FetchSkip, PersonaCache},
    prefetch,
    session::SessionState,
    ContextStoreSnapshot, FetchOptions, HydrationState, SnapshotStream, StoreParams, StoreResult,
};
use chrono::Utc;
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};
use tokio::sync::watch;
use tracing::{debug, error, info_span, warn};
use tracing_futures::Instrument;
use veemee_sdk::{
    normalize_contexts, ApiResult, ContextRow, CredentialStore, Persona, VeemeeApi,
    WastebasketPolicy, ACTIVE_CONTEXT_KEY, JWT_KEY,
};

struct StoreState {
    hydration: HydrationState,
    contexts_loaded: bool,
    contexts: ContextList,
    active_context_id: Option<i64>,
    wastebasket_policy: WastebasketPolicy,
    personas: PersonaCache,
}

impl StoreState {
    fn new(wastebasket_policy: WastebasketPolicy) -> Self {
        Self {
            hydration: HydrationState::Uninitialized,
            contexts_loaded: false,
            contexts: ContextList::loading(),
            active_context_id: None,
            wastebasket_policy,
            personas: PersonaCache::default(),
        }
    }

    /// Keep the active selection pointing at a visible context. Only applies
    /// once the persisted id has been read and the context list has loaded.
    fn reconcile_active(&mut self) {
        if self.hydration != HydrationState::Hydrated || !self.contexts_loaded {
            return;
        }
        if let Some(id) = self.active_context_id {
            if !self.contexts.is_selectable(id) {
                let fallback = self.contexts.fallback_id();
                debug!(id, ?fallback, "active context is not visible, falling back");
                self.active_context_id = fallback;
            }
        }
    }

    fn fall_back_if_active(&mut self, id: i64) {
        if self.active_context_id == Some(id) {
            self.active_context_id = self.contexts.fallback_id();
        }
    }

    fn snapshot(&self) -> ContextStoreSnapshot {
        let mut snapshot = ContextStoreSnapshot {
            hydration: self.hydration,
            hydrated: self.hydration == HydrationState::Hydrated,
            contexts_loaded: self.contexts_loaded,
            contexts: self.contexts.rows().to_vec(),
            active_context_id: self.active_context_id,
            active_context: self
                .active_context_id
                .and_then(|id| self.contexts.get(id).cloned()),
            wastebasket_policy: self.wastebasket_policy,
            ..ContextStoreSnapshot::default()
        };

        for (id, entry) in self.personas.entries() {
            snapshot
                .personas_by_context_id
                .insert(id, entry.personas.clone());
            if let Some(fetched_at) = entry.fetched_at {
                snapshot.personas_fetched_at.insert(id, fetched_at);
            }
            snapshot
                .personas_loading_by_context_id
                .insert(id, entry.is_loading());
        }

        snapshot
    }
}

struct Inner {
    api: Arc<dyn VeemeeApi>,
    credentials: Arc<dyn CredentialStore>,
    persona_ttl: Duration,
    prefetch_concurrency: usize,
    seed: Vec<ContextRow>,
    state: Mutex<StoreState>,
    snapshots: watch::Sender<ContextStoreSnapshot>,
    session: SessionState,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &StoreState) {
        self.snapshots.send_replace(state.snapshot());
    }

    /// Mutate the state, restore the active selection invariant and publish a
    /// new snapshot.
    fn update<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let mut state = self.lock();
        let result = f(&mut state);
        state.reconcile_active();
        self.publish(&state);
        result
    }
}

/// Releases the loading flag of a persona request however the request ends,
/// including when its future is dropped.
struct LoadingGuard<'a> {
    inner: &'a Inner,
    context_id: i64,
    seq: u64,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.inner.lock();
        if state.personas.release(self.context_id, self.seq) {
            self.inner.publish(&state);
        }
    }
}

/// Single source of truth for the list of contexts, the active context and
/// the per-context persona cache.
///
/// Operations never fail: invalid requests are ignored and network or
/// storage errors are logged, leaving the last known good state in place.
/// Cloning the store is cheap and yields a handle to the same state.
#[derive(Clone)]
pub struct ContextStore {
    inner: Arc<Inner>,
}

impl ContextStore {
    #[must_use]
    pub fn new(params: StoreParams) -> Self {
        let state = StoreState::new(params.wastebasket_policy);
        let (snapshots, _) = watch::channel(state.snapshot());

        Self {
            inner: Arc::new(Inner {
                api: params.api,
                credentials: params.credentials,
                persona_ttl: params.persona_ttl,
                prefetch_concurrency: params.prefetch_concurrency.max(1),
                seed: params.seed,
                state: Mutex::new(state),
                snapshots,
                session: SessionState::new(),
            }),
        }
    }

    pub fn builder(api: Arc<dyn VeemeeApi>, credentials: Arc<dyn CredentialStore>) -> StoreParams {
        StoreParams::new(api, credentials)
    }

    /// Session-scoped flags. They start fresh with every store.
    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.inner.session
    }

    #[must_use]
    pub fn snapshot(&self) -> ContextStoreSnapshot {
        self.inner.snapshots.borrow().clone()
    }

    /// Receiver notified after every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ContextStoreSnapshot> {
        self.inner.snapshots.subscribe()
    }

    /// The current snapshot followed by one per change. Intermediate
    /// snapshots may be skipped if the consumer falls behind. Ends once every
    /// handle to the store is dropped.
    #[must_use]
    pub fn snapshots(&self) -> SnapshotStream {
        let mut receiver = self.subscribe();
        SnapshotStream::from_stream(async_stream::stream! {
            let current = receiver.borrow_and_update().clone();
            yield current;
            while receiver.changed().await.is_ok() {
                let next = receiver.borrow_and_update().clone();
                yield next;
            }
        })
    }

    #[must_use]
    pub fn hydrated(&self) -> bool {
        self.inner.lock().hydration == HydrationState::Hydrated
    }

    #[must_use]
    pub fn active_context_id(&self) -> Option<i64> {
        self.inner.lock().active_context_id
    }

    #[must_use]
    pub fn active_context(&self) -> Option<ContextRow> {
        let state = self.inner.lock();
        state
            .active_context_id
            .and_then(|id| state.contexts.get(id).cloned())
    }

    #[must_use]
    pub fn contexts(&self) -> Vec<ContextRow> {
        self.inner.lock().contexts.rows().to_vec()
    }

    #[must_use]
    pub fn context(&self, id: i64) -> Option<ContextRow> {
        self.inner.lock().contexts.get(id).cloned()
    }

    #[must_use]
    pub fn visible_contexts(&self) -> Vec<ContextRow> {
        self.inner.lock().contexts.visible().cloned().collect()
    }

    #[must_use]
    pub fn archived_contexts(&self) -> Vec<ContextRow> {
        self.filtered_contexts(|row| !row.is_placeholder() && row.is_archived && !row.is_deleted)
    }

    /// Contexts that were deleted and can still be restored or purged.
    #[must_use]
    pub fn wastebasket(&self) -> Vec<ContextRow> {
        self.filtered_contexts(|row| !row.is_placeholder() && row.is_deleted)
    }

    fn filtered_contexts(&self, filter: impl Fn(&ContextRow) -> bool) -> Vec<ContextRow> {
        self.inner
            .lock()
            .contexts
            .rows()
            .iter()
            .filter(|row| filter(*row))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn wastebasket_policy(&self) -> WastebasketPolicy {
        self.inner.lock().wastebasket_policy
    }

    /// Cached personas of a context, empty when nothing has been fetched.
    #[must_use]
    pub fn personas_for(&self, context_id: i64) -> Vec<Persona> {
        self.inner
            .lock()
            .personas
            .get(context_id)
            .map(|entry| entry.personas.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_loading_personas(&self, context_id: i64) -> bool {
        self.inner.lock().personas.is_loading(context_id)
    }

    /// Restore the persisted selection and load the context list, both at
    /// once. The store counts as hydrated as soon as the selection is read.
    /// From then on every change of the active context is persisted in the
    /// background. Must run inside a Tokio runtime; only the first call has an
    /// effect.
    pub async fn hydrate(&self) {
        let start = self.inner.update(|state| {
            if state.hydration == HydrationState::Uninitialized {
                state.hydration = HydrationState::Hydrating;
                true
            } else {
                false
            }
        });
        if !start {
            debug!("store already hydrated or hydrating");
            return;
        }

        async {
            tokio::join!(self.hydrate_active_context_id(), self.reload_contexts());
        }
        .instrument(info_span!("veemee_store.hydrate"))
        .await;
    }

    async fn hydrate_active_context_id(&self) {
        let persisted = match self.inner.credentials.get(ACTIVE_CONTEXT_KEY).await {
            Ok(Some(raw)) => {
                let parsed = raw.trim().parse::<i64>().ok();
                if parsed.is_none() {
                    warn!(raw, "ignoring unreadable persisted active context id");
                }
                parsed
            }
            Ok(None) => None,
            Err(error) => {
                warn!(%error, "failed to read persisted active context id");
                None
            }
        };

        let receiver = self.subscribe();
        self.inner.update(|state| {
            state.active_context_id = persisted;
            state.hydration = HydrationState::Hydrated;
        });
        self.spawn_persister(receiver, persisted);
    }

    fn spawn_persister(&self, mut receiver: watch::Receiver<ContextStoreSnapshot>, persisted: Option<i64>) {
        let credentials = self.inner.credentials.clone();
        let mut last_written = persisted;

        tokio::spawn(
            async move {
                while receiver.changed().await.is_ok() {
                    let active = receiver.borrow_and_update().active_context_id;
                    if active == last_written {
                        continue;
                    }
                    match write_active_context_id(credentials.as_ref(), active).await {
                        Ok(()) => last_written = active,
                        Err(error) => warn!(%error, "failed to persist active context id"),
                    }
                }
            }
            .instrument(info_span!("veemee_store.persist")),
        );
    }

    /// Write the current selection to the credential store right away.
    pub async fn flush(&self) {
        let active = self.active_context_id();
        if let Err(error) = write_active_context_id(self.inner.credentials.as_ref(), active).await
        {
            warn!(%error, "failed to persist active context id");
        }
    }

    /// Replace the context list with the one from the API. Until a list has
    /// been loaded, a missing token, a failed request or a malformed response
    /// falls back to the seed list; afterwards they keep the current rows.
    pub async fn reload_contexts(&self) {
        let loaded = match self.load_contexts().await {
            Ok(Some(rows)) => Some(rows),
            Ok(None) => {
                debug!("no stored token for contexts");
                None
            }
            Err(error) => {
                warn!(%error, "failed to load contexts");
                None
            }
        };

        self.inner.update(|state| match loaded {
            Some(rows) => {
                state.contexts = ContextList::new(rows);
                state.contexts_loaded = true;
            }
            None if !state.contexts_loaded => {
                debug!("using seed contexts");
                state.contexts = ContextList::new(self.inner.seed.clone());
                state.contexts_loaded = true;
            }
            None => debug!("keeping last loaded contexts"),
        });
    }

    async fn load_contexts(&self) -> ApiResult<Option<Vec<ContextRow>>> {
        let Some(token) = self.inner.credentials.get(JWT_KEY).await? else {
            return Ok(None);
        };
        let contexts = self.inner.api.list_contexts(&token).await?;
        Ok(Some(normalize_contexts(&contexts)))
    }

    /// Make `id` the active context. Ignored unless the context exists and is
    /// visible.
    pub fn switch_context(&self, id: i64) {
        self.inner.update(|state| {
            if state.contexts.is_selectable(id) {
                state.active_context_id = Some(id);
            } else {
                debug!(id, "ignoring switch to a context that is not visible");
            }
        });
    }

    /// Append a new context and make it active. Returns its id.
    pub fn create_context(&self, input: NewContext) -> i64 {
        self.inner.update(|state| {
            let id = state.contexts.create(input);
            state.active_context_id = Some(id);
            id
        })
    }

    pub fn update_context(&self, id: i64, patch: ContextPatch) {
        self.inner.update(|state| {
            state.contexts.update(id, patch);
        });
    }

    pub fn archive_context(&self, id: i64) {
        self.inner.update(|state| {
            if state.contexts.set_archived(id, true) {
                state.fall_back_if_active(id);
            }
        });
    }

    pub fn unarchive_context(&self, id: i64) {
        self.inner.update(|state| {
            state.contexts.set_archived(id, false);
        });
    }

    /// Move a context to the wastebasket.
    pub fn delete_context(&self, id: i64) {
        self.inner.update(|state| {
            if state.contexts.soft_delete(id, Utc::now()) {
                state.fall_back_if_active(id);
            }
        });
    }

    /// Bring a context back from the wastebasket, archived if it was archived
    /// when deleted.
    pub fn restore_context(&self, id: i64) {
        self.inner.update(|state| {
            state.contexts.restore(id);
        });
    }

    /// Remove a context for good, along with its cached personas.
    pub fn purge_context(&self, id: i64) {
        self.inner.update(|state| {
            if state.contexts.purge(id) {
                state.personas.invalidate(id);
                state.fall_back_if_active(id);
            }
        });
    }

    pub fn set_wastebasket_policy(&self, policy: WastebasketPolicy) {
        self.inner.update(|state| state.wastebasket_policy = policy);
    }

    /// Delete the stored token and start a new session. Cached personas are
    /// dropped and the intro is shown again; contexts and the active
    /// selection are kept.
    pub async fn sign_out(&self) -> StoreResult<()> {
        auth::sign_out(self.inner.credentials.as_ref()).await?;
        self.inner.update(|state| state.personas.clear());
        self.inner.session.reset();
        Ok(())
    }

    /// Forget the cached personas of a context. A response still in flight
    /// for it is discarded.
    pub fn invalidate_personas(&self, context_id: i64) {
        self.inner
            .update(|state| state.personas.invalidate(context_id));
    }

    /// Refresh the personas of one context.
    ///
    /// Nothing happens for non-positive ids, for entries younger than the TTL
    /// (unless `options.force`), or while a request for the same context is
    /// in flight. Failures are logged and keep the previous personas.
    pub async fn fetch_personas_for_context(&self, context_id: i64, options: FetchOptions) {
        if context_id <= 0 {
            return;
        }

        let begin = {
            let mut state = self.inner.lock();
            let begin = state.personas.begin_fetch(
                context_id,
                options.force,
                self.inner.persona_ttl,
                Instant::now(),
            );
            if begin.is_ok() {
                self.inner.publish(&state);
            }
            begin
        };
        let seq = match begin {
            Ok(seq) => seq,
            Err(FetchSkip::Fresh) => {
                debug!(context_id, "personas are fresh, skipping fetch");
                return;
            }
            Err(FetchSkip::InFlight) => {
                debug!(context_id, "personas fetch already in flight");
                return;
            }
        };

        let _loading = LoadingGuard {
            inner: &self.inner,
            context_id,
            seq,
        };

        let request = self
            .load_personas(context_id)
            .instrument(info_span!("veemee_store.fetch_personas", context_id, seq));
        let result = match options.cancel {
            Some(cancel) => tokio::select! {
                () = cancel.cancelled() => {
                    debug!(context_id, "personas fetch cancelled");
                    return;
                }
                result = request => result,
            },
            None => request.await,
        };

        match result {
            Ok(personas) => {
                let accepted = self.inner.update(|state| {
                    state
                        .personas
                        .complete(context_id, seq, personas, Instant::now())
                });
                if !accepted {
                    debug!(context_id, seq, "discarding stale personas response");
                }
            }
            Err(error) => error!(context_id, %error, "fetching personas failed"),
        }
    }

    async fn load_personas(&self, context_id: i64) -> ApiResult<Vec<Persona>> {
        let Some(token) = self.inner.credentials.get(JWT_KEY).await? else {
            return Ok(Vec::new());
        };
        self.inner.api.list_personas(&token, context_id).await
    }

    /// Fetch personas for many contexts with a bounded number of requests in
    /// flight. Duplicates and non-positive ids are dropped; each fetch still
    /// honours the freshness and in-flight rules.
    pub async fn prefetch_personas_for_contexts<I>(&self, context_ids: I)
    where
        I: IntoIterator<Item = i64>,
    {
        let ids = prefetch::unique_positive_ids(context_ids);
        let store = self;
        prefetch::run_with_concurrency(ids, self.inner.prefetch_concurrency, move |id| {
            store.fetch_personas_for_context(id, FetchOptions::default())
        })
        .await;
    }
}

async fn write_active_context_id(
    credentials: &dyn CredentialStore,
    active: Option<i64>,
) -> ApiResult<()> {
    match active {
        Some(id) => credentials.set(ACTIVE_CONTEXT_KEY, &id.to_string()).await,
        None => credentials.delete(ACTIVE_CONTEXT_KEY).await,
    }
}
