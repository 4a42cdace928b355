use futures::{stream::BoxStream, Stream};
use std::{
    collections::HashMap,
    pin::Pin,
    task::{Context, Poll},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use veemee_sdk::{ContextRow, Persona, WastebasketPolicy};

/// Progress of [`crate::ContextStore::hydrate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HydrationState {
    #[default]
    Uninitialized,
    Hydrating,
    /// The persisted active context id has been read. The context list may
    /// still be loading.
    Hydrated,
}

/// Read-only view of the store published after every change.
#[derive(Debug, Clone, Default)]
pub struct ContextStoreSnapshot {
    pub hydration: HydrationState,
    /// Until this is set, `active_context_id` is not trustworthy.
    pub hydrated: bool,
    /// Whether `contexts` holds the loaded list rather than the loading
    /// sentinel.
    pub contexts_loaded: bool,
    pub contexts: Vec<ContextRow>,
    pub active_context_id: Option<i64>,
    pub active_context: Option<ContextRow>,
    pub wastebasket_policy: WastebasketPolicy,
    pub personas_by_context_id: HashMap<i64, Vec<Persona>>,
    pub personas_fetched_at: HashMap<i64, Instant>,
    pub personas_loading_by_context_id: HashMap<i64, bool>,
}

impl ContextStoreSnapshot {
    pub fn visible_contexts(&self) -> impl Iterator<Item = &ContextRow> {
        self.contexts.iter().filter(|row| row.is_visible())
    }

    #[must_use]
    pub fn personas_for(&self, context_id: i64) -> &[Persona] {
        self.personas_by_context_id
            .get(&context_id)
            .map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn is_loading_personas(&self, context_id: i64) -> bool {
        self.personas_loading_by_context_id
            .get(&context_id)
            .copied()
            .unwrap_or(false)
    }
}

/// Options of [`crate::ContextStore::fetch_personas_for_context`].
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Fetch even if the cached entry is still fresh.
    pub force: bool,
    /// Stops waiting for the response once cancelled. Usually tied to the
    /// lifetime of the screen that asked for the data.
    pub cancel: Option<CancellationToken>,
}

impl FetchOptions {
    #[must_use]
    pub fn force() -> Self {
        Self {
            force: true,
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Stream of store snapshots, starting with the current one.
pub struct SnapshotStream(BoxStream<'static, ContextStoreSnapshot>);

impl SnapshotStream {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = ContextStoreSnapshot> + Send + 'static,
    {
        Self(Box::pin(stream))
    }
}

impl Stream for SnapshotStream {
    type Item = ContextStoreSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.0.as_mut().poll_next(cx)
    }
}
