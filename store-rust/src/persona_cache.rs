use std::{
    collections::HashMap,
    time::{Duration, Instant},
};
use veemee_sdk::Persona;

/// Cached personas of one context.
#[derive(Debug, Clone, Default)]
pub struct PersonaCacheEntry {
    pub personas: Vec<Persona>,
    pub fetched_at: Option<Instant>,
    /// Sequence number of the request currently holding the loading flag.
    loading_request: Option<u64>,
}

impl PersonaCacheEntry {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading_request.is_some()
    }

    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        self.fetched_at
            .is_some_and(|fetched_at| now.saturating_duration_since(fetched_at) < ttl)
    }
}

/// Why a fetch was not started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSkip {
    Fresh,
    InFlight,
}

/// Per-context persona cache with a loading flag and a monotonic request
/// counter per context. A response is only accepted if no newer request has
/// been issued or the entry invalidated since it was sent.
#[derive(Debug, Default)]
pub struct PersonaCache {
    entries: HashMap<i64, PersonaCacheEntry>,
    latest_request: HashMap<i64, u64>,
}

impl PersonaCache {
    #[must_use]
    pub fn get(&self, context_id: i64) -> Option<&PersonaCacheEntry> {
        self.entries.get(&context_id)
    }

    #[must_use]
    pub fn is_loading(&self, context_id: i64) -> bool {
        self.get(context_id).is_some_and(PersonaCacheEntry::is_loading)
    }

    pub fn entries(&self) -> impl Iterator<Item = (i64, &PersonaCacheEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    fn bump(&mut self, context_id: i64) -> u64 {
        let seq = self.latest_request.entry(context_id).or_insert(0);
        *seq += 1;
        *seq
    }

    /// Mark `context_id` as loading and return the request's sequence number,
    /// unless the entry is still fresh (and `force` is unset) or a request is
    /// already in flight.
    pub fn begin_fetch(
        &mut self,
        context_id: i64,
        force: bool,
        ttl: Duration,
        now: Instant,
    ) -> Result<u64, FetchSkip> {
        if let Some(entry) = self.entries.get(&context_id) {
            if !force && entry.is_fresh(ttl, now) {
                return Err(FetchSkip::Fresh);
            }
            if entry.is_loading() {
                return Err(FetchSkip::InFlight);
            }
        }

        let seq = self.bump(context_id);
        self.entries.entry(context_id).or_default().loading_request = Some(seq);
        Ok(seq)
    }

    /// Store the result of request `seq`. Returns `false` and leaves the cache
    /// untouched if the response is stale.
    pub fn complete(
        &mut self,
        context_id: i64,
        seq: u64,
        personas: Vec<Persona>,
        now: Instant,
    ) -> bool {
        if self.latest_request.get(&context_id) != Some(&seq) {
            return false;
        }
        let entry = self.entries.entry(context_id).or_default();
        entry.personas = personas;
        entry.fetched_at = Some(now);
        true
    }

    /// Release the loading flag if request `seq` still holds it. An entry
    /// invalidated while the request was in flight is dropped along with its
    /// request counter.
    pub fn release(&mut self, context_id: i64, seq: u64) -> bool {
        match self.entries.get_mut(&context_id) {
            Some(entry) if entry.loading_request == Some(seq) => {
                entry.loading_request = None;
                if self.latest_request.get(&context_id) != Some(&seq) {
                    self.forget(context_id);
                }
                true
            }
            _ => false,
        }
    }

    /// Drop the cached personas of `context_id`. A request in flight keeps
    /// its loading flag until it finishes but its response is discarded.
    pub fn invalidate(&mut self, context_id: i64) {
        match self.entries.get_mut(&context_id) {
            Some(entry) if entry.is_loading() => {
                entry.personas.clear();
                entry.fetched_at = None;
                self.bump(context_id);
            }
            _ => self.forget(context_id),
        }
    }

    /// No request is in flight, so no response can arrive that the counter
    /// would have to reject.
    fn forget(&mut self, context_id: i64) {
        self.entries.remove(&context_id);
        self.latest_request.remove(&context_id);
    }

    pub fn clear(&mut self) {
        let ids: Vec<i64> = self.entries.keys().copied().collect();
        for id in ids {
            self.invalidate(id);
        }
    }
}
