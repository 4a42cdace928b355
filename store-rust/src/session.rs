use std::sync::atomic::{AtomicBool, Ordering};

/// Flags that live for one app session. A new [`crate::ContextStore`] starts
/// a new session; [`SessionState::reset`] starts one explicitly (e.g. on sign
/// out).
#[derive(Debug, Default)]
pub struct SessionState {
    intro_shown: AtomicBool,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` exactly once per session: the first caller shows the
    /// intro header, later callers skip it.
    pub fn take_intro(&self) -> bool {
        !self.intro_shown.swap(true, Ordering::AcqRel)
    }

    #[must_use]
    pub fn intro_shown(&self) -> bool {
        self.intro_shown.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.intro_shown.store(false, Ordering::Release);
    }
}
