pub mod auth;
mod contexts;
mod errors;
mod params;
mod persona_cache;
mod prefetch;
mod session;
pub mod skins;
mod store;
mod types;

pub use auth::{
    auth_status, complete_magic_link, ensure_dev_jwt, send_magic_link, sign_out, AuthStatus,
    DevAuth,
};
pub use contexts::{seed_contexts, ContextList, ContextPatch, NewContext};
pub use errors::{StoreError, StoreResult};
pub use params::{StoreParams, DEFAULT_PERSONA_TTL, DEFAULT_PREFETCH_CONCURRENCY};
pub use persona_cache::{FetchSkip, PersonaCache, PersonaCacheEntry};
pub use session::SessionState;
pub use skins::{skin, Skin};
pub use store::ContextStore;
pub use types::*;
