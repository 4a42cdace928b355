pub mod api;
mod client;
mod client_utils;
pub mod credentials;
mod errors;
pub mod jwt;
mod normalize;
mod opentelemetry;
mod types;
mod veemee_api;
pub mod veemee_sdk_test;

pub use client::{VeemeeClient, VeemeeClientOptions, BASE_URL_ENV, DEFAULT_BASE_URL};
pub use credentials::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, ACTIVE_CONTEXT_KEY, JWT_KEY,
};
pub use errors::*;
pub use normalize::{
    compare_by_order, normalize_context, normalize_contexts, sort_key, UNORDERED_SORT_KEY,
};
pub use types::*;
pub use veemee_api::VeemeeApi;
