//! Session credentials: whether a usable token is stored, signing out, the
//! development token shortcut and magic-link sign in.

use crate::{StoreError, StoreResult};
use std::env;
use tracing::{debug, info};
use veemee_sdk::{
    jwt::{self, DEFAULT_EXPIRY_SKEW_SECONDS},
    CredentialStore, VeemeeApi, JWT_KEY,
};

pub const DEV_BYPASS_AUTH_ENV: &str = "VEEMEE_DEV_BYPASS_AUTH";
pub const API_KEY_ENV: &str = "VEEMEE_API_KEY";
pub const DEV_EMAIL_ENV: &str = "VEEMEE_DEV_EMAIL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    Authenticated { email: Option<String> },
    Unauthenticated,
}

impl AuthStatus {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

/// Inspect the stored token. A token that cannot be decoded, has no expiry or
/// has expired counts as signed out.
pub async fn auth_status(credentials: &dyn CredentialStore) -> StoreResult<AuthStatus> {
    let Some(token) = credentials.get(JWT_KEY).await? else {
        debug!("no stored token");
        return Ok(AuthStatus::Unauthenticated);
    };

    if jwt::is_expired(&token, 0) {
        debug!("stored token is expired or unreadable");
        return Ok(AuthStatus::Unauthenticated);
    }

    Ok(AuthStatus::Authenticated {
        email: jwt::email(&token),
    })
}

pub async fn sign_out(credentials: &dyn CredentialStore) -> StoreResult<()> {
    credentials.delete(JWT_KEY).await?;
    Ok(())
}

/// Settings for minting development tokens without the magic-link flow.
#[derive(Debug, Clone, Default)]
pub struct DevAuth {
    pub enabled: bool,
    pub api_key: String,
    pub email: String,
}

impl DevAuth {
    #[must_use]
    pub fn from_env() -> Self {
        let enabled = env::var(DEV_BYPASS_AUTH_ENV)
            .is_ok_and(|value| matches!(value.trim(), "1" | "true" | "TRUE" | "yes"));
        Self {
            enabled,
            api_key: env::var(API_KEY_ENV).unwrap_or_default(),
            email: env::var(DEV_EMAIL_ENV).unwrap_or_default(),
        }
    }
}

/// Make sure a development token is stored when `dev.enabled` is set. A
/// stored token is kept until it is within the expiry skew; otherwise it is
/// dropped and a new one is minted.
pub async fn ensure_dev_jwt(
    api: &dyn VeemeeApi,
    credentials: &dyn CredentialStore,
    dev: &DevAuth,
) -> StoreResult<()> {
    if !dev.enabled {
        return Ok(());
    }

    if let Some(existing) = credentials.get(JWT_KEY).await? {
        if !jwt::is_expired(&existing, DEFAULT_EXPIRY_SKEW_SECONDS) {
            return Ok(());
        }
        debug!("dropping expired development token");
        credentials.delete(JWT_KEY).await?;
    }

    let token = api.issue_dev_jwt(&dev.api_key, &dev.email).await?;
    credentials.set(JWT_KEY, &token).await?;
    info!(email = dev.email, "stored development token");
    Ok(())
}

/// Ask the API to email a sign-in link.
pub async fn send_magic_link(api: &dyn VeemeeApi, email: &str) -> StoreResult<()> {
    let email = email.trim();
    if email.is_empty() {
        return Err(StoreError::InvalidInput("email is required".to_string()));
    }
    api.send_magic_link(email).await?;
    Ok(())
}

/// Exchange the token from a sign-in link for a session token and store it.
pub async fn complete_magic_link(
    api: &dyn VeemeeApi,
    credentials: &dyn CredentialStore,
    token: &str,
) -> StoreResult<()> {
    let token = token.trim();
    if token.is_empty() {
        return Err(StoreError::InvalidInput("token is required".to_string()));
    }
    let jwt = api.validate_magic_link(token).await?;
    credentials.set(JWT_KEY, &jwt).await?;
    Ok(())
}
