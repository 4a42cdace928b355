use crate::{api::ApiContext, ApiResult, Persona};

/// The remote Veemee API as seen by clients. [`crate::VeemeeClient`] talks to
/// the real backend; [`crate::veemee_sdk_test::MockVeemeeApi`] replays canned
/// results in tests.
#[async_trait::async_trait]
pub trait VeemeeApi: Send + Sync {
    /// `GET /api/contexts`. Fails with [`crate::ApiError::Invariant`] when the
    /// body has no `contexts` array.
    async fn list_contexts(&self, token: &str) -> ApiResult<Vec<ApiContext>>;

    /// `GET /api/contexts/{context_id}/personas`
    async fn list_personas(&self, token: &str, context_id: i64) -> ApiResult<Vec<Persona>>;

    /// `POST /api/auth/dev-jwt`. Returns the minted token.
    async fn issue_dev_jwt(&self, api_key: &str, email: &str) -> ApiResult<String>;

    /// `POST /api/auth/magic-link`
    async fn send_magic_link(&self, email: &str) -> ApiResult<()>;

    /// `POST /api/auth/validate`. Exchanges a magic-link token for a JWT.
    async fn validate_magic_link(&self, token: &str) -> ApiResult<String>;
}
