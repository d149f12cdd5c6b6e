use crate::domain::entities::CurrentUser;
use async_trait::async_trait;

/// The identity collaborator: who is acting, and the hooks invoked when the
/// server rejects their credentials.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The currently known identity, if any.
    async fn current_identity(&self) -> Option<CurrentUser>;

    /// Drop locally held session artifacts.
    async fn clear_session(&self);

    /// Signal the host to redirect to the authentication entry point.
    async fn request_login(&self);
}

/// Credential source consumed by the transport adapter.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Best-available access token, if one is held.
    async fn access_token(&self) -> Option<String>;

    /// Attempt a refresh; `Some` carries the new token.
    async fn refresh_token(&self) -> Option<String>;
}
