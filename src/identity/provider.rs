use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::AuthError;

/// Account as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAccount {
    /// Stable subject id, used as the profile key.
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Runs the interactive sign-in flow.
    async fn sign_in(&self) -> Result<ProviderAccount, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Session notifications: `Some` while signed in, `None` after sign-out.
    fn subscribe(&self) -> watch::Receiver<Option<ProviderAccount>>;
}
