use crate::data::user::User;
use crate::error::StoreError;
use crate::identity::provider::ProviderAccount;
use crate::store::DocumentStore;

/// Finds the profile of `account`, creating it on first sign-in.
///
/// The very first profile in the system is created as an approved admin. The claim is
/// recorded in a settings marker, so concurrent first sign-ins still produce exactly one
/// bootstrap admin.
#[tracing::instrument(skip(store, account), fields(uid = %account.uid))]
pub async fn resolve_profile(
    store: &dyn DocumentStore,
    account: &ProviderAccount,
) -> Result<User, StoreError> {
    if let Some(user) = store.get_user(&account.uid).await? {
        tracing::debug!("Found existing profile.");
        return Ok(user);
    }

    let bootstrap = if store.has_users().await? {
        store.bootstrap_owner().await?.as_deref() == Some(account.uid.as_str())
    } else {
        store.claim_bootstrap(&account.uid).await?
    };

    let user = User::from_account(account, bootstrap);
    match store.insert_user(&user).await {
        Ok(()) => {
            if bootstrap {
                tracing::info!("Created bootstrap admin profile.");
            } else {
                tracing::info!("Created profile awaiting approval.");
            }
            Ok(user)
        }
        Err(StoreError::Conflict(_)) => {
            tracing::debug!("Profile was created concurrently, re-reading it.");
            store
                .get_user(&account.uid)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("user '{}'", account.uid)))
        }
        Err(e) => Err(e),
    }
}
