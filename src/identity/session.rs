//! Session state driven by the identity provider's notification stream.

use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_futures::Instrument;

use crate::data::user::User;
use crate::error::{AuthError, StoreError};
use crate::identity::profile::resolve_profile;
use crate::identity::provider::{IdentityProvider, ProviderAccount};
use crate::store::DocumentStore;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    SignedOut,
    /// Signed in with the provider, profile lookup in flight.
    Resolving,
    SignedIn(User),
    Failed(String),
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::SignedIn(user) => Some(user),
            _ => None,
        }
    }
}

pub struct Session {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    state: watch::Sender<SessionState>,
    error: Mutex<Option<String>>,
    /// Bumped on every transition; a profile lookup only lands if the epoch didn't move.
    epoch: AtomicU64,
}

/// Owns the observer task; dropping the handle unsubscribes.
pub struct SessionHandle {
    session: Arc<Session>,
    observer: JoinHandle<()>,
}

impl Session {
    /// Subscribes to the provider for the lifetime of the returned handle.
    pub fn start(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
    ) -> SessionHandle {
        let (state, _) = watch::channel(SessionState::SignedOut);
        let notifications = provider.subscribe();
        let session = Arc::new(Session {
            provider,
            store,
            state,
            error: Mutex::new(None),
            epoch: AtomicU64::new(0),
        });

        let observer = tokio::spawn(
            observe(session.clone(), notifications).instrument(tracing::info_span!("session")),
        );

        SessionHandle { session, observer }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Message of the last failed `login`, cleared when a new attempt starts.
    pub fn last_error(&self) -> Option<String> {
        self.error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_error(&self, message: Option<String>) {
        *self
            .error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = message;
    }

    /// Runs the provider's sign-in flow and resolves the returned account's profile.
    ///
    /// Resolution doesn't depend on the provider notifying: signing in again with an account
    /// the provider already holds produces no notification.
    #[tracing::instrument(skip(self))]
    pub async fn login(&self) -> Result<User, AuthError> {
        self.set_error(None);
        let mut states = self.state.subscribe();

        let account = match self.provider.sign_in().await {
            Ok(account) => account,
            Err(e) => {
                tracing::warn!("Sign-in failed: {}", e);
                self.set_error(Some(e.to_string()));
                return Err(e);
            }
        };

        if let Some(user) = self.user().filter(|user| user.id == account.uid) {
            return Ok(user);
        }

        let result = match self.resolve(&account).await {
            Some(result) => result,
            None => self.await_resolution(&mut states, &account.uid).await,
        };
        result.map_err(|e| {
            self.set_error(Some(e.to_string()));
            e
        })
    }

    /// Follows a resolution that superseded this login's own lookup.
    async fn await_resolution(
        &self,
        states: &mut watch::Receiver<SessionState>,
        uid: &str,
    ) -> Result<User, AuthError> {
        loop {
            let state = states.borrow_and_update().clone();
            match state {
                SessionState::SignedIn(user) if user.id == uid => return Ok(user),
                SessionState::Failed(message) => return Err(AuthError::Profile(message)),
                SessionState::SignedOut => {
                    return Err(AuthError::Provider("signed out during sign-in".to_string()))
                }
                _ => {}
            }
            if states.changed().await.is_err() {
                return Err(AuthError::Provider("session closed".to_string()));
            }
        }
    }

    /// Always ends signed out; provider failures are only logged.
    #[tracing::instrument(skip(self))]
    pub async fn logout(&self) {
        if let Err(e) = self.provider.sign_out().await {
            tracing::warn!("Sign-out failed, clearing local session anyway: {}", e);
        }
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(SessionState::SignedOut);
    }

    /// Re-reads the signed-in profile, e.g. after an admin approved it.
    ///
    /// A profile that no longer exists was rejected, which signs the session out.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Option<User>, StoreError> {
        let id = match self.user() {
            Some(user) => user.id,
            None => return Ok(None),
        };
        let epoch = self.epoch.load(Ordering::SeqCst);

        let user = self.store.get_user(&id).await?;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            tracing::debug!("Session changed during refresh, dropping result.");
            return Ok(self.user());
        }

        match &user {
            Some(user) => {
                self.state.send_replace(SessionState::SignedIn(user.clone()));
            }
            None => {
                tracing::info!("Profile '{}' no longer exists.", id);
                self.state.send_replace(SessionState::SignedOut);
            }
        }
        Ok(user)
    }

    async fn apply(&self, account: Option<ProviderAccount>) {
        match account {
            Some(account) => {
                self.resolve(&account).await;
            }
            None => {
                self.epoch.fetch_add(1, Ordering::SeqCst);
                self.state.send_replace(SessionState::SignedOut);
            }
        }
    }

    /// Looks up or creates the profile of `account` and publishes the outcome.
    ///
    /// Returns `None` when another transition started meanwhile; the result is then dropped.
    async fn resolve(&self, account: &ProviderAccount) -> Option<Result<User, AuthError>> {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_replace(SessionState::Resolving);
        let resolved = resolve_profile(self.store.as_ref(), account).await;

        if self.epoch.load(Ordering::SeqCst) != epoch {
            tracing::debug!("Discarding profile of a superseded session.");
            return None;
        }

        match resolved {
            Ok(user) => {
                self.state.send_replace(SessionState::SignedIn(user.clone()));
                Some(Ok(user))
            }
            Err(e) => {
                tracing::error!("Unable to resolve profile: {}", e);
                self.set_error(Some(e.to_string()));
                self.state.send_replace(SessionState::Failed(e.to_string()));
                Some(Err(AuthError::Profile(e.to_string())))
            }
        }
    }
}

async fn observe(session: Arc<Session>, mut notifications: watch::Receiver<Option<ProviderAccount>>) {
    loop {
        let account = notifications.borrow_and_update().clone();
        session.apply(account).await;

        if notifications.changed().await.is_err() {
            tracing::debug!("Identity provider closed its notification stream.");
            break;
        }
    }
}

impl Deref for SessionHandle {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.observer.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::identity::provider::fake::{account, FakeProvider};
    use crate::role::Role;
    use crate::store::{MemoryStore, UserStore};

    fn start(provider: &Arc<FakeProvider>, store: &Arc<MemoryStore>) -> SessionHandle {
        Session::start(provider.clone(), store.clone())
    }

    async fn settle(session: &Session, done: impl Fn(&SessionState) -> bool) -> SessionState {
        let mut states = session.subscribe();
        loop {
            let state = states.borrow_and_update().clone();
            if done(&state) {
                return state;
            }
            states.changed().await.unwrap();
        }
    }

    #[tokio::test]
    async fn login_resolves_bootstrap_admin() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new(Ok(account("u1", "Ana", "ana@school.edu"))));
        let session = start(&provider, &store);

        let user = session.login().await.unwrap();
        assert_eq!(user.role, Role::Admin);
        assert!(user.is_approved);
        assert_eq!(session.user(), Some(user));
    }

    #[tokio::test]
    async fn login_error_is_surfaced_then_cleared() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new(Err(AuthError::Cancelled)));
        let session = start(&provider, &store);

        assert_eq!(session.login().await, Err(AuthError::Cancelled));
        assert_eq!(session.last_error(), Some("sign-in was cancelled".to_string()));

        provider.set_next(Ok(account("u1", "Ana", "ana@school.edu")));
        session.login().await.unwrap();
        assert_eq!(session.last_error(), None);
    }

    #[tokio::test]
    async fn restored_session_resolves_without_login() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new(Err(AuthError::Cancelled)));
        let session = start(&provider, &store);

        provider.restore(Some(account("u1", "Ana", "ana@school.edu")));
        let state = settle(&session, |it| matches!(it, SessionState::SignedIn(_))).await;
        assert_eq!(state.user().map(|it| it.id.as_str()), Some("u1"));
    }

    #[tokio::test]
    async fn logout_failure_still_signs_out() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new(Ok(account("u1", "Ana", "ana@school.edu"))));
        let session = start(&provider, &store);
        session.login().await.unwrap();

        provider.fail_sign_out(AuthError::Provider("offline".to_string()));
        session.logout().await;
        assert_eq!(session.state(), SessionState::SignedOut);
    }

    #[tokio::test]
    async fn store_failure_ends_in_failed_state() {
        let store = Arc::new(MemoryStore::new());
        store.set_offline(true);
        let provider = Arc::new(FakeProvider::new(Ok(account("u1", "Ana", "ana@school.edu"))));
        let session = start(&provider, &store);

        assert!(matches!(session.login().await, Err(AuthError::Profile(_))));
        assert!(matches!(session.state(), SessionState::Failed(_)));
        assert!(session.last_error().is_some());
    }

    #[tokio::test]
    async fn refresh_picks_up_approval_and_rejection() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new(Ok(account("u1", "Ana", "ana@school.edu"))));
        let admin = start(&provider, &store);
        admin.login().await.unwrap();

        let other = Arc::new(FakeProvider::new(Ok(account("u2", "Bao", "bao@school.edu"))));
        let student = start(&other, &store);
        assert!(!student.login().await.unwrap().is_approved);

        store.set_approved("u2", true).await.unwrap();
        assert!(student.refresh().await.unwrap().unwrap().is_approved);
        assert!(student.user().unwrap().is_approved);

        store.delete_user("u2").await.unwrap();
        assert_eq!(student.refresh().await.unwrap(), None);
        assert_eq!(student.state(), SessionState::SignedOut);
    }

    #[tokio::test]
    async fn retry_after_profile_failure_resolves() {
        let store = Arc::new(MemoryStore::new());
        store.set_offline(true);
        let provider = Arc::new(FakeProvider::new(Ok(account("u1", "Ana", "ana@school.edu"))));
        let session = start(&provider, &store);
        assert!(matches!(session.login().await, Err(AuthError::Profile(_))));

        store.set_offline(false);
        let retried = tokio::time::timeout(Duration::from_secs(2), session.login())
            .await
            .expect("retry must not wait for a provider notification");
        assert_eq!(retried.unwrap().id, "u1");
        assert_eq!(session.last_error(), None);
    }

    #[tokio::test]
    async fn login_after_failed_sign_out_resolves() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new(Ok(account("u1", "Ana", "ana@school.edu"))));
        let session = start(&provider, &store);
        session.login().await.unwrap();

        provider.fail_sign_out(AuthError::Provider("offline".to_string()));
        session.logout().await;
        assert_eq!(session.state(), SessionState::SignedOut);

        let again = tokio::time::timeout(Duration::from_secs(2), session.login())
            .await
            .expect("provider still holds the account, no notification follows");
        assert_eq!(again.unwrap().id, "u1");
        assert!(matches!(session.state(), SessionState::SignedIn(_)));
    }
}
