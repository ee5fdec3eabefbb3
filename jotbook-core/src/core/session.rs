//! Sign-up, sign-in, sign-out, and profile updates over a [`CredentialStore`].
//!
//! [`SessionManager`] owns the current [`AuthState`], the `(user, is_loading)`
//! pair the presentation layer renders and routes on. Every operation moves the
//! state through `Authenticating` (`is_loading = true`) and settles it again, and
//! every change is pushed to the registered [`RouteGuard`].
//!
//! ```text
//! Unauthenticated ──sign_up/sign_in──▶ Authenticating ──ok──▶ Authenticated
//!        ▲                                   │ fail                 │
//!        └───────────────────────────────────┘                      │
//! Authenticated ──sign_out──▶ Authenticating ──ok──▶ Unauthenticated
//! ```
//!
//! Operations never return errors. Duplicate emails, bad credentials, invalid
//! input and storage failures are logged and reported as `false`, with the state
//! restored to what it was before the call.

use crate::core::credentials::CredentialStore;
use crate::core::password::hash_password;
use crate::core::storage::KeyValueStore;
use crate::{JotbookError, Result, User};

/// Coarse authentication phase derived from an [`AuthState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

/// The `(user, is_loading)` pair observed by the route guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<User>,
    pub is_loading: bool,
}

impl AuthState {
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if self.is_loading {
            SessionPhase::Authenticating
        } else if self.user.is_some() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Unauthenticated
        }
    }
}

impl Default for AuthState {
    /// Start-up state: nothing known yet, stored session still loading.
    fn default() -> Self {
        Self {
            user: None,
            is_loading: true,
        }
    }
}

/// Which group of screens the presentation layer is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteGroup {
    /// Sign-in and registration screens.
    Auth,
    /// Everything that requires a signed-in user.
    App,
}

/// Navigation target requested by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirect {
    /// The signed-in landing screen.
    Home,
    /// The sign-in screen.
    Login,
}

/// Decides whether the screen group `group` is allowed under `state`.
///
/// No redirect happens while loading. A signed-in user inside the auth screens
/// goes [`Home`](Redirect::Home); a signed-out user anywhere else goes to
/// [`Login`](Redirect::Login).
#[must_use]
pub fn guard_redirect(state: &AuthState, group: RouteGroup) -> Option<Redirect> {
    if state.is_loading {
        return None;
    }
    match (&state.user, group) {
        (Some(_), RouteGroup::Auth) => Some(Redirect::Home),
        (None, RouteGroup::App) => Some(Redirect::Login),
        _ => None,
    }
}

/// Navigation collaborator notified of every authentication transition.
pub trait RouteGuard {
    /// Called after every state change, including entering and leaving the loading state.
    fn on_auth_change(&self, _state: &AuthState) {}

    /// Called when the session layer asks for an explicit navigation.
    fn redirect(&self, _target: Redirect) {}
}

/// No-op guard for headless use.
impl RouteGuard for () {}

/// Owns the signed-in identity and gates access to the notes layer.
pub struct SessionManager<S> {
    credentials: CredentialStore<S>,
    state: AuthState,
    guard: Box<dyn RouteGuard + Send + Sync>,
}

impl<S: KeyValueStore> SessionManager<S> {
    /// Creates a manager in the loading state. Call [`restore`](Self::restore) next.
    pub fn new(store: S) -> Self {
        Self {
            credentials: CredentialStore::new(store),
            state: AuthState::default(),
            guard: Box::new(()),
        }
    }

    /// Replaces the route guard notified on each transition.
    #[must_use]
    pub fn with_route_guard<G>(mut self, guard: G) -> Self
    where
        G: RouteGuard + Send + Sync + 'static,
    {
        self.guard = Box::new(guard);
        self
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn current_user(&self) -> Option<&User> {
        self.state.user.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn credentials(&self) -> &CredentialStore<S> {
        &self.credentials
    }

    /// Loads the persisted current-user pointer and leaves the loading state.
    ///
    /// Returns `true` if a previous session was resumed. A storage failure is
    /// logged and leaves the session signed out.
    pub async fn restore(&mut self) -> bool {
        let user = match self.credentials.current_user().await {
            Ok(user) => user,
            Err(e) => {
                log::error!("failed to load stored session: {e}");
                None
            }
        };
        let resumed = user.is_some();
        if let Some(user) = &user {
            log::info!("resumed session for user {}", user.id);
        }
        self.settle(user);
        resumed
    }

    /// Registers a new account and signs it in.
    ///
    /// Returns `false` if any field is blank, the email is already registered, or
    /// storage fails.
    pub async fn sign_up(&mut self, username: &str, email: &str, password: &str) -> bool {
        if let Err(e) = validate_account_fields(username, email, Some(password)) {
            log::warn!("sign-up rejected: {e}");
            return false;
        }

        let prior = self.begin();
        match self.try_sign_up(username, email, password).await {
            Ok(user) => {
                log::info!("registered user {}", user.id);
                self.settle(Some(user));
                true
            }
            Err(e) => {
                report_failure("sign-up", &e);
                self.settle(prior.user);
                false
            }
        }
    }

    async fn try_sign_up(&self, username: &str, email: &str, password: &str) -> Result<User> {
        if self.credentials.find_user(|u| u.email == email).await?.is_some() {
            return Err(JotbookError::Conflict(format!(
                "Email {email} is already registered"
            )));
        }
        let user = User::register(username, email, password)?;
        self.credentials.insert_and_sign_in(&user).await?;
        Ok(user)
    }

    /// Signs in the user whose email and password both match.
    ///
    /// Returns `false` on unknown email, wrong password, or storage failure.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> bool {
        let prior = self.begin();
        match self.try_sign_in(email, password).await {
            Ok(Some(user)) => {
                log::info!("signed in user {}", user.id);
                self.settle(Some(user));
                true
            }
            Ok(None) => {
                log::warn!("sign-in rejected: no account matches those credentials");
                self.settle(prior.user);
                false
            }
            Err(e) => {
                report_failure("sign-in", &e);
                self.settle(prior.user);
                false
            }
        }
    }

    async fn try_sign_in(&self, email: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.credentials.find_by_credentials(email, password).await? else {
            return Ok(None);
        };
        self.credentials.set_current_user(Some(&user)).await?;
        Ok(Some(user))
    }

    /// Clears the current-user pointer and sends the guard to the login screen.
    ///
    /// Returns `false` (and stays signed in) if the pointer cannot be cleared.
    pub async fn sign_out(&mut self) -> bool {
        let prior = self.begin();
        match self.credentials.set_current_user(None).await {
            Ok(()) => {
                if let Some(user) = &prior.user {
                    log::info!("signed out user {}", user.id);
                }
                self.settle(None);
                self.guard.redirect(Redirect::Login);
                true
            }
            Err(e) => {
                report_failure("sign-out", &e);
                self.settle(prior.user);
                false
            }
        }
    }

    /// Updates the signed-in user's username, email and, if `password` is
    /// non-empty, password.
    ///
    /// Returns `false` if nobody is signed in, a field is blank, the email belongs
    /// to another user, or storage fails.
    pub async fn update_profile(&mut self, username: &str, email: &str, password: &str) -> bool {
        let Some(current) = self.state.user.clone() else {
            report_failure("profile update", &JotbookError::NotAuthenticated);
            return false;
        };
        if let Err(e) = validate_account_fields(username, email, None) {
            log::warn!("profile update rejected: {e}");
            return false;
        }

        let prior = self.begin();
        match self.try_update_profile(&current.id, username, email, password).await {
            Ok(user) => {
                log::info!("updated profile of user {}", user.id);
                self.settle(Some(user));
                true
            }
            Err(e) => {
                report_failure("profile update", &e);
                self.settle(prior.user);
                false
            }
        }
    }

    async fn try_update_profile(
        &self,
        user_id: &str,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User> {
        let stored = self
            .credentials
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| JotbookError::UserNotFound(user_id.to_string()))?;

        let password_hash = if password.is_empty() {
            stored.password_hash
        } else {
            hash_password(password)?
        };
        let updated = User {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            ..stored
        };

        self.credentials.replace_and_sign_in(&updated).await?;
        Ok(updated)
    }

    /// Enters the loading state and returns the state it left.
    fn begin(&mut self) -> AuthState {
        let prior = self.state.clone();
        self.state.is_loading = true;
        log::debug!("session {:?} -> {:?}", prior.phase(), self.state.phase());
        self.guard.on_auth_change(&self.state);
        prior
    }

    fn settle(&mut self, user: Option<User>) {
        let from = self.state.phase();
        self.state = AuthState {
            user,
            is_loading: false,
        };
        log::debug!("session {:?} -> {:?}", from, self.state.phase());
        self.guard.on_auth_change(&self.state);
    }
}

fn validate_account_fields(username: &str, email: &str, password: Option<&str>) -> Result<()> {
    if username.trim().is_empty() {
        return Err(JotbookError::ValidationFailed("Username is required".to_string()));
    }
    if email.trim().is_empty() {
        return Err(JotbookError::ValidationFailed("Email is required".to_string()));
    }
    if password.is_some_and(|p| p.trim().is_empty()) {
        return Err(JotbookError::ValidationFailed("Password is required".to_string()));
    }
    Ok(())
}

fn report_failure(operation: &str, e: &JotbookError) {
    if e.is_storage_failure() {
        log::error!("{operation} failed: {e}");
    } else {
        log::warn!("{operation} rejected: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::FailingStore;
    use crate::MemoryStore;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingGuard {
        states: Arc<Mutex<Vec<AuthState>>>,
        redirects: Arc<Mutex<Vec<Redirect>>>,
    }

    impl RouteGuard for RecordingGuard {
        fn on_auth_change(&self, state: &AuthState) {
            self.states.lock().unwrap().push(state.clone());
        }

        fn redirect(&self, target: Redirect) {
            self.redirects.lock().unwrap().push(target);
        }
    }

    async fn restored(store: MemoryStore) -> SessionManager<MemoryStore> {
        let mut session = SessionManager::new(store);
        session.restore().await;
        session
    }

    #[tokio::test]
    async fn test_starts_loading_then_restores_signed_out() {
        let mut session = SessionManager::new(MemoryStore::new());
        assert_eq!(session.phase(), SessionPhase::Authenticating);

        assert!(!session.restore().await);
        assert_eq!(session.phase(), SessionPhase::Unauthenticated);
        assert!(session.current_user().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let mut session = restored(MemoryStore::new()).await;

        assert!(session.sign_up("ada", "ada@example.com", "engine").await);
        assert_eq!(session.phase(), SessionPhase::Authenticated);
        let id = session.current_user().unwrap().id.clone();

        assert!(session.sign_out().await);
        assert_eq!(session.phase(), SessionPhase::Unauthenticated);

        assert!(session.sign_in("ada@example.com", "engine").await);
        assert_eq!(session.current_user().unwrap().id, id);
    }

    #[tokio::test]
    async fn test_sign_up_duplicate_email_leaves_users_unchanged() {
        let store = MemoryStore::new();
        let mut session = restored(store.clone()).await;
        assert!(session.sign_up("ada", "ada@example.com", "engine").await);
        let before = session.credentials().list_users().await.unwrap();

        assert!(session.sign_out().await);
        assert!(!session.sign_up("other", "ada@example.com", "x").await);

        assert_eq!(session.credentials().list_users().await.unwrap(), before);
        assert_eq!(session.phase(), SessionPhase::Unauthenticated);
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_sign_up_rejects_blank_fields() {
        let mut session = restored(MemoryStore::new()).await;
        assert!(!session.sign_up("  ", "ada@example.com", "engine").await);
        assert!(!session.sign_up("ada", "", "engine").await);
        assert!(!session.sign_up("ada", "ada@example.com", " ").await);
        assert!(session.credentials().list_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sign_in_wrong_password_keeps_prior_state() {
        let mut session = restored(MemoryStore::new()).await;
        assert!(session.sign_up("ada", "ada@example.com", "engine").await);
        let ada = session.current_user().cloned();

        assert!(!session.sign_in("ada@example.com", "wrong").await);
        assert_eq!(session.current_user().cloned(), ada);
        assert_eq!(session.phase(), SessionPhase::Authenticated);
    }

    #[tokio::test]
    async fn test_session_survives_restart() {
        let store = MemoryStore::new();
        {
            let mut session = restored(store.clone()).await;
            assert!(session.sign_up("ada", "ada@example.com", "engine").await);
        }

        let mut session = SessionManager::new(store);
        assert!(session.restore().await);
        assert_eq!(session.current_user().unwrap().email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_update_profile_merges_fields() {
        let mut session = restored(MemoryStore::new()).await;
        assert!(session.sign_up("ada", "ada@example.com", "engine").await);
        let original = session.current_user().cloned().unwrap();

        assert!(session.update_profile("Ada L.", "lovelace@example.com", "").await);

        let updated = session.current_user().cloned().unwrap();
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(updated.username, "Ada L.");
        assert_eq!(updated.email, "lovelace@example.com");
        assert_eq!(updated.password_hash, original.password_hash);

        let stored = session.credentials().find_by_id(&original.id).await.unwrap();
        assert_eq!(stored, Some(updated.clone()));
        assert_eq!(session.credentials().current_user().await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn test_update_profile_changes_password() {
        let mut session = restored(MemoryStore::new()).await;
        assert!(session.sign_up("ada", "ada@example.com", "engine").await);
        assert!(session.update_profile("ada", "ada@example.com", "analytical").await);
        assert!(session.sign_out().await);

        assert!(!session.sign_in("ada@example.com", "engine").await);
        assert!(session.sign_in("ada@example.com", "analytical").await);
    }

    #[tokio::test]
    async fn test_update_profile_rejects_email_of_other_user() {
        let mut session = restored(MemoryStore::new()).await;
        assert!(session.sign_up("bob", "bob@example.com", "builder").await);
        assert!(session.sign_up("ada", "ada@example.com", "engine").await);

        assert!(!session.update_profile("ada", "bob@example.com", "").await);
        assert_eq!(session.current_user().unwrap().email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_update_profile_requires_sign_in() {
        let mut session = restored(MemoryStore::new()).await;
        assert!(!session.update_profile("ada", "ada@example.com", "").await);
    }

    #[tokio::test]
    async fn test_guard_sees_every_transition() {
        let guard = RecordingGuard::default();
        let mut session = SessionManager::new(MemoryStore::new()).with_route_guard(guard.clone());
        session.restore().await;
        assert!(session.sign_up("ada", "ada@example.com", "engine").await);
        assert!(session.sign_out().await);

        let phases: Vec<SessionPhase> = guard
            .states
            .lock()
            .unwrap()
            .iter()
            .map(AuthState::phase)
            .collect();
        assert_eq!(
            phases,
            vec![
                SessionPhase::Unauthenticated,
                SessionPhase::Authenticating,
                SessionPhase::Authenticated,
                SessionPhase::Authenticating,
                SessionPhase::Unauthenticated,
            ]
        );
        assert_eq!(*guard.redirects.lock().unwrap(), vec![Redirect::Login]);
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported_as_false() {
        let store = FailingStore::default();
        let mut session = SessionManager::new(store.clone());
        session.restore().await;
        assert!(session.sign_up("ada", "ada@example.com", "engine").await);

        store.fail_writes(true);
        assert!(!session.sign_out().await);
        assert_eq!(session.phase(), SessionPhase::Authenticated);
        assert!(!session.update_profile("Ada", "ada@example.com", "").await);
        assert_eq!(session.current_user().unwrap().username, "ada");

        store.fail_writes(false);
        assert!(session.sign_out().await);
    }

    #[tokio::test]
    async fn test_sign_up_pointer_failure_leaves_no_account() {
        let store = FailingStore::default();
        let mut session = SessionManager::new(store.clone());
        session.restore().await;

        // Write 1 is the user set, write 2 the current-user pointer.
        store.fail_nth_write(2);
        assert!(!session.sign_up("ada", "ada@example.com", "engine").await);
        assert_eq!(session.phase(), SessionPhase::Unauthenticated);
        assert!(session.credentials().list_users().await.unwrap().is_empty());
        assert!(session.credentials().current_user().await.unwrap().is_none());

        assert!(session.sign_up("ada", "ada@example.com", "engine").await);
        assert_eq!(session.credentials().list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_profile_pointer_failure_restores_record() {
        let store = FailingStore::default();
        let mut session = SessionManager::new(store.clone());
        session.restore().await;
        assert!(session.sign_up("ada", "ada@example.com", "engine").await);
        let before = session.current_user().unwrap().clone();

        store.fail_nth_write(2);
        assert!(
            !session
                .update_profile("Ada", "new@example.com", "new-password")
                .await
        );

        let creds = session.credentials();
        assert_eq!(creds.list_users().await.unwrap(), vec![before.clone()]);
        assert_eq!(creds.current_user().await.unwrap(), Some(before.clone()));
        assert_eq!(session.current_user(), Some(&before));
        assert!(creds
            .find_by_credentials("ada@example.com", "engine")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_restore_with_unreadable_storage_signs_out() {
        let store = FailingStore::default();
        store.fail_reads(true);
        let mut session = SessionManager::new(store);
        assert!(!session.restore().await);
        assert_eq!(session.phase(), SessionPhase::Unauthenticated);
    }

    #[test]
    fn test_guard_redirect() {
        let loading = AuthState::default();
        assert_eq!(guard_redirect(&loading, RouteGroup::App), None);

        let signed_out = AuthState {
            user: None,
            is_loading: false,
        };
        assert_eq!(guard_redirect(&signed_out, RouteGroup::App), Some(Redirect::Login));
        assert_eq!(guard_redirect(&signed_out, RouteGroup::Auth), None);

        let signed_in = AuthState {
            user: Some(User::register("ada", "ada@example.com", "engine").unwrap()),
            is_loading: false,
        };
        assert_eq!(guard_redirect(&signed_in, RouteGroup::Auth), Some(Redirect::Home));
        assert_eq!(guard_redirect(&signed_in, RouteGroup::App), None);
    }
}
