//! Session state machine.
//!
//! `SessionManager` owns the in-memory [`Session`], drives it through
//! startup hydration, login, registration, refresh and logout, and mirrors
//! the token pair into a [`TokenStore`]. Observers follow changes through a
//! `tokio::sync::watch` channel.
//!
//! Phases: `Uninitialized` -> `Initializing` -> `Authenticated` | `Anonymous`,
//! with `Authenticated` <-> `Anonymous` via login, logout and failed refresh.
//! `is_loading` is an orthogonal flag raised while network operations run.
//!
//! The session is only modified between await points, in single
//! `watch::Sender` mutations, so operations sharing one task may interleave
//! without ever observing a half-written session.

use tokio::sync::{watch, OnceCell};
use tracing::{debug, info, instrument, warn};

use crate::api::CredentialService;
use crate::models::{AuthGrant, LoginRequest, ProfileUpdate, RegisterRequest, User};

use super::store::{StorageKey, TokenStore};
use super::tokens::{AccessToken, RefreshToken};
use super::AuthError;

/// Identity plus the credential pair that proves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    pub user: User,
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
}

impl From<AuthGrant> for Authenticated {
    fn from(grant: AuthGrant) -> Self {
        Self {
            user: grant.user,
            access_token: grant.token,
            refresh_token: grant.refresh_token,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Initializing,
    Authenticated,
    Anonymous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRequirement {
    Authenticated,
    Admin,
}

/// What a protected view should do with the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Hydration or an operation is still running; show a placeholder.
    Pending,
    Granted,
    LoginRequired,
    Forbidden,
}

/// Snapshot of the current authentication state.
///
/// User and tokens are held together, so a user is present exactly when
/// both tokens are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    auth: Option<Authenticated>,
    pending_operations: usize,
    is_initializing: bool,
    is_initialized: bool,
}

impl Session {
    pub fn user(&self) -> Option<&User> {
        self.auth.as_ref().map(|a| &a.user)
    }

    pub fn access_token(&self) -> Option<&AccessToken> {
        self.auth.as_ref().map(|a| &a.access_token)
    }

    pub fn refresh_token(&self) -> Option<&RefreshToken> {
        self.auth.as_ref().map(|a| &a.refresh_token)
    }

    pub fn authenticated(&self) -> Option<&Authenticated> {
        self.auth.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.pending_operations > 0
    }

    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    pub fn phase(&self) -> SessionPhase {
        if !self.is_initialized {
            if self.is_initializing {
                SessionPhase::Initializing
            } else {
                SessionPhase::Uninitialized
            }
        } else if self.auth.is_some() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Anonymous
        }
    }

    pub fn access(&self, requirement: AccessRequirement) -> AccessDecision {
        if !self.is_initialized || self.is_loading() {
            return AccessDecision::Pending;
        }
        match (self.user(), requirement) {
            (None, _) => AccessDecision::LoginRequired,
            (Some(user), AccessRequirement::Admin) if !user.is_admin() => AccessDecision::Forbidden,
            (Some(_), _) => AccessDecision::Granted,
        }
    }
}

/// Lowers the loading flag when the operation that raised it finishes.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<Session>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state
            .send_modify(|s| s.pending_operations = s.pending_operations.saturating_sub(1));
    }
}

pub struct SessionManager<S, T> {
    service: S,
    store: T,
    state: watch::Sender<Session>,
    init: OnceCell<()>,
}

impl<S, T> SessionManager<S, T>
where
    S: CredentialService,
    T: TokenStore,
{
    pub fn new(service: S, store: T) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            service,
            store,
            state,
            init: OnceCell::new(),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receiver notified on every session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn access_token(&self) -> Option<AccessToken> {
        self.state.borrow().access_token().cloned()
    }

    fn refresh_token(&self) -> Option<RefreshToken> {
        self.state.borrow().refresh_token().cloned()
    }

    // ===== Startup =====

    /// Rebuild the session from persisted tokens.
    ///
    /// Runs once per manager; later and concurrent calls wait for that run.
    /// Never fails: any problem ends in an anonymous session. Consumers must
    /// not treat the session as authoritative until this has returned.
    pub async fn initialize(&self) {
        self.init.get_or_init(|| self.hydrate()).await;
    }

    async fn hydrate(&self) {
        self.state.send_modify(|s| s.is_initializing = true);

        match self.read_persisted() {
            Ok(Some((access_token, refresh_token))) => {
                self.restore(access_token, refresh_token).await
            }
            Ok(None) => debug!("No persisted tokens, starting anonymous"),
            Err(e) => {
                warn!(error = %e, "Failed to read persisted tokens, starting anonymous");
                self.logout();
            }
        }

        self.state.send_modify(|s| {
            s.is_initializing = false;
            s.is_initialized = true;
        });
        info!(phase = ?self.state.borrow().phase(), "Session initialized");
    }

    /// Read the persisted pair. A lone token is useless and is removed.
    fn read_persisted(&self) -> anyhow::Result<Option<(AccessToken, RefreshToken)>> {
        let access = self.store.get(StorageKey::AccessToken)?;
        let refresh = self.store.get(StorageKey::RefreshToken)?;

        match (access, refresh) {
            (Some(access), Some(refresh)) => {
                Ok(Some((AccessToken::new(access), RefreshToken::new(refresh))))
            }
            (None, None) => Ok(None),
            _ => {
                warn!("Found only one persisted token, discarding it");
                self.clear_store();
                Ok(None)
            }
        }
    }

    async fn restore(&self, access_token: AccessToken, refresh_token: RefreshToken) {
        match self.service.fetch_profile(&access_token).await {
            Ok(user) => {
                info!(user_id = %user.id, "Restored session from persisted tokens");
                self.state.send_modify(|s| {
                    s.auth = Some(Authenticated {
                        user,
                        access_token,
                        refresh_token,
                    })
                });
            }
            Err(e) => {
                info!(error = %e, "Persisted access token rejected, attempting refresh");
                if let Err(e) = self.refresh_with(refresh_token).await {
                    info!(error = %e, "Could not restore session");
                }
            }
        }
    }

    // ===== Credential acquisition =====

    /// Authenticate and store the granted credentials.
    ///
    /// On failure the previous session is left untouched and the error is
    /// returned for the caller to display.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: &LoginRequest) -> Result<User, AuthError> {
        let _loading = self.begin_loading();
        let grant = match self.service.login(request).await {
            Ok(grant) => grant,
            Err(e) => {
                warn!(error = %e, "Login failed");
                return Err(e.into());
            }
        };
        let user = self.commit(grant)?;
        info!(user_id = %user.id, "Logged in");
        Ok(user)
    }

    /// Create an account; success logs the new account in.
    #[instrument(skip(self, request), fields(username = %request.username, email = %request.email))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<User, AuthError> {
        let _loading = self.begin_loading();
        let grant = match self.service.register(request).await {
            Ok(grant) => grant,
            Err(e) => {
                warn!(error = %e, "Registration failed");
                return Err(e.into());
            }
        };
        let user = self.commit(grant)?;
        info!(user_id = %user.id, "Registered and logged in");
        Ok(user)
    }

    /// Replace the credential pair using the current refresh token.
    ///
    /// A failed refresh means the refresh token can no longer be trusted,
    /// so the session is logged out before the error is returned.
    pub async fn refresh_access_token(&self) -> Result<(), AuthError> {
        let refresh_token = self.refresh_token().ok_or(AuthError::Unauthenticated)?;
        self.refresh_with(refresh_token).await
    }

    async fn refresh_with(&self, refresh_token: RefreshToken) -> Result<(), AuthError> {
        let _loading = self.begin_loading();

        let result = match self.service.refresh(&refresh_token).await {
            Ok(grant) => self.commit(grant).map(|_| ()),
            Err(e) => Err(e.into()),
        };

        match &result {
            Ok(()) => debug!("Access token refreshed"),
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                self.logout();
            }
        }
        result
    }

    /// Write the grant to the store, then publish it in one session update.
    ///
    /// If the store rejects either token both keys are removed and the
    /// in-memory session is not touched.
    fn commit(&self, grant: AuthGrant) -> Result<User, AuthError> {
        let written = self
            .store
            .set(StorageKey::AccessToken, grant.token.as_str())
            .and_then(|_| {
                self.store
                    .set(StorageKey::RefreshToken, grant.refresh_token.as_str())
            });

        if let Err(e) = written {
            warn!(error = %e, "Failed to persist tokens");
            self.clear_store();
            return Err(AuthError::Storage(format!("{:#}", e)));
        }

        let auth = Authenticated::from(grant);
        let user = auth.user.clone();
        self.state.send_modify(|s| s.auth = Some(auth));
        Ok(user)
    }

    // ===== Teardown =====

    /// Clear the session and the store. Never fails and is safe to repeat.
    pub fn logout(&self) {
        self.clear_store();
        if self.state.send_if_modified(|s| s.auth.take().is_some()) {
            info!("Logged out");
        } else {
            debug!("Logout with no active session");
        }
    }

    fn clear_store(&self) {
        for key in StorageKey::ALL {
            if let Err(e) = self.store.remove(key) {
                warn!(key = %key, error = %e, "Failed to remove persisted token");
            }
        }
    }

    // ===== Profile =====

    /// Merge fields into the in-memory identity. Local only: nothing is sent
    /// to the service and nothing is persisted. Returns the merged identity,
    /// or `None` when there is no session.
    pub fn update_profile(&self, update: ProfileUpdate) -> Option<User> {
        let mut merged = None;
        self.state.send_if_modified(|s| match s.auth.as_mut() {
            Some(auth) => {
                let before = auth.user.clone();
                auth.user.apply(update);
                merged = Some(auth.user.clone());
                auth.user != before
            }
            None => false,
        });
        merged
    }

    /// Change the account password. Tokens and identity are not modified.
    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<(), AuthError> {
        let access_token = self.access_token().ok_or(AuthError::Unauthenticated)?;
        let _loading = self.begin_loading();

        match self
            .service
            .change_password(&access_token, old_password, new_password)
            .await
        {
            Ok(()) => {
                info!("Password changed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Password change failed");
                Err(e.into())
            }
        }
    }

    fn begin_loading(&self) -> LoadingGuard<'_> {
        self.state.send_modify(|s| s.pending_operations += 1);
        LoadingGuard { state: &self.state }
    }
}
