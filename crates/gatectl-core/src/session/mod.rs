//! Session state machine.
//!
//! Owns `{user, token, loading}` for one signed-in account and is the only
//! writer of the credential store after construction. Phases run
//! `Uninitialized -> Validating -> {Authenticated, Unauthenticated}`, with
//! login, logout, refresh and expiry moving between the last two.
//!
//! Every user-initiated transition (login, logout, expire) bumps a generation
//! counter. Validity checks and refresh exchanges remember the generation they
//! started under and drop their result if it moved, so an explicit logout is
//! always the final word over background work that was already in flight.

mod observer;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

pub use observer::{NoopObserver, SessionObserver};

use crate::api::{ApiClient, ApiError, ApiResult, Envelope, UserInfo};
use crate::auth::{CredentialStore, Credentials, mask_token};
use crate::keepalive::TokenKeeper;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created, boot not started yet.
    Uninitialized,
    /// Boot is validating the persisted token.
    Validating,
    Authenticated,
    Unauthenticated,
}

/// Point-in-time copy of the session state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub user: Option<UserInfo>,
    pub token: Option<String>,
    pub is_loading: bool,
    pub phase: SessionPhase,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

#[derive(Debug)]
struct SessionState {
    user: Option<UserInfo>,
    token: Option<String>,
    loading: bool,
    boot_started: bool,
    generation: u64,
}

impl SessionState {
    fn phase(&self) -> SessionPhase {
        match (self.loading, self.boot_started, self.user.is_some()) {
            (true, false, _) => SessionPhase::Uninitialized,
            (true, true, _) => SessionPhase::Validating,
            (false, _, true) => SessionPhase::Authenticated,
            (false, _, false) => SessionPhase::Unauthenticated,
        }
    }
}

/// Outcome of the most recent refresh exchange.
#[derive(Debug, Default)]
struct RefreshGate {
    epoch: u64,
    succeeded: bool,
}

pub struct Session {
    api: ApiClient,
    store: Arc<dyn CredentialStore>,
    observer: Arc<dyn SessionObserver>,
    state: Mutex<SessionState>,
    tokens: watch::Sender<Option<String>>,
    refresh_gate: tokio::sync::Mutex<RefreshGate>,
    /// Mirrors `RefreshGate::epoch` so waiters can tell whether an exchange
    /// finished while they were queued.
    refresh_epoch: AtomicU64,
}

impl Session {
    /// Creates a session over `api`, adopting any persisted access token.
    ///
    /// The session starts loading; call [`Session::boot`] to resolve it.
    pub fn new(api: ApiClient) -> Self {
        let store = Arc::clone(api.store());
        let token = store.load().map(|creds| creds.access_token);
        let (tokens, _) = watch::channel(token.clone());

        Self {
            api,
            store,
            observer: Arc::new(NoopObserver),
            state: Mutex::new(SessionState {
                user: None,
                token,
                loading: true,
                boot_started: false,
                generation: 0,
            }),
            tokens,
            refresh_gate: tokio::sync::Mutex::new(RefreshGate::default()),
            refresh_epoch: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn observer(&self) -> Arc<dyn SessionObserver> {
        Arc::clone(&self.observer)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state();
        SessionSnapshot {
            user: state.user.clone(),
            token: state.token.clone(),
            is_loading: state.loading,
            phase: state.phase(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.state().phase()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().user.is_some()
    }

    /// Watch channel carrying the current access token.
    pub fn subscribe_tokens(&self) -> watch::Receiver<Option<String>> {
        self.tokens.subscribe()
    }

    /// Resolves the initial state from the persisted credentials.
    ///
    /// Validates the stored token; if that fails, tries a refresh; if that
    /// fails too, erases the credentials. Returns the resulting phase.
    pub async fn boot(&self) -> SessionPhase {
        let persisted = self.store.load();
        let generation = {
            let mut state = self.state();
            state.boot_started = true;
            state.token = persisted.as_ref().map(|creds| creds.access_token.clone());
            self.publish_token(&state);
            state.generation
        };

        if persisted.is_some() {
            self.revive_persisted(generation).await;
        } else {
            tracing::debug!("no persisted credentials");
        }

        let phase = {
            let mut state = self.state();
            state.loading = false;
            state.phase()
        };
        tracing::debug!(?phase, "session boot finished");
        phase
    }

    async fn revive_persisted(&self, generation: u64) {
        match self.api.user_info().await.and_then(Envelope::into_data) {
            Ok(user) => {
                if self.adopt_user(generation, user.clone()) {
                    tracing::info!(username = %user.username, "restored session");
                    self.observer.on_authenticated(&user);
                }
                return;
            }
            Err(err) => tracing::debug!(error = %err, "stored token rejected, trying refresh"),
        }

        if self.refresh_token_if_needed().await {
            return;
        }

        let cleared = {
            let mut state = self.state();
            if state.generation == generation {
                self.store.clear();
                state.token = None;
                state.user = None;
                self.publish_token(&state);
                true
            } else {
                false
            }
        };
        if cleared {
            tracing::info!("stored credentials could not be revived, cleared");
        }
    }

    /// Signs in and persists the returned token pair.
    ///
    /// # Errors
    /// Returns a `Validation` error for a blank username or password (no
    /// request is made), otherwise the API error. State is unchanged on error.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<UserInfo> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ApiError::validation("请输入用户名"));
        }
        if password.trim().is_empty() {
            return Err(ApiError::validation("请输入密码"));
        }

        let payload = self
            .api
            .login(username, password)
            .await
            .and_then(Envelope::into_data)
            .inspect_err(|err| tracing::error!(username, error = %err, "login failed"))?;

        {
            let mut state = self.state();
            state.generation += 1;
            self.store
                .save(&Credentials::new(&payload.token, &payload.refresh_token));
            state.token = Some(payload.token);
            state.user = Some(payload.user.clone());
            state.loading = false;
            self.publish_token(&state);
        }

        tracing::info!(username, "signed in");
        self.observer.on_authenticated(&payload.user);
        Ok(payload.user)
    }

    /// Signs out. The server call is best-effort; local state is always cleared.
    pub async fn logout(&self) {
        self.state().generation += 1;

        if self.store.load().is_some() {
            if let Err(err) = self.api.logout().await.and_then(Envelope::ack) {
                tracing::warn!(error = %err, "server-side logout failed, clearing local session anyway");
            }
        } else {
            tracing::debug!("no stored credentials, skipping server-side logout");
        }

        self.reset();
        tracing::info!("signed out");
        self.observer.on_signed_out();
    }

    /// Local-only sign-out for a session whose refresh token is dead.
    pub fn expire(&self) {
        self.reset();
        tracing::warn!("session expired, credentials cleared");
        self.observer.on_signed_out();
    }

    /// Replaces the user wholesale.
    pub fn update_user(&self, user: UserInfo) {
        self.state().user = Some(user);
    }

    /// Asks the server whether the current token is still good.
    ///
    /// Returns false without a request when no token is held. A positive
    /// answer refreshes the cached user.
    pub async fn check_token_validity(&self) -> bool {
        let (token, generation) = {
            let state = self.state();
            (state.token.clone(), state.generation)
        };
        let Some(token) = token else {
            return false;
        };

        match self.api.user_info().await.and_then(Envelope::into_data) {
            Ok(user) => {
                let adopted = self.adopt_user(generation, user);
                if !adopted {
                    tracing::debug!("validity result discarded, session changed meanwhile");
                }
                adopted
            }
            Err(err) => {
                tracing::debug!(token = %mask_token(&token), error = %err, "token validity check failed");
                false
            }
        }
    }

    /// Exchanges the persisted refresh token for a new pair.
    ///
    /// Only one exchange runs at a time; callers that queue behind a running
    /// exchange receive its outcome instead of starting another. Failures
    /// leave the stored credentials untouched.
    pub async fn refresh_token_if_needed(&self) -> bool {
        if self.store.load().is_none() {
            tracing::debug!("no refresh token persisted");
            return false;
        }

        let observed = self.refresh_epoch.load(Ordering::Acquire);
        let mut gate = self.refresh_gate.lock().await;
        if gate.epoch != observed {
            tracing::debug!("joined a refresh that finished while waiting");
            return gate.succeeded;
        }

        let succeeded = self.exchange_refresh_token().await;
        gate.epoch += 1;
        gate.succeeded = succeeded;
        self.refresh_epoch.store(gate.epoch, Ordering::Release);
        succeeded
    }

    async fn exchange_refresh_token(&self) -> bool {
        let Some(creds) = self.store.load() else {
            return false;
        };
        let generation = self.state().generation;

        let payload = match self
            .api
            .refresh_token(&creds.refresh_token)
            .await
            .and_then(Envelope::into_data)
        {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(error = %err, "token refresh failed");
                return false;
            }
        };

        let applied = {
            let mut state = self.state();
            if state.generation == generation {
                self.store
                    .save(&Credentials::new(&payload.token, &payload.refresh_token));
                state.token = Some(payload.token);
                state.user = Some(payload.user);
                self.publish_token(&state);
                true
            } else {
                false
            }
        };

        if applied {
            tracing::info!("access token refreshed");
            self.observer.on_token_refreshed();
        } else {
            tracing::debug!("refresh result discarded, session changed meanwhile");
        }
        applied
    }

    fn adopt_user(&self, generation: u64, user: UserInfo) -> bool {
        let mut state = self.state();
        if state.generation != generation {
            return false;
        }
        state.user = Some(user);
        true
    }

    fn reset(&self) {
        let mut state = self.state();
        state.generation += 1;
        self.store.clear();
        state.token = None;
        state.user = None;
        state.loading = false;
        self.publish_token(&state);
    }

    fn publish_token(&self, state: &SessionState) {
        let token = state.token.clone();
        self.tokens.send_if_modified(|current| {
            if *current == token {
                false
            } else {
                *current = token;
                true
            }
        });
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenKeeper for Session {
    fn check_token_validity(&self) -> impl Future<Output = bool> + Send {
        Session::check_token_validity(self)
    }

    fn refresh_token_if_needed(&self) -> impl Future<Output = bool> + Send {
        Session::refresh_token_if_needed(self)
    }
}
