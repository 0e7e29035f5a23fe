use crate::api::UserInfo;

/// Hooks the embedding shell provides to react to session transitions.
///
/// All methods default to no-ops. Calls happen after the state change is
/// visible and never while session locks are held.
pub trait SessionObserver: Send + Sync {
    fn on_authenticated(&self, _user: &UserInfo) {}

    /// Explicit logout or forced expiry.
    fn on_signed_out(&self) {}

    fn on_token_refreshed(&self) {}

    /// The keep-alive timer gave up on a dead refresh token.
    fn on_session_expired(&self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}
