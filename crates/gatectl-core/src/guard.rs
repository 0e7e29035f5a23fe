//! Navigation guard.
//!
//! [`decide`] is the pure admission rule. [`RouteGuard`] wraps it with the
//! settle delay and the debounced validity check a mounted guard performs
//! before deciding.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::AuthConfig;
use crate::routes::Route;
use crate::session::Session;

/// What to do with a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session not resolved yet; show a spinner.
    Loading,
    Render(Route),
    Redirect { to: Route, from: Option<Route> },
    NotFound,
}

/// Admission rule for `route` given the session's state.
pub fn decide(is_authenticated: bool, is_loading: bool, route: Route) -> GuardDecision {
    if route == Route::NotFound {
        return GuardDecision::NotFound;
    }
    if is_loading {
        return GuardDecision::Loading;
    }

    match (route.requires_auth(), is_authenticated) {
        (false, true) => GuardDecision::Redirect {
            to: Route::Dashboard,
            from: None,
        },
        (false, false) => GuardDecision::Render(route),
        (true, false) => GuardDecision::Redirect {
            to: Route::Login,
            from: Some(route),
        },
        (true, true) if route == Route::Root => GuardDecision::Redirect {
            to: Route::Dashboard,
            from: None,
        },
        (true, true) => GuardDecision::Render(route),
    }
}

/// Where to go after a successful login.
pub fn return_path(from: Option<Route>) -> Route {
    match from {
        Some(route) if route.requires_auth() && route != Route::Root => route,
        _ => Route::Dashboard,
    }
}

/// A mounted guard. Each [`RouteGuard::enter`] is one render of the guarded
/// page.
pub struct RouteGuard {
    session: Arc<Session>,
    debounce: Duration,
    settle: Duration,
    last_validation: Mutex<Option<Instant>>,
    unmounted: CancellationToken,
}

impl RouteGuard {
    pub fn new(session: Arc<Session>, debounce: Duration, settle: Duration) -> Self {
        Self {
            session,
            debounce,
            settle,
            last_validation: Mutex::new(None),
            unmounted: CancellationToken::new(),
        }
    }

    pub fn from_config(session: Arc<Session>, auth: &AuthConfig) -> Self {
        Self::new(session, auth.guard_debounce(), auth.guard_settle())
    }

    /// Waits out the settle delay, validates if due, then decides.
    ///
    /// Returns None if the guard was unmounted before a decision was reached.
    pub async fn enter(&self, path: &str) -> Option<GuardDecision> {
        let route = Route::from_path(path);

        tokio::select! {
            biased;
            () = self.unmounted.cancelled() => return None,
            () = tokio::time::sleep(self.settle) => {}
        }

        if route.requires_auth() {
            self.validate_if_due().await;
        }
        if self.unmounted.is_cancelled() {
            return None;
        }

        let snapshot = self.session.snapshot();
        let decision = decide(snapshot.is_authenticated(), snapshot.is_loading, route);
        tracing::debug!(%route, ?decision, "guard decision");
        Some(decision)
    }

    /// Cancels any pending settle delay.
    pub fn unmount(&self) {
        self.unmounted.cancel();
    }

    async fn validate_if_due(&self) {
        {
            let mut last = self
                .last_validation
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let now = Instant::now();
            if let Some(previous) = *last
                && now.duration_since(previous) < self.debounce
            {
                tracing::debug!("validity check debounced");
                return;
            }

            let snapshot = self.session.snapshot();
            if snapshot.token.is_none() || snapshot.is_authenticated() {
                return;
            }
            *last = Some(now);
        }

        self.session.check_token_validity().await;
    }
}

impl Drop for RouteGuard {
    fn drop(&mut self) {
        self.unmounted.cancel();
    }
}
