//! Composition root for session-backed commands.
//!
//! Plays the part the provider tree plays in the browser console: one
//! credential store, one API client and one session, shared by whichever
//! "page" the command opens.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use gatectl_core::api::ApiClient;
use gatectl_core::auth::{CredentialStore, FileCredentialStore};
use gatectl_core::config::Config;
use gatectl_core::guard::{GuardDecision, RouteGuard};
use gatectl_core::interrupt::InterruptedError;
use gatectl_core::routes::Route;
use gatectl_core::session::{Session, SessionObserver};
use tokio::sync::Notify;

/// Wakes `gatectl watch` when the keep-alive timer gives up.
#[derive(Default)]
pub struct ExpiryNotice {
    expired: Notify,
}

impl ExpiryNotice {
    pub async fn wait(&self) {
        self.expired.notified().await;
    }
}

impl SessionObserver for ExpiryNotice {
    fn on_token_refreshed(&self) {
        tracing::debug!("session kept alive by refresh");
    }

    fn on_session_expired(&self) {
        self.expired.notify_one();
    }
}

pub struct Console {
    pub config: Config,
    pub session: Arc<Session>,
    pub credentials_path: PathBuf,
    pub expiry: Arc<ExpiryNotice>,
}

impl Console {
    pub fn open(config: Config) -> Result<Self> {
        let store = FileCredentialStore::at_default_location();
        let credentials_path = store.path().to_path_buf();
        let store: Arc<dyn CredentialStore> = Arc::new(store);

        let api = ApiClient::from_config(&config, store)?;
        tracing::debug!(base_url = api.base_url(), "opening session");

        let expiry = Arc::new(ExpiryNotice::default());
        let session =
            Session::new(api).with_observer(Arc::clone(&expiry) as Arc<dyn SessionObserver>);

        Ok(Self {
            config,
            session: Arc::new(session),
            credentials_path,
            expiry,
        })
    }

    /// Boots the session and runs the guard for `path`.
    ///
    /// Returns the route to render, or an error explaining why the page
    /// cannot be shown.
    pub async fn open_page(&self, path: &str) -> Result<Route> {
        self.session.boot().await;

        let guard = RouteGuard::from_config(Arc::clone(&self.session), &self.config.auth);
        match guard.enter(path).await {
            Some(GuardDecision::Render(route) | GuardDecision::Redirect { to: route, .. })
                if route.requires_auth() =>
            {
                Ok(route)
            }
            Some(GuardDecision::Redirect { from, .. }) => {
                let wanted = from.map_or(path, |route| route.path());
                bail!("Not logged in (cannot open {wanted}). Run `gatectl login` first.")
            }
            Some(GuardDecision::Render(route)) => Ok(route),
            Some(GuardDecision::NotFound) => bail!("Unknown page: {path}"),
            Some(GuardDecision::Loading) => bail!("Session is still loading"),
            None => Err(InterruptedError.into()),
        }
    }
}
