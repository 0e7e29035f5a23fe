//! Background keep-alive for the session token.
//!
//! A supervisor task follows the session's token channel. While a token is
//! held it keeps exactly one periodic timer armed; each tick validates the
//! token and falls back to a refresh. A failed refresh stops the timer and
//! reports expiry instead of retrying against a dead refresh token.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::auth::mask_token;
use crate::session::SessionObserver;

/// What the keep-alive timer needs from a session.
pub trait TokenKeeper: Send + Sync + 'static {
    fn check_token_validity(&self) -> impl Future<Output = bool> + Send;
    fn refresh_token_if_needed(&self) -> impl Future<Output = bool> + Send;
}

/// Handle to the running supervisor. Dropping it stops all timers.
pub struct KeepAlive {
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl KeepAlive {
    /// Starts supervising `tokens`, ticking every `interval` while a token is held.
    pub fn spawn<K: TokenKeeper>(
        keeper: Arc<K>,
        tokens: watch::Receiver<Option<String>>,
        interval: Duration,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(supervise(
            keeper,
            tokens,
            interval,
            observer,
            shutdown.clone(),
        ));

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Stops the supervisor and waits for it to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "keep-alive supervisor ended abnormally");
        }
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn supervise<K: TokenKeeper>(
    keeper: Arc<K>,
    mut tokens: watch::Receiver<Option<String>>,
    interval: Duration,
    observer: Arc<dyn SessionObserver>,
    shutdown: CancellationToken,
) {
    let mut timer: Option<RefreshTimer> = None;
    let mut armed_for: Option<String> = None;

    loop {
        let current = tokens.borrow_and_update().clone();
        if current != armed_for {
            if let Some(previous) = timer.take() {
                previous.cancel();
            }
            match &current {
                Some(token) => {
                    tracing::debug!(token = %mask_token(token), "arming keep-alive timer");
                    timer = Some(RefreshTimer::arm(
                        Arc::clone(&keeper),
                        interval,
                        Arc::clone(&observer),
                    ));
                }
                None => tracing::debug!("token cleared, keep-alive timer cancelled"),
            }
            armed_for = current;
        }

        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            changed = tokens.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(timer) = timer.take() {
        timer.cancel();
    }
}

struct RefreshTimer {
    cancel: CancellationToken,
}

impl RefreshTimer {
    fn arm<K: TokenKeeper>(
        keeper: Arc<K>,
        period: Duration,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                if keeper.check_token_validity().await {
                    continue;
                }
                if token.is_cancelled() {
                    break;
                }

                tracing::debug!("token no longer valid, attempting refresh");
                if keeper.refresh_token_if_needed().await {
                    continue;
                }

                tracing::warn!("token refresh failed, stopping keep-alive timer");
                if !token.is_cancelled() {
                    observer.on_session_expired();
                }
                break;
            }
        });

        Self { cancel }
    }

    fn cancel(self) {
        self.cancel.cancel();
    }
}
