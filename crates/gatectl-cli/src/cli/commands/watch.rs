//! `gatectl watch`: keeps the session warm until interrupted.

use std::sync::Arc;

use anyhow::{Result, bail};
use gatectl_core::interrupt;
use gatectl_core::keepalive::KeepAlive;
use gatectl_core::routes::Route;

use crate::cli::console::Console;

pub async fn run(console: &Console) -> Result<()> {
    console.open_page(Route::Dashboard.path()).await?;

    let session = &console.session;
    let interval = console.config.auth.keepalive_interval();
    let keepalive = KeepAlive::spawn(
        Arc::clone(session),
        session.subscribe_tokens(),
        interval,
        session.observer(),
    );

    let username = session
        .snapshot()
        .user
        .map(|user| user.username)
        .unwrap_or_default();
    eprintln!(
        "Keeping {username}'s session alive (checking every {}s). Press Ctrl+C to stop.",
        interval.as_secs()
    );

    let expired = tokio::select! {
        () = interrupt::wait_for_interrupt() => false,
        () = console.expiry.wait() => true,
    };
    keepalive.shutdown().await;

    if expired {
        session.expire();
        bail!("Session expired. Run `gatectl login` to sign in again.");
    }

    eprintln!("Stopped.");
    Ok(())
}
