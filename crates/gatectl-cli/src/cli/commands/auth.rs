//! Auth command handlers.

use std::io::{self, Read};

use anyhow::{Context, Result, anyhow, bail};
use gatectl_core::auth::mask_token;
use gatectl_core::routes::Route;

use crate::cli::console::Console;
use crate::cli::prompt::{prompt_line, prompt_password};

pub async fn login(
    console: &Console,
    username: Option<String>,
    password_stdin: bool,
    force: bool,
) -> Result<()> {
    let route = console.open_page(Route::Login.path()).await?;
    let replacing = route != Route::Login;
    if replacing {
        let current = console
            .session
            .snapshot()
            .user
            .map(|user| user.username)
            .unwrap_or_default();
        if !force {
            println!("Already logged in as {current}. Use --force to sign in again.");
            return Ok(());
        }
        tracing::info!(username = %current, "replacing active session");
    }

    let username = match username {
        Some(username) => username,
        None if password_stdin => bail!("--password-stdin requires --username"),
        None => prompt_line("Username: ")?,
    };
    let password = if password_stdin {
        read_password_stdin()?
    } else {
        prompt_password("Password: ")?
    };

    // Revoke the old pair server-side before it is overwritten.
    if replacing {
        console.session.logout().await;
    }

    let user = console
        .session
        .login(&username, &password)
        .await
        .map_err(|e| anyhow!(e.login_message()))?;

    println!();
    if user.role.is_empty() {
        println!("✓ Logged in as {}", user.username);
    } else {
        println!("✓ Logged in as {} ({})", user.username, user.role);
    }
    println!("  Gateway: {}", console.session.api().base_url());
    println!(
        "  Credentials saved to: {}",
        console.credentials_path.display()
    );

    Ok(())
}

pub async fn logout(console: &Console) -> Result<()> {
    if console.session.snapshot().token.is_none() {
        println!("Not logged in (no credentials found).");
        return Ok(());
    }

    console.session.logout().await;

    println!("✓ Logged out");
    println!(
        "  Credentials removed from: {}",
        console.credentials_path.display()
    );
    Ok(())
}

pub async fn refresh(console: &Console) -> Result<()> {
    if console.session.snapshot().token.is_none() {
        bail!("Not logged in. Run `gatectl login` first.");
    }
    if !console.session.refresh_token_if_needed().await {
        bail!("Token refresh failed. Run `gatectl login` to sign in again.");
    }

    let token = console.session.snapshot().token.unwrap_or_default();
    println!("✓ Token refreshed (token: {})", mask_token(&token));
    Ok(())
}

fn read_password_stdin() -> Result<String> {
    let mut password = String::new();
    io::stdin()
        .read_to_string(&mut password)
        .context("read password from stdin")?;
    Ok(password.trim_end_matches(['\r', '\n']).to_string())
}
