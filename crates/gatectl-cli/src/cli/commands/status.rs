//! `gatectl status`: the dashboard page.

use anyhow::Result;
use gatectl_core::auth::mask_token;
use gatectl_core::routes::Route;

use crate::cli::console::Console;

pub async fn run(console: &Console) -> Result<()> {
    console.open_page(Route::Dashboard.path()).await?;

    let snapshot = console.session.snapshot();
    let user = snapshot.user.unwrap_or_default();
    let app = &console.config.app;

    println!("{} v{}", app.name, app.version);
    println!("  Gateway:  {}", console.session.api().base_url());
    println!("  User:     {}", user.username);
    if !user.role.is_empty() {
        println!("  Role:     {}", user.role);
    }
    if !user.email.is_empty() {
        println!("  Email:    {}", user.email);
    }
    if let Some(token) = snapshot.token.as_deref() {
        println!("  Token:    {}", mask_token(token));
    }

    let sections: Vec<&str> = Route::MENU.iter().map(|route| route.title()).collect();
    println!("  Sections: {}", sections.join(" · "));

    Ok(())
}
