//! Config command handlers.

use anyhow::{Context, Result};
use gatectl_core::config::{self, Config, paths};

pub fn path() {
    println!("{}", paths::config_path().display());
}

pub fn init() -> Result<()> {
    let config_path = paths::config_path();
    Config::init(&config_path)
        .with_context(|| format!("init config at {}", config_path.display()))?;

    println!("Created config at {}", config_path.display());
    println!(
        "  Point [api] base_url (or {}) at your gateway.",
        config::ENV_API_BASE_URL
    );
    Ok(())
}

pub fn generate() -> Result<()> {
    let toml = Config::generate().context("generate default config")?;
    print!("{toml}");
    Ok(())
}
