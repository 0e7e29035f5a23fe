//! Plugin catalogue commands, guarded by the `/plugins` page.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use gatectl_core::api::{PluginInfo, PluginService, plugin_error_message};
use gatectl_core::routes::Route;

use crate::cli::console::Console;

async fn service(console: &Console) -> Result<PluginService> {
    console.open_page(Route::Plugins.path()).await?;
    Ok(PluginService::new(Arc::clone(&console.session)))
}

pub async fn list(console: &Console, json: bool) -> Result<()> {
    let list = service(console)
        .await?
        .list()
        .await
        .map_err(|e| anyhow!(plugin_error_message(&e)))?;

    if json {
        let out = serde_json::to_string_pretty(&list).context("serialize plugin list")?;
        println!("{out}");
        return Ok(());
    }

    if list.plugins.is_empty() {
        println!("No plugins found.");
        return Ok(());
    }

    println!(
        "{:<24} {:<10} {:>8}  {:<8} {:<12} {}",
        "ID", "VERSION", "PRIORITY", "ENABLED", "CATEGORY", "SCOPE"
    );
    for plugin in &list.plugins {
        println!(
            "{:<24} {:<10} {:>8}  {:<8} {:<12} {}",
            plugin.id,
            plugin.version,
            plugin.priority,
            if plugin.enabled { "yes" } else { "no" },
            plugin.category,
            plugin.scope
        );
    }
    println!();
    println!("{} plugin(s)", list.total);

    Ok(())
}

pub async fn show(console: &Console, id: &str, json: bool) -> Result<()> {
    let plugin = service(console)
        .await?
        .get(id)
        .await
        .map_err(|e| anyhow!(plugin_error_message(&e)))?;

    if json {
        let out = serde_json::to_string_pretty(&plugin).context("serialize plugin")?;
        println!("{out}");
    } else {
        print_plugin(&plugin);
    }
    Ok(())
}

fn print_plugin(plugin: &PluginInfo) {
    println!("{} ({})", plugin.name, plugin.id);
    println!("  Version:  {}", plugin.version);
    println!("  Category: {}", plugin.category);
    println!("  Type:     {}", plugin.plugin_type);
    println!("  Scope:    {}", plugin.scope);
    println!("  Priority: {}", plugin.priority);
    println!("  Enabled:  {}", if plugin.enabled { "yes" } else { "no" });
    if !plugin.description.is_empty() {
        println!("  {}", plugin.description);
    }
    if !plugin.created_at.is_empty() {
        println!("  Created:  {}", plugin.created_at);
    }
    if !plugin.updated_at.is_empty() {
        println!("  Updated:  {}", plugin.updated_at);
    }
}
