//! Manual smoke test for the GitHub record source.
//!
//! Exercises the three calls the scan makes against the real API: the quota
//! read, one listing page, and one detail fetch. Nothing is written to disk.
//!
//! # Usage
//!
//! 1. Set `GITHUB_TOKEN` to any personal access token (no scopes needed; the
//!    users endpoints are public).
//!
//! 2. Optionally set `SMOKE_SINCE` to the id to list from (default 0).
//!
//! 3. Run: `cargo run --example github_smoke`

use std::env;

use full_scan::github::{TokenConnector, TokenSource};
use full_scan::source::{SourceClient, SourceConnector};
use full_scan::types::RecordId;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,full_scan=debug".into()),
        )
        .init();

    let token = env::var("GITHUB_TOKEN")
        .map_err(|_| anyhow::anyhow!("GITHUB_TOKEN environment variable not set"))?;
    let since = env::var("SMOKE_SINCE")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(RecordId)
        .unwrap_or(RecordId::MIN);

    let client = TokenConnector::new(TokenSource::Static(token))
        .connect()
        .await?;

    println!("\n=== GitHub Source Smoke Test ===\n");

    let remaining = client.quota_remaining().await?;
    println!("Quota remaining: {}", remaining);

    let page = client.list_records_since(since).await?;
    println!("Listed {} users after id {}", page.len(), since);
    if let (Some(first), Some(last)) = (page.first(), page.last()) {
        println!("  first: {} ({})", first.id, first.identifier);
        println!("  last:  {} ({})", last.id, last.identifier);
    }

    let Some(first) = page.first() else {
        println!("\nEmpty page; nothing to refresh.");
        return Ok(());
    };

    let detail = client.refresh_detail(first.id).await?;
    println!("Detail for {}: {}", detail.id, detail.identifier);

    let after = client.quota_remaining().await?;
    println!(
        "\nQuota remaining after smoke test: {} (used {})",
        after,
        remaining.saturating_sub(after)
    );
    Ok(())
}
