//! query-router - read/write routing over SQLite databases
//!
//! This is the composition root: it opens the configured connections,
//! registers them with a router and runs one statement from the command
//! line.

use anyhow::Context;
use query_router::adapters::outbound::SqliteConnection;
use query_router::{load_config, ConnectionRouter, ParamSet, Role};
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;

const USAGE: &str = "usage: query-router <sql> [json-params]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let query = args.next().context(USAGE)?;
    let params = match args.next() {
        Some(raw) => serde_json::from_str(&raw).context("params must be valid JSON")?,
        None => serde_json::json!({}),
    };

    // ===== COMPOSITION ROOT =====
    let mut router = ConnectionRouter::new(cfg.safe_mode);
    for entry in &cfg.connections {
        let connection = match entry.role {
            Role::Primary => SqliteConnection::open(&entry.path),
            Role::Secondary => SqliteConnection::open_read_only(&entry.path),
        }
        .with_context(|| format!("failed to open {} connection {}", entry.role, entry.path))?;

        router.add_connection(Arc::new(connection), entry.role, entry.weight)?;
    }

    tracing::info!(
        "starting query-router safe_mode={} connections={:?}",
        cfg.safe_mode,
        router.describe_connections().ids()
    );

    match ParamSet::try_from(params)? {
        ParamSet::Single(params) if is_read_statement(&query) => {
            let rows = router.fetch_all(&query, Some(params), false).await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        ParamSet::Single(params) => router.execute(&query, Some(params)).await?,
        ParamSet::Batch(batch) => router.execute_many(&query, Some(batch)).await?,
    }

    Ok(())
}

/// Statements that return rows go through the read path.
fn is_read_statement(query: &str) -> bool {
    let keyword = query
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase();
    matches!(keyword.as_str(), "SELECT" | "WITH" | "VALUES")
}
