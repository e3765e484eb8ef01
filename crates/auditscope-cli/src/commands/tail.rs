//! Tail command implementation.
//!
//! Runs a viewport with live updates enabled and prints every entry that
//! is newly prepended to page 1 until interrupted.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use auditscope_client::{HttpAuditClient, SseEventTransport};
use auditscope_viewport::{
    PageSnapshot, Viewport, ViewportConfig, ViewportServices, ViewportState, ViewportStatus,
};
use clap::Args;
use tracing::{info, warn};

use super::{format_row, header_row, ConnectionArgs, FilterArgs};

/// Arguments for the tail command.
#[derive(Args, Debug)]
pub struct TailArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Do not print the initial page before following
    #[arg(long)]
    pub no_history: bool,
}

/// Runs the tail command.
///
/// # Errors
///
/// Returns an error if:
/// - The filter flags or connection settings are invalid
/// - The viewport stops unexpectedly
pub async fn run(args: &TailArgs) -> Result<()> {
    let client_config = args.connection.client_config()?;
    let client = Arc::new(
        HttpAuditClient::new(client_config.clone()).context("Failed to create audit log client")?,
    );
    let events = Arc::new(
        SseEventTransport::new(client_config).context("Failed to create live event transport")?,
    );

    let config = ViewportConfig::builder()
        .page_size(args.filter.page_size)
        .utc_offset(args.filter.offset()?)
        .initial_filter(args.filter.to_filter_state(1)?)
        .build();
    let viewport = Viewport::spawn(config, ViewportServices::new(client.clone(), client, events))
        .context("Failed to start viewport")?;

    let initial = viewport
        .wait_for(|state| state.status != ViewportStatus::Loading)
        .await
        .context("Viewport stopped before the first page loaded")?;
    if let Some(ref error) = initial.last_error {
        warn!(%error, "Initial page failed to load, following live entries only");
    }

    let mut seen = PrintedEntries::default();
    println!("{}", header_row());
    for line in seen.new_lines(&initial.snapshot) {
        if !args.no_history {
            println!("{line}");
        }
    }

    viewport.set_live_updates(true).await?;
    info!(url = %args.connection.url, "Following audit logs, press Ctrl-C to stop");

    let mut updates = viewport.subscribe_state();
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    anyhow::bail!("Viewport stopped unexpectedly");
                }
                let state: ViewportState = updates.borrow_and_update().clone();
                for line in seen.new_lines(&state.snapshot) {
                    println!("{line}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    viewport.shutdown().await?;
    Ok(())
}

/// Tracks which entries were already printed.
#[derive(Debug, Default)]
struct PrintedEntries {
    ids: HashSet<String>,
}

impl PrintedEntries {
    /// Returns rows for entries not printed before, oldest first.
    fn new_lines(&mut self, snapshot: &PageSnapshot) -> Vec<String> {
        let mut lines: Vec<String> = snapshot
            .entries
            .iter()
            .filter(|entry| self.ids.insert(entry.id.clone()))
            .map(format_row)
            .collect();
        lines.reverse();
        lines
    }
}
