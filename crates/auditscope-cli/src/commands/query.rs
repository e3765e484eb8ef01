//! Query command implementation.
//!
//! Fetches a single page of audit logs and prints it.

use anyhow::{Context, Result};
use auditscope_client::{HttpAuditClient, QueryEndpoint, QueryPage, QueryRequest};
use chrono::Utc;
use clap::Args;
use serde::Serialize;
use tracing::info;

use auditscope_core::AuditLogEntry;

use super::{format_row, header_row, ConnectionArgs, FilterArgs};

/// Arguments for the query command.
#[derive(Args, Debug)]
pub struct QueryArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Page to fetch (1-based)
    #[arg(short, long, default_value = "1")]
    pub page: u32,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// JSON output of the query command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryOutput<'a> {
    page: u32,
    page_size: u32,
    total: u64,
    page_count: u64,
    entries: &'a [AuditLogEntry],
}

/// Runs the query command.
///
/// # Errors
///
/// Returns an error if:
/// - The filter flags are invalid
/// - The audit log service cannot be reached or rejects the query
pub async fn run(args: &QueryArgs) -> Result<()> {
    let state = args.filter.to_filter_state(args.page)?;
    let interval = state
        .resolve_interval(&args.filter.resolver()?, Utc::now())
        .context("Failed to resolve date range")?;
    let request = QueryRequest::from_filter(&state, interval);

    info!(
        url = %args.connection.url,
        page = request.page,
        page_size = request.page_size,
        "Querying audit logs"
    );

    let client = HttpAuditClient::new(args.connection.client_config()?)
        .context("Failed to create audit log client")?;
    let page = client
        .query(request)
        .await
        .context("Failed to query audit logs")?;

    if args.json {
        print_json(&page, args.page, state.page_size)?;
    } else {
        print_table(&page, args.page);
    }

    Ok(())
}

fn print_table(page: &QueryPage, page_number: u32) {
    if page.entries.is_empty() {
        println!("No audit logs found.");
        return;
    }

    println!("{}", header_row());
    for entry in &page.entries {
        println!("{}", format_row(entry));
    }
    println!();
    println!(
        "Page {} of {} ({} entries)",
        page_number,
        page.page_count.max(1),
        page.total
    );
}

fn print_json(page: &QueryPage, page_number: u32, page_size: u32) -> Result<()> {
    let output = QueryOutput {
        page: page_number,
        page_size,
        total: page.total,
        page_count: page.page_count,
        entries: &page.entries,
    };
    let json = serde_json::to_string_pretty(&output)?;
    println!("{json}");
    Ok(())
}
