//! Export command implementation.
//!
//! Exports audit logs either by id or by filter and writes the payload to
//! disk.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use auditscope_client::{ExportFormat, HttpAuditClient};
use auditscope_core::SystemClock;
use auditscope_viewport::{ExportCoordinator, ExportFile, ExportOptions, ViewportJournal};
use clap::Args;
use tracing::info;

use super::{ConnectionArgs, FilterArgs};

/// Arguments for the export command.
#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Entry ids to export (comma separated); exports by filter when absent
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<String>,

    /// Output format (csv, json, xml, pdf)
    #[arg(short, long, default_value = "csv")]
    pub format: ExportFormat,

    /// Include entry metadata in the export
    #[arg(long)]
    pub include_metadata: bool,

    /// Output path (defaults to the suggested filename)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Runs the export command.
///
/// # Errors
///
/// Returns an error if:
/// - The filter flags are invalid
/// - The export endpoint fails
/// - The output file cannot be written
pub async fn run(args: &ExportArgs) -> Result<()> {
    let resolver = args.filter.resolver()?;
    let client = HttpAuditClient::new(args.connection.client_config()?)
        .context("Failed to create audit log client")?;
    let exporter = ExportCoordinator::new(
        Arc::new(client),
        resolver,
        Arc::new(SystemClock),
        ViewportJournal::default(),
    );
    let options = ExportOptions {
        include_metadata: args.include_metadata,
    };

    let file = if args.ids.is_empty() {
        let state = args.filter.to_filter_state(1)?;
        info!(format = %args.format, "Exporting audit logs by filter");
        exporter
            .export_by_filter(&state, args.format, options)
            .await
            .context("Failed to export audit logs")?
    } else {
        let ids: BTreeSet<String> = args.ids.iter().map(|id| id.trim().to_string()).collect();
        info!(format = %args.format, count = ids.len(), "Exporting selected audit logs");
        exporter
            .export_selected(&ids, args.format, options)
            .await
            .context("Failed to export audit logs")?
    };

    let path = output_path(args.output.as_deref(), &file);
    std::fs::write(&path, &file.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "Exported {} bytes ({}) to {}",
        file.bytes.len(),
        file.content_type,
        path.display()
    );
    Ok(())
}

/// Returns where to write `file`.
fn output_path(output: Option<&Path>, file: &ExportFile) -> PathBuf {
    output.map_or_else(|| PathBuf::from(&file.filename), Path::to_path_buf)
}
