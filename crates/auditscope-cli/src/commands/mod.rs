//! CLI commands and argument parsing.

pub mod export;
pub mod query;
pub mod tail;

use std::time::Duration;

use anyhow::{Context, Result};
use auditscope_client::{ClientAuth, ClientConfig};
use auditscope_core::{
    ActionFilter, AuditLogEntry, CustomRange, DatePreset, DateRangeResolver, FilterState,
    StatusFilter, DEFAULT_PAGE_SIZE,
};
use chrono::{FixedOffset, NaiveDate};
use clap::{Args, Parser, Subcommand};

/// auditscope - Browse, export and tail audit logs
#[derive(Parser)]
#[command(name = "auditscope")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch one page of audit logs
    Query(query::QueryArgs),

    /// Export audit logs by id or by filter
    Export(export::ExportArgs),

    /// Follow new audit logs as they happen
    Tail(tail::TailArgs),

    /// Print version information
    Version,
}

/// Connection to the audit log service.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Base URL of the audit log service (e.g., `<https://audit.example.com/api>`)
    #[arg(short, long, env = "AUDITSCOPE_URL")]
    pub url: String,

    /// Bearer token for authentication
    #[arg(long, env = "AUDITSCOPE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Username for basic authentication
    #[arg(long, env = "AUDITSCOPE_USERNAME")]
    pub username: Option<String>,

    /// Password for basic authentication
    #[arg(long, env = "AUDITSCOPE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

impl ConnectionArgs {
    /// Builds the client configuration.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let config = ClientConfig::new(&self.url)
            .with_auth(determine_auth(self)?)
            .with_timeout(Duration::from_secs(self.timeout));
        config.validate().context("Invalid connection settings")?;
        Ok(config)
    }
}

/// Determines the authentication method from CLI arguments.
fn determine_auth(args: &ConnectionArgs) -> Result<ClientAuth> {
    if let Some(ref token) = args.token {
        return Ok(ClientAuth::bearer(token));
    }

    if let (Some(ref username), Some(ref password)) = (&args.username, &args.password) {
        return Ok(ClientAuth::basic(username, password));
    }

    if args.username.is_some() || args.password.is_some() {
        anyhow::bail!("Both --username and --password are required for basic authentication");
    }

    Ok(ClientAuth::None)
}

/// Query filter flags shared by every command.
#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// Only entries with this action (e.g., LOGIN)
    #[arg(short, long)]
    pub action: Option<String>,

    /// Only entries with this status (success, failed)
    #[arg(short, long)]
    pub status: Option<String>,

    /// Case-insensitive text to search for
    #[arg(short = 'q', long)]
    pub search: Option<String>,

    /// Date preset (all-time, today, yesterday, last-7-days, ..., custom)
    #[arg(short, long, default_value = "last-7-days")]
    pub date: String,

    /// First day of a custom range (YYYY-MM-DD)
    #[arg(long, requires = "to")]
    pub from: Option<NaiveDate>,

    /// Last day of a custom range (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    pub to: Option<NaiveDate>,

    /// Offset from UTC in minutes for calendar presets
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub utc_offset: i32,

    /// Entries per page
    #[arg(long, env = "AUDITSCOPE_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,
}

impl FilterArgs {
    /// Builds the filter state for `page`.
    ///
    /// Passing `--from`/`--to` implies the custom date preset.
    pub fn to_filter_state(&self, page: u32) -> Result<FilterState> {
        let mut state = FilterState::new(self.page_size).with_page(page);

        if let Some(ref action) = self.action {
            state = state.with_action(action.parse::<ActionFilter>()?);
        }
        if let Some(ref status) = self.status {
            state = state.with_status(status.parse::<StatusFilter>()?);
        }
        if let Some(ref search) = self.search {
            state = state.with_search(search.as_str());
        }

        match (self.from, self.to) {
            (Some(start), Some(end)) => {
                state = state.with_custom_range(CustomRange::new(start, end)?);
            }
            _ => {
                let preset = self.date.parse::<DatePreset>()?;
                if preset == DatePreset::Custom {
                    anyhow::bail!("The custom date preset requires --from and --to");
                }
                state = state.with_date(preset);
            }
        }

        state.validate().context("Invalid filter")?;
        Ok(state)
    }

    /// Returns the offset used for calendar presets.
    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset * 60)
            .with_context(|| format!("UTC offset out of range: {} minutes", self.utc_offset))
    }

    /// Returns the date range resolver for the configured offset.
    pub fn resolver(&self) -> Result<DateRangeResolver> {
        Ok(DateRangeResolver::new(self.offset()?))
    }
}

/// Formats one entry as a table row.
pub fn format_row(entry: &AuditLogEntry) -> String {
    format!(
        "{:<20} {:<8} {:<18} {:<24} {:<15} {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        entry.status.to_string(),
        entry.action.to_string(),
        entry.actor.user_name,
        entry.ip_address.as_deref().unwrap_or("-"),
        entry.description
    )
}

/// Column headers matching [`format_row`].
pub fn header_row() -> String {
    format!(
        "{:<20} {:<8} {:<18} {:<24} {:<15} {}",
        "TIMESTAMP", "STATUS", "ACTION", "ACTOR", "IP", "DESCRIPTION"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditscope_core::EntryStatus;

    fn connection() -> ConnectionArgs {
        ConnectionArgs {
            url: "https://audit.example.com/api".to_string(),
            token: None,
            username: None,
            password: None,
            timeout: 30,
        }
    }

    fn filter() -> FilterArgs {
        FilterArgs {
            action: None,
            status: None,
            search: None,
            date: "last-7-days".to_string(),
            from: None,
            to: None,
            utc_offset: 0,
            page_size: 10,
        }
    }

    #[test]
    fn test_determine_auth_none() {
        let auth = determine_auth(&connection()).unwrap();
        assert!(matches!(auth, ClientAuth::None));
    }

    #[test]
    fn test_determine_auth_bearer() {
        let args = ConnectionArgs {
            token: Some("test-token".to_string()),
            ..connection()
        };

        match determine_auth(&args).unwrap() {
            ClientAuth::Bearer { token } => assert_eq!(token, "test-token"),
            _ => panic!("Expected Bearer auth"),
        }
    }

    #[test]
    fn test_determine_auth_incomplete_basic() {
        let args = ConnectionArgs {
            username: Some("user".to_string()),
            ..connection()
        };

        assert!(determine_auth(&args).is_err());
    }

    #[test]
    fn test_client_config_rejects_bad_url() {
        let args = ConnectionArgs {
            url: "ftp://audit.example.com".to_string(),
            ..connection()
        };

        assert!(args.client_config().is_err());
    }

    #[test]
    fn test_filter_state_from_flags() {
        let args = FilterArgs {
            action: Some("login".to_string()),
            status: Some("failed".to_string()),
            search: Some("admin".to_string()),
            date: "today".to_string(),
            ..filter()
        };

        let state = args.to_filter_state(3).unwrap();
        assert_eq!(state.page, 3);
        assert_eq!(state.status, StatusFilter::Only(EntryStatus::Failed));
        assert_eq!(state.action.action().map(ToString::to_string).as_deref(), Some("LOGIN"));
        assert_eq!(state.search, "admin");
        assert_eq!(state.date, DatePreset::Today);
    }

    #[test]
    fn test_custom_range_from_flags() {
        let args = FilterArgs {
            from: NaiveDate::from_ymd_opt(2024, 3, 1),
            to: NaiveDate::from_ymd_opt(2024, 3, 10),
            ..filter()
        };

        let state = args.to_filter_state(1).unwrap();
        assert_eq!(state.date, DatePreset::Custom);
        assert!(state.custom_range.is_some());
    }

    #[test]
    fn test_inverted_custom_range_rejected() {
        let args = FilterArgs {
            from: NaiveDate::from_ymd_opt(2024, 3, 10),
            to: NaiveDate::from_ymd_opt(2024, 3, 1),
            ..filter()
        };

        assert!(args.to_filter_state(1).is_err());
    }

    #[test]
    fn test_custom_preset_without_dates_rejected() {
        let args = FilterArgs {
            date: "custom".to_string(),
            ..filter()
        };

        assert!(args.to_filter_state(1).is_err());
    }

    #[test]
    fn test_format_row_aligns_with_header() {
        let entry = AuditLogEntry {
            id: "1".to_string(),
            timestamp: chrono::DateTime::from_timestamp(1_710_504_000, 0).unwrap(),
            actor: auditscope_core::Actor {
                user_id: "u1".to_string(),
                user_name: "Ada Lovelace".to_string(),
                user_email: "ada@example.com".to_string(),
                initials: "AL".to_string(),
            },
            action: auditscope_core::AuditAction::new("login"),
            action_category_color: None,
            ip_address: None,
            description: "User signed in".to_string(),
            status: EntryStatus::Failed,
            user_agent: None,
            metadata: std::collections::BTreeMap::new(),
        };

        let row = format_row(&entry);
        assert!(row.starts_with("2024-03-15 12:00:00  Failed   LOGIN"));
        assert!(row.ends_with("-               User signed in"));
        assert_eq!(row.find("Ada"), header_row().find("ACTOR"));
    }

    #[test]
    fn test_offset_out_of_range() {
        let args = FilterArgs {
            utc_offset: 24 * 60,
            ..filter()
        };

        assert!(args.resolver().is_err());
        assert!(filter().resolver().is_ok());
    }
}
