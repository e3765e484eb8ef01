//! Audit log entry fixtures.

use std::collections::BTreeMap;

use auditscope_client::QueryPage;
use auditscope_core::{derive_initials, Actor, AuditAction, AuditLogEntry, EntryStatus};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};

/// Instant used by fixtures that do not set a timestamp: 2024-03-15 12:00 UTC.
pub fn fixture_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Builder for [`AuditLogEntry`] values.
///
/// # Examples
///
/// ```rust
/// use auditscope_core::EntryStatus;
/// use auditscope_test::EntryBuilder;
///
/// let entry = EntryBuilder::new("e-1")
///     .action("LOGIN")
///     .status(EntryStatus::Failed)
///     .actor("Grace Hopper", "grace@example.com")
///     .build();
///
/// assert_eq!(entry.actor.initials, "GH");
/// ```
#[derive(Debug, Clone)]
pub struct EntryBuilder {
    id: String,
    timestamp: DateTime<Utc>,
    user_name: String,
    user_email: String,
    action: String,
    description: String,
    status: EntryStatus,
    ip_address: Option<String>,
    user_agent: Option<String>,
    metadata: BTreeMap<String, serde_json::Value>,
}

impl EntryBuilder {
    /// Creates a successful `LOGIN` entry stamped one minute before
    /// [`fixture_now`].
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            timestamp: fixture_now() - TimeDelta::minutes(1),
            user_name: "Test User".to_string(),
            user_email: "test.user@example.com".to_string(),
            action: "LOGIN".to_string(),
            description: "User signed in".to_string(),
            status: EntryStatus::Success,
            ip_address: Some("10.0.0.1".to_string()),
            user_agent: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Sets the timestamp.
    #[must_use]
    pub const fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the actor name and e-mail.
    #[must_use]
    pub fn actor(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.user_name = name.into();
        self.user_email = email.into();
        self
    }

    /// Sets the action.
    #[must_use]
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the status.
    #[must_use]
    pub const fn status(mut self, status: EntryStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the IP address.
    #[must_use]
    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Adds a metadata value.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the entry.
    #[must_use]
    pub fn build(self) -> AuditLogEntry {
        let initials = derive_initials(&self.user_name, &self.user_email);
        let user_id = format!("user-{}", self.user_email.split('@').next().unwrap_or(""));

        AuditLogEntry {
            id: self.id,
            timestamp: self.timestamp,
            actor: Actor {
                user_id,
                user_name: self.user_name,
                user_email: self.user_email,
                initials,
            },
            action: AuditAction::new(&self.action),
            action_category_color: None,
            ip_address: self.ip_address,
            description: self.description,
            status: self.status,
            user_agent: self.user_agent,
            metadata: self.metadata,
        }
    }
}

/// Creates `count` entries with ids `{prefix}-1..` and the given status,
/// newest first, spaced one minute apart before [`fixture_now`].
pub fn entries(prefix: &str, count: usize, status: EntryStatus) -> Vec<AuditLogEntry> {
    (1..=count)
        .map(|n| {
            let minutes = i64::try_from(n).unwrap_or(i64::MAX);
            EntryBuilder::new(format!("{prefix}-{n}"))
                .status(status)
                .at(fixture_now() - TimeDelta::minutes(minutes))
                .build()
        })
        .collect()
}

/// Wraps `entries` into a page with the given totals.
pub fn page(entries: Vec<AuditLogEntry>, total: u64, page_count: u64) -> QueryPage {
    QueryPage {
        entries,
        total,
        page_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_builder_defaults() {
        let entry = EntryBuilder::new("e-1").build();
        assert_eq!(entry.id, "e-1");
        assert_eq!(entry.action.as_str(), "LOGIN");
        assert_eq!(entry.status, EntryStatus::Success);
        assert_eq!(entry.actor.initials, "TU");
        assert!(entry.timestamp < fixture_now());
    }

    #[test]
    fn test_entries_are_newest_first() {
        let list = entries("f", 3, EntryStatus::Failed);
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].id, "f-1");
        assert!(list[0].timestamp > list[2].timestamp);
        assert!(list.iter().all(|e| e.status == EntryStatus::Failed));
    }
}
