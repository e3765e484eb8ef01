//! Audit log entry model.
//!
//! [`AuditLogEntry`] is the normalized, immutable record shown in the
//! viewport. Historical pages and live events both arrive as
//! [`RawAuditLog`] wire values and go through the same normalization, so the
//! rest of the system only ever sees one entity shape.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Outcome recorded on an audit log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryStatus {
    /// The audited operation succeeded.
    Success,
    /// The audited operation failed or was denied.
    Failed,
}

impl EntryStatus {
    /// Returns the canonical wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Failed => "Failed",
        }
    }

    /// Parses a status name case-insensitively.
    ///
    /// Accepts `failure` as an alias of `failed`.
    pub fn parse_lenient(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "success" => Some(Self::Success),
            "failed" | "failure" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_lenient(s).ok_or_else(|| Error::UnknownStatus {
            name: s.to_string(),
        })
    }
}

/// Stable action identifier such as `LOGIN` or `CONFIG_CHANGE`.
///
/// Actions are an open set owned by the producing system. They are
/// normalized to trimmed upper case so filter comparisons are exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AuditAction(String);

impl AuditAction {
    /// Creates a normalized action identifier.
    pub fn new(action: impl AsRef<str>) -> Self {
        Self(action.as_ref().trim().to_ascii_uppercase())
    }

    /// Returns the action identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AuditAction {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for AuditAction {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<AuditAction> for String {
    fn from(value: AuditAction) -> Self {
        value.0
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The user who performed an audited action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    /// User identifier.
    pub user_id: String,
    /// Display name.
    pub user_name: String,
    /// E-mail address.
    pub user_email: String,
    /// Avatar initials.
    pub initials: String,
}

/// A normalized, immutable audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    /// Unique entry identifier.
    pub id: String,
    /// When the audited action happened.
    pub timestamp: DateTime<Utc>,
    /// Who performed the action.
    pub actor: Actor,
    /// What was done.
    pub action: AuditAction,
    /// Display hint chosen by the producer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_category_color: Option<String>,
    /// Source IP address, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Human-readable description.
    pub description: String,
    /// Outcome of the action.
    pub status: EntryStatus,
    /// Client user agent, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Opaque producer metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl AuditLogEntry {
    /// Returns true if `needle` (already lower-cased) occurs in any of the
    /// searchable text fields.
    pub fn contains_text(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }

        let haystacks = [
            Some(self.description.as_str()),
            Some(self.action.as_str()),
            Some(self.actor.user_name.as_str()),
            Some(self.actor.user_email.as_str()),
            self.ip_address.as_deref(),
        ];

        haystacks
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Actor as delivered on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawActor {
    /// User identifier.
    pub user_id: String,
    /// Display name.
    pub user_name: String,
    /// E-mail address.
    pub user_email: String,
    /// Avatar initials, derived when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initials: Option<String>,
}

/// Audit log entry as delivered by the query endpoint and the live feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAuditLog {
    /// Unique entry identifier.
    #[serde(default)]
    pub id: String,
    /// When the audited action happened.
    pub timestamp: DateTime<Utc>,
    /// Who performed the action.
    #[serde(default)]
    pub actor: RawActor,
    /// Action identifier.
    #[serde(default)]
    pub action: String,
    /// Display hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_category_color: Option<String>,
    /// Source IP address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Outcome name.
    #[serde(default)]
    pub status: String,
    /// Client user agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Opaque producer metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
}

impl TryFrom<RawAuditLog> for AuditLogEntry {
    type Error = Error;

    fn try_from(raw: RawAuditLog) -> Result<Self> {
        let id = raw.id.trim().to_string();
        if id.is_empty() {
            return Err(Error::invalid_entry("missing id"));
        }

        let status = EntryStatus::parse_lenient(&raw.status).ok_or_else(|| {
            Error::invalid_entry(format!("entry '{id}' has unknown status '{}'", raw.status))
        })?;

        let initials = raw
            .actor
            .initials
            .filter(|i| !i.trim().is_empty())
            .unwrap_or_else(|| derive_initials(&raw.actor.user_name, &raw.actor.user_email));

        Ok(Self {
            id,
            timestamp: raw.timestamp,
            actor: Actor {
                user_id: raw.actor.user_id,
                user_name: raw.actor.user_name,
                user_email: raw.actor.user_email,
                initials,
            },
            action: AuditAction::new(&raw.action),
            action_category_color: raw.action_category_color,
            ip_address: non_empty(raw.ip_address),
            description: raw.description,
            status,
            user_agent: non_empty(raw.user_agent),
            metadata: raw.metadata.unwrap_or_default(),
        })
    }
}

impl From<&AuditLogEntry> for RawAuditLog {
    fn from(entry: &AuditLogEntry) -> Self {
        Self {
            id: entry.id.clone(),
            timestamp: entry.timestamp,
            actor: RawActor {
                user_id: entry.actor.user_id.clone(),
                user_name: entry.actor.user_name.clone(),
                user_email: entry.actor.user_email.clone(),
                initials: Some(entry.actor.initials.clone()),
            },
            action: entry.action.to_string(),
            action_category_color: entry.action_category_color.clone(),
            ip_address: entry.ip_address.clone(),
            description: entry.description.clone(),
            status: entry.status.to_string(),
            user_agent: entry.user_agent.clone(),
            metadata: Some(entry.metadata.clone()),
        }
    }
}

/// Derives avatar initials from a display name, falling back to the e-mail.
pub fn derive_initials(user_name: &str, user_email: &str) -> String {
    let from_name: String = user_name
        .split_whitespace()
        .take(2)
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect();

    if !from_name.is_empty() {
        return from_name;
    }

    user_email
        .trim()
        .chars()
        .next()
        .map_or_else(|| "?".to_string(), |c| c.to_uppercase().collect())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(id: &str, status: &str) -> RawAuditLog {
        RawAuditLog {
            id: id.to_string(),
            timestamp: Utc::now(),
            actor: RawActor {
                user_id: "u-1".to_string(),
                user_name: "Ada Lovelace".to_string(),
                user_email: "ada@example.com".to_string(),
                initials: None,
            },
            action: "login".to_string(),
            status: status.to_string(),
            description: "User signed in".to_string(),
            ..RawAuditLog::default()
        }
    }

    #[test]
    fn test_status_parse_lenient() {
        assert_eq!(EntryStatus::parse_lenient("SUCCESS"), Some(EntryStatus::Success));
        assert_eq!(EntryStatus::parse_lenient(" failed "), Some(EntryStatus::Failed));
        assert_eq!(EntryStatus::parse_lenient("failure"), Some(EntryStatus::Failed));
        assert_eq!(EntryStatus::parse_lenient("pending"), None);
    }

    #[test]
    fn test_action_is_normalized() {
        assert_eq!(AuditAction::new(" config_change "), AuditAction::new("CONFIG_CHANGE"));
        assert_eq!(AuditAction::from("login").as_str(), "LOGIN");
    }

    #[test]
    fn test_normalize_derives_initials() {
        let entry = AuditLogEntry::try_from(raw("evt-1", "success")).unwrap();
        assert_eq!(entry.actor.initials, "AL");
        assert_eq!(entry.status, EntryStatus::Success);
        assert_eq!(entry.action.as_str(), "LOGIN");
        assert!(entry.metadata.is_empty());
    }

    #[test]
    fn test_normalize_keeps_wire_initials() {
        let mut wire = raw("evt-1", "Failed");
        wire.actor.initials = Some("XY".to_string());
        let entry = AuditLogEntry::try_from(wire).unwrap();
        assert_eq!(entry.actor.initials, "XY");
    }

    #[test]
    fn test_normalize_empty_optionals_become_absent() {
        let mut wire = raw("evt-1", "Success");
        wire.ip_address = Some(String::new());
        wire.user_agent = Some("  ".to_string());
        let entry = AuditLogEntry::try_from(wire).unwrap();
        assert!(entry.ip_address.is_none());
        assert!(entry.user_agent.is_none());
    }

    #[test]
    fn test_normalize_rejects_missing_id() {
        let err = AuditLogEntry::try_from(raw("  ", "Success")).unwrap_err();
        assert!(matches!(err, Error::InvalidEntry { .. }));
    }

    #[test]
    fn test_normalize_rejects_unknown_status() {
        let err = AuditLogEntry::try_from(raw("evt-1", "pending")).unwrap_err();
        assert!(err.to_string().contains("pending"));
    }

    #[test]
    fn test_derive_initials_fallbacks() {
        assert_eq!(derive_initials("grace brewster hopper", ""), "GB");
        assert_eq!(derive_initials("", "root@example.com"), "R");
        assert_eq!(derive_initials("  ", ""), "?");
    }

    #[test]
    fn test_wire_deserialization_camel_case() {
        let value = json!({
            "id": "evt-9",
            "timestamp": "2024-05-01T12:00:00Z",
            "actor": { "userId": "u-9", "userName": "Linus", "userEmail": "l@example.com" },
            "action": "ACCESS_DENIED",
            "ipAddress": "10.0.0.1",
            "description": "Denied access to /admin",
            "status": "Failed",
            "metadata": { "path": "/admin" }
        });

        let wire: RawAuditLog = serde_json::from_value(value).unwrap();
        let entry = AuditLogEntry::try_from(wire).unwrap();
        assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(entry.actor.initials, "L");
        assert_eq!(entry.metadata["path"], "/admin");
    }

    #[test]
    fn test_contains_text_searches_actor_and_ip() {
        let mut wire = raw("evt-1", "Success");
        wire.ip_address = Some("192.168.1.20".to_string());
        let entry = AuditLogEntry::try_from(wire).unwrap();

        assert!(entry.contains_text(""));
        assert!(entry.contains_text("lovelace"));
        assert!(entry.contains_text("192.168"));
        assert!(entry.contains_text("signed in"));
        assert!(!entry.contains_text("logout"));
    }
}
