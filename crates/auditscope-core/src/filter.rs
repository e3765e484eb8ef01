//! Filter state and the filter model.
//!
//! [`FilterModel`] is the single source of truth for what the viewport
//! should display. Every change goes through [`FilterModel::apply`], which
//! validates the candidate state before committing it and classifies the
//! transition so callers know whether a new query (and a selection reset)
//! is required.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::date_range::{CustomRange, DatePreset, DateRangeResolver, ResolvedInterval};
use crate::entry::{AuditAction, AuditLogEntry, EntryStatus};
use crate::error::{Error, Result};

/// Default number of entries per page.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Status filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StatusFilter {
    /// Any status.
    #[default]
    All,
    /// Only entries with this status.
    Only(EntryStatus),
}

impl StatusFilter {
    /// Returns true if `status` passes the filter.
    pub fn matches(self, status: EntryStatus) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == status,
        }
    }

    /// Returns the selected status, if any.
    pub const fn status(self) -> Option<EntryStatus> {
        match self {
            Self::All => None,
            Self::Only(status) => Some(status),
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(status) => write!(f, "{status}"),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse().map(Self::Only)
    }
}

/// Action filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActionFilter {
    /// Any action.
    #[default]
    All,
    /// Only entries with this action.
    Only(AuditAction),
}

impl ActionFilter {
    /// Returns true if `action` passes the filter.
    pub fn matches(&self, action: &AuditAction) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == action,
        }
    }

    /// Returns the selected action, if any.
    pub const fn action(&self) -> Option<&AuditAction> {
        match self {
            Self::All => None,
            Self::Only(action) => Some(action),
        }
    }
}

impl fmt::Display for ActionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(action) => write!(f, "{action}"),
        }
    }
}

impl FromStr for ActionFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            Ok(Self::Only(AuditAction::new(trimmed)))
        }
    }
}

/// The active query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    /// 1-based page number.
    pub page: u32,
    /// Entries per page; fixed for a session.
    pub page_size: u32,
    /// Action filter.
    pub action: ActionFilter,
    /// Status filter.
    pub status: StatusFilter,
    /// Free-text search, may be empty.
    pub search: String,
    /// Date selector.
    pub date: DatePreset,
    /// Only meaningful when `date` is [`DatePreset::Custom`].
    pub custom_range: Option<CustomRange>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl FilterState {
    /// Creates the default filter state with the given page size.
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size,
            action: ActionFilter::All,
            status: StatusFilter::All,
            search: String::new(),
            date: DatePreset::Last7Days,
            custom_range: None,
        }
    }

    /// Sets the page.
    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Sets the action filter.
    #[must_use]
    pub fn with_action(mut self, action: ActionFilter) -> Self {
        self.action = action;
        self
    }

    /// Sets the status filter.
    #[must_use]
    pub fn with_status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    /// Sets the search text.
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    /// Sets the date preset.
    #[must_use]
    pub fn with_date(mut self, date: DatePreset) -> Self {
        self.date = date;
        self
    }

    /// Selects [`DatePreset::Custom`] with the given range.
    #[must_use]
    pub fn with_custom_range(mut self, range: CustomRange) -> Self {
        self.date = DatePreset::Custom;
        self.custom_range = Some(range);
        self
    }

    /// Checks the state invariants.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero page or page size, or an invalid custom range.
    pub fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(Error::InvalidPage { page: self.page });
        }
        if self.page_size == 0 {
            return Err(Error::InvalidPageSize {
                size: self.page_size,
            });
        }
        if self.date == DatePreset::Custom {
            self.custom_range
                .as_ref()
                .ok_or(Error::MissingCustomRange)?
                .validate()?;
        }
        Ok(())
    }

    /// Resolves the date selector against `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the custom range is missing or inverted.
    pub fn resolve_interval(
        &self,
        resolver: &DateRangeResolver,
        now: DateTime<Utc>,
    ) -> Result<ResolvedInterval> {
        resolver.resolve(self.date, now, self.custom_range.as_ref())
    }

    /// Returns the trimmed search text, or `None` when empty.
    pub fn search_term(&self) -> Option<&str> {
        let trimmed = self.search.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    fn same_query(&self, other: &Self) -> bool {
        self.action == other.action
            && self.status == other.status
            && self.search == other.search
            && self.date == other.date
            && self.custom_range == other.custom_range
    }
}

/// Partial update to a [`FilterState`].
///
/// Fields left as `None` are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPatch {
    /// New page.
    pub page: Option<u32>,
    /// New action filter.
    pub action: Option<ActionFilter>,
    /// New status filter.
    pub status: Option<StatusFilter>,
    /// New search text.
    pub search: Option<String>,
    /// New date selector.
    pub date: Option<DatePreset>,
    /// New custom range.
    pub custom_range: Option<CustomRange>,
}

impl FilterPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch that only moves to `page`.
    pub fn to_page(page: u32) -> Self {
        Self {
            page: Some(page),
            ..Self::default()
        }
    }

    /// Sets the page.
    #[must_use]
    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Sets the action filter.
    #[must_use]
    pub fn action(mut self, action: ActionFilter) -> Self {
        self.action = Some(action);
        self
    }

    /// Sets the status filter.
    #[must_use]
    pub fn status(mut self, status: StatusFilter) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the search text.
    #[must_use]
    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Sets the date selector.
    #[must_use]
    pub fn date(mut self, date: DatePreset) -> Self {
        self.date = Some(date);
        self
    }

    /// Selects a custom date range.
    #[must_use]
    pub fn custom_range(mut self, range: CustomRange) -> Self {
        self.date = Some(DatePreset::Custom);
        self.custom_range = Some(range);
        self
    }
}

/// Classification of a filter transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterChange {
    /// Nothing changed.
    Unchanged,
    /// Only the page moved.
    PageOnly,
    /// A query parameter changed; page was reset to 1.
    Query,
}

impl FilterChange {
    /// Returns true if the displayed data must be refetched.
    pub const fn requires_fetch(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Holder of the active [`FilterState`].
#[derive(Debug, Clone)]
pub struct FilterModel {
    state: FilterState,
}

impl FilterModel {
    /// Creates a model with a validated initial state.
    ///
    /// # Errors
    ///
    /// Returns an error if `initial` violates the state invariants.
    pub fn new(initial: FilterState) -> Result<Self> {
        initial.validate()?;
        Ok(Self { state: initial })
    }

    /// Returns the current state.
    pub const fn state(&self) -> &FilterState {
        &self.state
    }

    /// Applies `patch`, committing the result only if it is valid.
    ///
    /// Any change to a field other than `page` resets `page` to 1, and
    /// moving the date selector away from custom clears the custom range.
    ///
    /// # Errors
    ///
    /// Returns an error and leaves the model unchanged if the resulting
    /// state would be invalid.
    pub fn apply(&mut self, patch: FilterPatch) -> Result<FilterChange> {
        let mut next = self.state.clone();

        if let Some(action) = patch.action {
            next.action = action;
        }
        if let Some(status) = patch.status {
            next.status = status;
        }
        if let Some(search) = patch.search {
            next.search = search;
        }
        if let Some(date) = patch.date {
            next.date = date;
        }
        if let Some(range) = patch.custom_range {
            next.custom_range = Some(range);
        }
        if next.date != DatePreset::Custom {
            next.custom_range = None;
        }

        let query_changed = !next.same_query(&self.state);
        if query_changed {
            next.page = 1;
        } else if let Some(page) = patch.page {
            next.page = page;
        }

        next.validate()?;

        let change = if query_changed {
            FilterChange::Query
        } else if next.page != self.state.page {
            FilterChange::PageOnly
        } else {
            FilterChange::Unchanged
        };

        self.state = next;
        Ok(change)
    }

    /// Returns the live-event predicate for the current state.
    pub fn predicate(&self, resolver: DateRangeResolver) -> FilterPredicate {
        FilterPredicate::new(&self.state, resolver)
    }
}

/// Decides whether an entry belongs to the view described by a filter state.
#[derive(Debug, Clone)]
pub struct FilterPredicate {
    action: ActionFilter,
    status: StatusFilter,
    needle: String,
    date: DatePreset,
    custom_range: Option<CustomRange>,
    resolver: DateRangeResolver,
}

impl FilterPredicate {
    /// Captures the matching rules of `state`.
    pub fn new(state: &FilterState, resolver: DateRangeResolver) -> Self {
        Self {
            action: state.action.clone(),
            status: state.status,
            needle: state.search.trim().to_lowercase(),
            date: state.date,
            custom_range: state.custom_range,
            resolver,
        }
    }

    /// Returns true if `entry` matches, evaluating the date selector at `now`.
    ///
    /// For rolling presets only the lower bound is checked.
    pub fn matches(&self, entry: &AuditLogEntry, now: DateTime<Utc>) -> bool {
        if !self.action.matches(&entry.action) || !self.status.matches(entry.status) {
            return false;
        }
        if !entry.contains_text(&self.needle) {
            return false;
        }

        let Ok(interval) = self
            .resolver
            .resolve(self.date, now, self.custom_range.as_ref())
        else {
            return false;
        };

        if self.date.is_rolling() {
            interval.start.map_or(true, |start| entry.timestamp >= start)
        } else {
            interval.contains(entry.timestamp)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Actor;
    use chrono::{NaiveDate, TimeDelta};
    use std::collections::BTreeMap;

    fn entry(status: EntryStatus, action: &str, timestamp: DateTime<Utc>) -> AuditLogEntry {
        AuditLogEntry {
            id: "evt-1".to_string(),
            timestamp,
            actor: Actor {
                user_id: "u-1".to_string(),
                user_name: "Ada Lovelace".to_string(),
                user_email: "ada@example.com".to_string(),
                initials: "AL".to_string(),
            },
            action: AuditAction::new(action),
            action_category_color: None,
            ip_address: Some("10.1.2.3".to_string()),
            description: "Changed MFA policy".to_string(),
            status,
            user_agent: None,
            metadata: BTreeMap::new(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_state() {
        let state = FilterState::default();
        assert_eq!(state.page, 1);
        assert_eq!(state.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(state.date, DatePreset::Last7Days);
        assert!(state.validate().is_ok());
    }

    #[test]
    fn test_page_only_change_keeps_page() {
        let mut model = FilterModel::new(FilterState::default()).unwrap();
        let change = model.apply(FilterPatch::to_page(3)).unwrap();
        assert_eq!(change, FilterChange::PageOnly);
        assert_eq!(model.state().page, 3);
    }

    #[test]
    fn test_query_change_resets_page() {
        let mut model = FilterModel::new(FilterState::default().with_page(4)).unwrap();
        let change = model
            .apply(FilterPatch::new().status(StatusFilter::Only(EntryStatus::Failed)).page(7))
            .unwrap();
        assert_eq!(change, FilterChange::Query);
        assert_eq!(model.state().page, 1);
    }

    #[test]
    fn test_same_values_are_unchanged() {
        let mut model = FilterModel::new(FilterState::default()).unwrap();
        let change = model
            .apply(FilterPatch::new().status(StatusFilter::All).page(1))
            .unwrap();
        assert_eq!(change, FilterChange::Unchanged);
        assert!(!change.requires_fetch());
    }

    #[test]
    fn test_leaving_custom_clears_range() {
        let range = CustomRange::new(date(2024, 1, 1), date(2024, 1, 31)).unwrap();
        let mut model =
            FilterModel::new(FilterState::default().with_custom_range(range)).unwrap();

        model.apply(FilterPatch::new().date(DatePreset::Today)).unwrap();
        assert_eq!(model.state().date, DatePreset::Today);
        assert!(model.state().custom_range.is_none());
    }

    #[test]
    fn test_inverted_custom_range_rejected_without_commit() {
        let mut model = FilterModel::new(FilterState::default().with_page(2)).unwrap();
        let inverted = CustomRange {
            start: date(2024, 2, 1),
            end: date(2024, 1, 1),
        };

        let result = model.apply(FilterPatch::new().custom_range(inverted));
        assert!(matches!(result, Err(Error::InvalidRange { .. })));
        assert_eq!(model.state().date, DatePreset::Last7Days);
        assert_eq!(model.state().page, 2);
    }

    #[test]
    fn test_off_calendar_custom_range_rejected_without_commit() {
        let mut model = FilterModel::new(FilterState::default()).unwrap();
        let endless = CustomRange {
            start: date(2024, 1, 1),
            end: NaiveDate::MAX,
        };

        let result = model.apply(FilterPatch::new().custom_range(endless));
        assert!(matches!(result, Err(Error::DateOutOfRange { .. })));
        assert_eq!(model.state().date, DatePreset::Last7Days);
        assert!(model.state().custom_range.is_none());
    }

    #[test]
    fn test_custom_without_range_rejected() {
        let mut model = FilterModel::new(FilterState::default()).unwrap();
        let result = model.apply(FilterPatch::new().date(DatePreset::Custom));
        assert_eq!(result, Err(Error::MissingCustomRange));
    }

    #[test]
    fn test_zero_page_rejected() {
        let mut model = FilterModel::new(FilterState::default()).unwrap();
        assert_eq!(
            model.apply(FilterPatch::to_page(0)),
            Err(Error::InvalidPage { page: 0 })
        );
        assert!(matches!(
            FilterModel::new(FilterState::new(0)),
            Err(Error::InvalidPageSize { size: 0 })
        ));
    }

    #[test]
    fn test_status_and_action_parsing() {
        assert_eq!("all".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert_eq!(
            "Failed".parse::<StatusFilter>().unwrap(),
            StatusFilter::Only(EntryStatus::Failed)
        );
        assert!("maybe".parse::<StatusFilter>().is_err());
        assert_eq!("".parse::<ActionFilter>().unwrap(), ActionFilter::All);
        assert_eq!(
            "login".parse::<ActionFilter>().unwrap(),
            ActionFilter::Only(AuditAction::new("LOGIN"))
        );
    }

    #[test]
    fn test_predicate_matches_status_action_and_search() {
        let now = Utc::now();
        let state = FilterState::default()
            .with_status(StatusFilter::Only(EntryStatus::Failed))
            .with_action(ActionFilter::Only(AuditAction::new("config_change")))
            .with_search("  MFA ");
        let predicate = FilterPredicate::new(&state, DateRangeResolver::utc());

        assert!(predicate.matches(&entry(EntryStatus::Failed, "CONFIG_CHANGE", now), now));
        assert!(!predicate.matches(&entry(EntryStatus::Success, "CONFIG_CHANGE", now), now));
        assert!(!predicate.matches(&entry(EntryStatus::Failed, "LOGIN", now), now));

        let other_search = FilterPredicate::new(
            &state.clone().with_search("password"),
            DateRangeResolver::utc(),
        );
        assert!(!other_search.matches(&entry(EntryStatus::Failed, "CONFIG_CHANGE", now), now));
    }

    #[test]
    fn test_predicate_rolling_preset_admits_entries_after_now() {
        let now = Utc::now();
        let predicate = FilterPredicate::new(&FilterState::default(), DateRangeResolver::utc());

        let slightly_ahead = entry(EntryStatus::Success, "LOGIN", now + TimeDelta::seconds(2));
        assert!(predicate.matches(&slightly_ahead, now));

        let too_old = entry(EntryStatus::Success, "LOGIN", now - TimeDelta::days(8));
        assert!(!predicate.matches(&too_old, now));
    }

    #[test]
    fn test_predicate_yesterday_rejects_today() {
        let now = Utc::now();
        let state = FilterState::default().with_date(DatePreset::Yesterday);
        let predicate = FilterPredicate::new(&state, DateRangeResolver::utc());
        assert!(!predicate.matches(&entry(EntryStatus::Success, "LOGIN", now), now));
    }
}
