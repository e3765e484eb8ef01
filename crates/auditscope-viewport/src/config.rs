//! Configuration types for the viewport.

use auditscope_core::{DateRangeResolver, Error, FilterState, DEFAULT_PAGE_SIZE};
use chrono::FixedOffset;

use crate::error::{Result, ViewportError};

/// Configuration for a viewport session.
#[derive(Debug, Clone)]
pub struct ViewportConfig {
    /// Entries per page; fixed for the session.
    pub page_size: u32,

    /// Offset used for calendar boundaries (midnight, week, month, quarter).
    pub utc_offset: FixedOffset,

    /// Filter the session starts with. Its page size is replaced by
    /// `page_size`.
    pub initial_filter: FilterState,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ViewportConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ViewportConfigBuilder {
        ViewportConfigBuilder::default()
    }

    /// Returns the date range resolver for this session.
    pub const fn resolver(&self) -> DateRangeResolver {
        DateRangeResolver::new(self.utc_offset)
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero page size, an initial filter whose page
    /// size differs from `page_size`, or an invalid initial filter.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::InvalidPageSize { size: 0 }.into());
        }
        if self.initial_filter.page_size != self.page_size {
            return Err(ViewportError::InvalidConfig {
                reason: format!(
                    "initial filter page size {} does not match page size {}",
                    self.initial_filter.page_size, self.page_size
                ),
            });
        }
        self.initial_filter.validate()?;
        Ok(())
    }
}

/// Builder for [`ViewportConfig`].
#[derive(Debug, Default)]
pub struct ViewportConfigBuilder {
    page_size: Option<u32>,
    utc_offset: Option<FixedOffset>,
    initial_filter: Option<FilterState>,
}

impl ViewportConfigBuilder {
    /// Sets the page size.
    pub const fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Sets the offset for calendar boundaries.
    pub const fn utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = Some(offset);
        self
    }

    /// Sets the initial filter.
    pub fn initial_filter(mut self, filter: FilterState) -> Self {
        self.initial_filter = Some(filter);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ViewportConfig {
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        let initial_filter = FilterState {
            page_size,
            ..self.initial_filter.unwrap_or_default()
        };

        ViewportConfig {
            page_size,
            utc_offset: self
                .utc_offset
                .unwrap_or_else(|| DateRangeResolver::utc().offset()),
            initial_filter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditscope_core::{DatePreset, EntryStatus, StatusFilter};

    #[test]
    fn test_default_config() {
        let config = ViewportConfig::default();
        assert_eq!(config.page_size, 10);
        assert_eq!(config.utc_offset.local_minus_utc(), 0);
        assert_eq!(config.initial_filter.page, 1);
        assert_eq!(config.initial_filter.date, DatePreset::Last7Days);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let config = ViewportConfig::builder()
            .page_size(25)
            .utc_offset(offset)
            .initial_filter(
                FilterState::default().with_status(StatusFilter::Only(EntryStatus::Failed)),
            )
            .build();

        assert_eq!(config.page_size, 25);
        assert_eq!(config.initial_filter.page_size, 25);
        assert_eq!(
            config.initial_filter.status,
            StatusFilter::Only(EntryStatus::Failed)
        );
        assert_eq!(config.resolver().offset(), offset);
    }

    #[test]
    fn test_mismatched_filter_page_size_is_invalid() {
        let config = ViewportConfig {
            page_size: 10,
            utc_offset: DateRangeResolver::utc().offset(),
            initial_filter: FilterState::new(25),
        };

        assert!(matches!(
            config.validate(),
            Err(ViewportError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_zero_page_size_is_invalid() {
        let config = ViewportConfig::builder().page_size(0).build();
        assert!(config.validate().is_err());
    }
}
