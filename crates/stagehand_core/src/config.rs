//! Staging configuration.

/// Default maximum number of rows per staged segment.
pub const DEFAULT_SEGMENT_ROW_SIZE: usize = 100_000;

/// Configuration for staging writes.
///
/// Passed explicitly to [`crate::IncompleteWriter::new`]; there is no
/// process-wide configuration.
#[derive(Debug, Clone)]
pub struct StagingConfig {
    /// Maximum rows per segment produced by `write_parallel`.
    pub segment_row_size: usize,

    /// Whether staging calls upsert the per-stream staging marker.
    pub write_staging_marker: bool,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            segment_row_size: DEFAULT_SEGMENT_ROW_SIZE,
            write_staging_marker: true,
        }
    }
}

impl StagingConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum rows per segment. Zero is treated as one.
    #[must_use]
    pub const fn segment_row_size(mut self, rows: usize) -> Self {
        self.segment_row_size = if rows == 0 { 1 } else { rows };
        self
    }

    /// Sets whether staging calls upsert the staging marker.
    #[must_use]
    pub const fn write_staging_marker(mut self, value: bool) -> Self {
        self.write_staging_marker = value;
        self
    }
}
