//! Engine types
//!
//! Run statistics and the end-of-run summary.

use std::collections::BTreeMap;
use std::fmt;

/// Truncation width for error messages in the summary rollup
const ERROR_TRUNCATE_CHARS: usize = 120;

/// Counters accumulated while a run executes
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Requests issued
    pub total_requests: usize,
    /// Requests that produced a response
    pub successful_requests: usize,
    /// Requests that raised an error
    pub failed_requests: usize,
    /// Distinct request-name:url keys issued
    pub unique_endpoints: usize,
    /// Distinct errors, keyed by `request name -> message`, with counts
    errors: BTreeMap<(String, String), usize>,
}

impl RunStats {
    /// Create zeroed stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failed request
    pub fn record_error(&mut self, request: &str, message: &str) {
        self.failed_requests += 1;
        let truncated: String = message.chars().take(ERROR_TRUNCATE_CHARS).collect();
        *self
            .errors
            .entry((request.to_string(), truncated))
            .or_insert(0) += 1;
    }

    /// Distinct errors with occurrence counts
    pub fn errors(&self) -> impl Iterator<Item = (&(String, String), &usize)> {
        self.errors.iter()
    }
}

/// End-of-run summary printed to the console
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Manifest identity
    pub manifest_id: String,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Final counters
    pub stats: RunStats,
    /// Datasets written, with record counts
    pub datasets_written: Vec<(String, usize)>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run complete: {}", self.manifest_id)?;
        writeln!(f, "  duration: {:.1}s", self.duration_ms as f64 / 1000.0)?;
        writeln!(
            f,
            "  requests: {} total, {} successful, {} failed",
            self.stats.total_requests,
            self.stats.successful_requests,
            self.stats.failed_requests
        )?;
        writeln!(f, "  unique endpoints: {}", self.stats.unique_endpoints)?;
        for (name, count) in &self.datasets_written {
            writeln!(f, "  dataset {name}: {count} records")?;
        }
        for ((request, message), count) in self.stats.errors() {
            writeln!(f, "  {request}: {message} (x{count})")?;
        }
        Ok(())
    }
}
