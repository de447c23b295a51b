use serde::Serialize;
use std::time::Duration;

/// Counters for one job run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobStats {
    pub total: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl JobStats {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn log_summary(&self, job: &str) {
        tracing::info!(
            job = job,
            total = self.total,
            updated = self.updated,
            skipped = self.skipped,
            errors = self.errors,
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "Job run finished"
        );
    }
}
