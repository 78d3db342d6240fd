use leakscope_core::{EventTable, Result};

use crate::aggregator::Aggregator;
use crate::allow::AllowList;
use crate::linker;
use crate::report::LeakReport;

/// Finds tasks in a decoded trace that never terminated.
pub struct Analyzer {
    allow: AllowList,
}

impl Analyzer {
    pub fn new(allow: AllowList) -> Self {
        Self { allow }
    }

    /// Analyzer using the default allow-list extended with `extra`.
    pub fn with_allow_list(extra: &[&str]) -> Self {
        Self::new(AllowList::new(extra.iter().copied()))
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow
    }

    /// Classifies every created task, filters the leaks through the
    /// allow-list and groups the rest by signature.
    pub fn analyze(&self, table: &EventTable) -> Result<LeakReport> {
        let mut aggregator = Aggregator::new();
        let mut created = 0usize;

        for lifecycle in linker::classify(table)? {
            created += 1;
            if !lifecycle.leaked {
                continue;
            }
            let stack = table
                .get(lifecycle.create)
                .map(|event| event.stack.as_slice())
                .unwrap_or_default();
            aggregator.ingest(&self.allow, table.task_name(lifecycle.task), stack);
        }

        let report = aggregator.finish();
        tracing::debug!(
            created,
            leaked = report.count,
            unresolved = report.unresolved,
            sites = report.entries.len(),
            "analyzed trace"
        );
        Ok(report)
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AllowList::default())
    }
}
