use std::collections::HashMap;

use leakscope_core::Frame;

use crate::allow::{AllowList, Verdict};
use crate::report::{render_signature, LeakEntry, LeakReport};

/// Groups leaked tasks by stack signature.
#[derive(Debug, Default)]
pub struct Aggregator {
    groups: HashMap<String, (String, usize)>,
    unresolved: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one leaked task unless the allow-list suppresses it.
    pub fn ingest(&mut self, allow: &AllowList, name: &str, stack: &[Frame]) {
        match allow.verdict(name) {
            Verdict::Unresolved => self.unresolved += 1,
            Verdict::Allowed => {}
            Verdict::Reported => {
                self.groups
                    .entry(render_signature(name, stack))
                    .or_insert_with(|| (name.to_string(), 0))
                    .1 += 1;
            }
        }
    }

    /// Produces the grouped report.
    pub fn finish(self) -> LeakReport {
        let mut entries: Vec<LeakEntry> = self
            .groups
            .into_iter()
            .map(|(signature, (name, count))| LeakEntry {
                count,
                name,
                signature,
            })
            .collect();

        entries.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.signature.cmp(&b.signature))
        });

        LeakReport {
            count: entries.iter().map(|e| e.count).sum(),
            unresolved: self.unresolved,
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(line: u32) -> Vec<Frame> {
        vec![Frame::new("leakscope::spawn", "src/main.rs", line)]
    }

    #[test]
    fn test_identical_signatures_collapse() {
        let allow = AllowList::default();
        let mut aggregator = Aggregator::new();
        aggregator.ingest(&allow, "app::routine", &site(10));
        aggregator.ingest(&allow, "app::routine", &site(10));
        aggregator.ingest(&allow, "app::routine", &site(11));

        let report = aggregator.finish();
        assert_eq!(report.count, 3);
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.entries[0].count, 2);
        assert!(report.entries[0].signature.contains("line:10"));
        assert_eq!(report.entries[1].count, 1);
    }

    #[test]
    fn test_same_stack_different_name_stays_separate() {
        let allow = AllowList::default();
        let mut aggregator = Aggregator::new();
        aggregator.ingest(&allow, "app::a", &site(10));
        aggregator.ingest(&allow, "app::b", &site(10));

        assert_eq!(aggregator.finish().entries.len(), 2);
    }

    #[test]
    fn test_suppressed_and_unresolved_are_not_counted() {
        let allow = AllowList::new(["app::ticker"]);
        let mut aggregator = Aggregator::new();
        aggregator.ingest(&allow, "app::ticker", &site(1));
        aggregator.ingest(&allow, "tokio::signal::driver", &site(2));
        aggregator.ingest(&allow, "", &site(3));

        let report = aggregator.finish();
        assert_eq!(report.count, 0);
        assert!(report.entries.is_empty());
        assert_eq!(report.unresolved, 1);
    }
}
