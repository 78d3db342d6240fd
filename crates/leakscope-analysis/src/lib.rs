//! Leak detection over decoded leakscope traces.
//!
//! This crate provides:
//! - Lifecycle linking of task creation events to their last recorded event
//! - Allow-list filtering of expected long-lived tasks
//! - Grouping of leaked tasks by stack signature and report rendering

pub mod aggregator;
pub mod allow;
pub mod analyzer;
pub mod linker;
pub mod report;

pub use aggregator::Aggregator;
pub use allow::{AllowList, Verdict, DEFAULT_ALLOW_LIST, RUNTIME_NAMESPACE};
pub use analyzer::Analyzer;
pub use linker::TaskLifecycle;
pub use report::{render_signature, LeakEntry, LeakReport};
