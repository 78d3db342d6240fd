//! leakscope: find tokio tasks that outlive a test.
//!
//! Start a [`Session`], run the code under test with tasks spawned through
//! [`spawn`] or [`spawn_named`], then ask the session which tasks never
//! finished:
//!
//! ```ignore
//! let session = leakscope::start()?;
//! run_code_under_test().await;
//! session.assert_leak_count(0, &[])?;
//! ```
//!
//! Leaks are grouped by task name and spawn-site stack. Captures can be
//! saved with [`Session::save_capture`] and analyzed later with
//! [`leaks_from_capture`] or the `cargo leakscope` CLI.

pub mod session;

pub use leakscope_analysis::{AllowList, LeakEntry, LeakReport, DEFAULT_ALLOW_LIST};
pub use leakscope_core as core;
pub use leakscope_core::{Error, Result};
pub use leakscope_runtime::{current_task_id, spawn, spawn_named, CaptureConfig};
pub use session::{leaks_from_capture, leaks_from_reader, start, Session, SessionState};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{Error, Result, TaskId};
    pub use crate::{spawn, spawn_named, start, CaptureConfig, LeakReport, Session};
}
