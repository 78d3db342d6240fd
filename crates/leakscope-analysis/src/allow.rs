//! Allow-list of task names whose non-termination is expected.

pub use leakscope_core::RUNTIME_NAMESPACE;

/// Entries always present in an [`AllowList`]: the capture entry point and
/// the libtest driver.
///
/// `spawn` never derives these names from a future's type. They only match
/// tasks a harness registers explicitly, e.g.
/// `spawn_named("test::run_test", driver)` for a driver task that is expected
/// to outlive the capture.
pub const DEFAULT_ALLOW_LIST: &[&str] = &["leakscope::session::start", "test::run_test"];

/// How the allow-list treats a leaked task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The task name could not be resolved. Not reported.
    Unresolved,
    /// Matched the allow-list or the runtime namespace.
    Allowed,
    /// Must be reported as a leak.
    Reported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    entries: Vec<String>,
}

impl AllowList {
    /// Builds a list from the defaults followed by `extra`. Empty patterns
    /// would match every name and are skipped.
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries: Vec<String> = DEFAULT_ALLOW_LIST.iter().map(|e| e.to_string()).collect();
        entries.extend(
            extra
                .into_iter()
                .map(Into::into)
                .filter(|entry: &String| !entry.is_empty()),
        );
        Self { entries }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn verdict(&self, name: &str) -> Verdict {
        if name.is_empty() {
            Verdict::Unresolved
        } else if name.starts_with(RUNTIME_NAMESPACE)
            || self.entries.iter().any(|entry| name.ends_with(entry.as_str()))
        {
            Verdict::Allowed
        } else {
            Verdict::Reported
        }
    }

    /// Whether a leak of a task with this name is suppressed.
    pub fn allows(&self, name: &str) -> bool {
        self.verdict(name) != Verdict::Reported
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}
