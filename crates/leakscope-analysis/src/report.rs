use std::fmt;

use leakscope_core::{Frame, Result};
use serde::{Deserialize, Serialize};

/// Renders the grouping key of a leak: the task name followed by one
/// `function:`/`file:`/`line:` triple per frame and a closing `end` line.
pub fn render_signature(name: &str, stack: &[Frame]) -> String {
    let mut out = String::with_capacity(name.len() + 1 + stack.len() * 64 + 4);
    out.push_str(name);
    out.push('\n');
    for frame in stack {
        out.push_str("function:");
        out.push_str(&frame.function);
        out.push_str("\nfile:");
        out.push_str(&frame.file);
        out.push_str("\nline:");
        out.push_str(&frame.line.to_string());
        out.push('\n');
    }
    out.push_str("end\n");
    out
}

/// One distinct leak site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakEntry {
    /// Number of leaked tasks sharing this signature.
    pub count: usize,
    pub name: String,
    pub signature: String,
}

impl LeakEntry {
    /// Text form of the entry: the occurrence count and the signature.
    pub fn render(&self) -> String {
        format!("count:{}\n stack:{}\n", self.count, self.signature)
    }
}

/// Result of one leak query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakReport {
    /// Total number of reported leaked tasks.
    pub count: usize,
    /// Leaked tasks whose name could not be resolved. Not part of `count`.
    pub unresolved: usize,
    /// Distinct leak sites. Ordered by descending count, then signature.
    pub entries: Vec<LeakEntry>,
}

impl LeakReport {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Rendered text of every entry.
    pub fn reports(&self) -> Vec<String> {
        self.entries.iter().map(LeakEntry::render).collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for LeakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "leaked tasks: {}", self.count)?;
        if self.unresolved > 0 {
            writeln!(f, "unresolved leaked tasks: {}", self.unresolved)?;
        }
        for entry in &self.entries {
            f.write_str(&entry.render())?;
        }
        Ok(())
    }
}
