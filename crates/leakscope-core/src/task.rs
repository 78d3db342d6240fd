use std::fmt;

use serde::{Deserialize, Serialize};

/// Names starting with this prefix belong to the async runtime's own
/// housekeeping tasks.
pub const RUNTIME_NAMESPACE: &str = "tokio::";

/// Identifier of a task within one capture.
///
/// Ids are handed out by the recorder and are only unique inside the capture
/// that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl TaskId {
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-task metadata recorded when a task is spawned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub id: TaskId,
    /// Function the task runs. Empty when the name could not be resolved.
    pub name: String,
    /// Task that spawned this one, when it was itself tracked.
    pub parent: Option<TaskId>,
}

impl TaskDescriptor {
    pub fn new(id: TaskId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent: None,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: Option<TaskId>) -> Self {
        self.parent = parent;
        self
    }
}
