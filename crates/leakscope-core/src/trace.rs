//! In-memory model of a decoded task trace.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::task::{TaskDescriptor, TaskId};

/// Kind of a recorded task event.
///
/// Only `TaskCreate` and `TaskEnd` carry meaning for leak detection; the
/// remaining kinds are kept in the table as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    TaskCreate,
    TaskStart,
    TaskBlock,
    TaskUnblock,
    TaskEnd,
    Other(u8),
}

impl EventKind {
    pub fn is_terminal(self) -> bool {
        matches!(self, EventKind::TaskEnd)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::TaskCreate => f.write_str("TaskCreate"),
            EventKind::TaskStart => f.write_str("TaskStart"),
            EventKind::TaskBlock => f.write_str("TaskBlock"),
            EventKind::TaskUnblock => f.write_str("TaskUnblock"),
            EventKind::TaskEnd => f.write_str("TaskEnd"),
            EventKind::Other(code) => write!(f, "Other({code})"),
        }
    }
}

/// One call-stack frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    pub function: String,
    pub file: String,
    pub line: u32,
}

impl Frame {
    pub fn new(function: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            function: function.into(),
            file: file.into(),
            line,
        }
    }
}

/// Position of an event inside an [`EventTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventIndex(pub usize);

impl fmt::Display for EventIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single event in a decoded trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub task: TaskId,
    /// Nanoseconds since the capture started.
    pub timestamp_ns: u64,
    /// Call stack at the time of the event, innermost frame first.
    pub stack: Vec<Frame>,
    /// Next event of the same task, if any.
    pub next: Option<EventIndex>,
}

/// Decoded trace: events in chronological order plus the task side table.
///
/// Built once per decode and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventTable {
    events: Vec<Event>,
    tasks: HashMap<TaskId, TaskDescriptor>,
}

impl EventTable {
    pub fn new(events: Vec<Event>, tasks: HashMap<TaskId, TaskDescriptor>) -> Self {
        Self { events, tasks }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn get(&self, index: EventIndex) -> Option<&Event> {
        self.events.get(index.0)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterate over events together with their table index.
    pub fn iter(&self) -> impl Iterator<Item = (EventIndex, &Event)> {
        self.events
            .iter()
            .enumerate()
            .map(|(i, event)| (EventIndex(i), event))
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskDescriptor> {
        self.tasks.get(&id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskDescriptor> {
        self.tasks.values()
    }

    /// Resolved name of a task, or `""` when the trace carries none.
    pub fn task_name(&self, id: TaskId) -> &str {
        self.tasks.get(&id).map(|t| t.name.as_str()).unwrap_or("")
    }
}
