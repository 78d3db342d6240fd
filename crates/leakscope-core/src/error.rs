use std::path::PathBuf;

use thiserror::Error;

use crate::task::TaskId;
use crate::trace::EventIndex;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to start capture: {0}")]
    CaptureStart(#[from] CaptureStartError),

    #[error("capture source '{}' is unavailable: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("trace decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error(
        "task leak count mismatch: got = {got}, expected {want}, stack = {}",
        .reports.join("")
    )]
    LeakCountMismatch {
        got: usize,
        want: usize,
        reports: Vec<String>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reasons the process-wide capture slot refused a new session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureStartError {
    #[error("a capture session is already active in this process")]
    AlreadyActive,
}

/// Malformed or truncated trace data.
///
/// Cloneable so a memoized decode failure can be handed to every caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("failed to read trace: {0}")]
    Read(String),

    #[error("bad trace header magic")]
    BadMagic,

    #[error("unsupported trace format version {0}")]
    UnsupportedVersion(u16),

    #[error("trace truncated at byte {offset}")]
    Truncated { offset: u64 },

    #[error("malformed record at byte {offset}: {reason}")]
    Malformed { offset: u64, reason: String },

    #[error("event at byte {offset} references unknown stack {stack}")]
    UnknownStack { offset: u64, stack: u64 },

    #[error("event at byte {offset} has zero task id")]
    ZeroTaskId { offset: u64 },

    #[error("event {0} is not in the trace")]
    MissingEvent(EventIndex),

    #[error("lifecycle chain of task {task} is broken at event {at}: link to {to}")]
    BrokenChain {
        task: TaskId,
        at: EventIndex,
        to: EventIndex,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
