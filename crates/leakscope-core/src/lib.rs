//! Core types and trace format for leakscope.
//!
//! This crate defines the data structures shared across the workspace: the
//! decoded event model, task descriptors, the binary capture format with its
//! decoder, and the error types. It contains no capture or analysis logic.

pub mod codec;
pub mod error;
pub mod task;
pub mod trace;

pub use error::{CaptureStartError, DecodeError, Error, Result};
pub use task::{TaskDescriptor, TaskId, RUNTIME_NAMESPACE};
pub use trace::{Event, EventIndex, EventKind, EventTable, Frame};
