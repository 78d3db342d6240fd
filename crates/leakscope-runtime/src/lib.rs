//! Task capture runtime for leakscope.
//!
//! This crate provides:
//! - The process-wide capture slot (one active capture per process)
//! - A recorder encoding task events into the leakscope trace format
//! - Instrumented `spawn` functions wrapping `tokio::spawn`

pub mod capture;
pub mod config;
pub mod recorder;
mod stack;
pub mod task;

pub use capture::{acquire, is_active, CaptureHandle};
pub use config::CaptureConfig;
pub use recorder::Recorder;
pub use task::{current_task_id, spawn, spawn_named, TrackedFuture};
