use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use leakscope_core::codec::{TraceRecord, TraceWriter, EMPTY_STACK};
use leakscope_core::{EventKind, Frame, TaskId};

use crate::config::CaptureConfig;

struct RecorderState {
    /// `None` once the capture has been finalized.
    writer: Option<TraceWriter<Vec<u8>>>,
    stacks: HashMap<Vec<Frame>, u64>,
    next_stack_id: u64,
}

/// Encodes task events of one capture into an in-memory buffer.
///
/// Events arriving after [`Recorder::finish`] are dropped, so tasks that
/// outlive their capture never write into a later one.
pub struct Recorder {
    config: CaptureConfig,
    started_at: Instant,
    next_task_id: AtomicU64,
    state: Mutex<RecorderState>,
}

impl Recorder {
    pub fn new(config: CaptureConfig) -> Self {
        let writer = match TraceWriter::new(Vec::new()) {
            Ok(writer) => Some(writer),
            Err(e) => {
                tracing::warn!(error = %e, "failed to write capture header");
                None
            }
        };

        Self {
            config,
            started_at: Instant::now(),
            next_task_id: AtomicU64::new(1),
            state: Mutex::new(RecorderState {
                writer,
                stacks: HashMap::new(),
                next_stack_id: EMPTY_STACK + 1,
            }),
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Registers a new task and records its `TaskCreate` event.
    pub fn on_spawn(&self, name: &str, parent: Option<TaskId>, stack: Vec<Frame>) -> TaskId {
        let id = TaskId(self.next_task_id.fetch_add(1, Ordering::Relaxed));
        let timestamp_ns = self.elapsed_ns();

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let stack_id = state.intern(stack);
        state.write(&TraceRecord::Task {
            id,
            parent,
            name: name.to_string(),
        });
        state.write(&TraceRecord::Event {
            kind: EventKind::TaskCreate,
            task: id,
            timestamp_ns,
            stack: stack_id,
        });

        tracing::trace!(task = %id, name, "task created");
        id
    }

    /// Records a lifecycle event of a previously spawned task.
    pub fn on_event(&self, task: TaskId, kind: EventKind) {
        let timestamp_ns = self.elapsed_ns();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.write(&TraceRecord::Event {
            kind,
            task,
            timestamp_ns,
            stack: EMPTY_STACK,
        });
    }

    pub fn is_finished(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .writer
            .is_none()
    }

    /// Closes the capture and returns the encoded buffer.
    ///
    /// Only the first call returns data; later calls return an empty buffer.
    pub fn finish(&self) -> Vec<u8> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .writer
            .take()
            .map(TraceWriter::into_inner)
            .unwrap_or_default()
    }

    fn elapsed_ns(&self) -> u64 {
        u64::try_from(self.started_at.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

impl RecorderState {
    fn intern(&mut self, frames: Vec<Frame>) -> u64 {
        if frames.is_empty() {
            return EMPTY_STACK;
        }
        if let Some(id) = self.stacks.get(&frames) {
            return *id;
        }

        let id = self.next_stack_id;
        self.next_stack_id += 1;
        self.write(&TraceRecord::Stack {
            id,
            frames: frames.clone(),
        });
        self.stacks.insert(frames, id);
        id
    }

    fn write(&mut self, record: &TraceRecord) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        if let Err(e) = writer.write(record) {
            tracing::warn!(error = %e, "failed to encode trace record");
        }
    }
}
