//! Instrumented task spawning.
//!
//! Tasks spawned through [`spawn`] or [`spawn_named`] while a capture is
//! active record their lifecycle into that capture. Outside a capture both
//! are plain wrappers around `tokio::spawn`.

use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use leakscope_core::{EventKind, TaskId};
use pin_project::{pin_project, pinned_drop};
use tokio::task::JoinHandle;

use crate::capture;
use crate::recorder::Recorder;
use crate::stack::{capture_spawn_stack, spawn_site_name, task_name_of};

tokio::task_local! {
    static CURRENT_TASK: TaskId;
}

/// Id of the tracked task currently being polled, if any.
pub fn current_task_id() -> Option<TaskId> {
    CURRENT_TASK.try_with(|id| *id).ok()
}

/// Spawns a task named after the function its future comes from.
///
/// Runtime wrappers around a user future are looked through, so
/// `spawn(tokio::time::timeout(d, work()))` is named after `work`. A future
/// with no user type at all, such as a bare channel receiver, is named after
/// the function that spawned it.
#[track_caller]
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let location = Location::caller();
    match capture::current() {
        Some(recorder) => {
            let name = task_name_of::<F>();
            tokio::spawn(track(recorder, name, "leakscope::spawn", location, future))
        }
        None => tokio::spawn(future),
    }
}

/// Spawns a task with an explicit name.
#[track_caller]
pub fn spawn_named<F>(name: impl Into<String>, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let location = Location::caller();
    match capture::current() {
        Some(recorder) => {
            let name = Some(name.into());
            tokio::spawn(track(recorder, name, "leakscope::spawn_named", location, future))
        }
        None => tokio::spawn(future),
    }
}

fn track<F: Future>(
    recorder: Arc<Recorder>,
    name: Option<String>,
    spawner: &str,
    location: &'static Location<'static>,
    future: F,
) -> TrackedFuture<F> {
    let stack = capture_spawn_stack(spawner, location, recorder.config());
    let name = name.unwrap_or_else(|| spawn_site_name(&stack, location));
    let id = recorder.on_spawn(&name, current_task_id(), stack);
    TrackedFuture {
        inner: future,
        recorder,
        id,
        started: false,
        blocked: false,
        finished: false,
    }
}

/// Future wrapper recording start, block, unblock and end events.
#[pin_project(PinnedDrop)]
pub struct TrackedFuture<F> {
    #[pin]
    inner: F,
    recorder: Arc<Recorder>,
    id: TaskId,
    started: bool,
    blocked: bool,
    finished: bool,
}

impl<F: Future> Future for TrackedFuture<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let id = *this.id;

        if !*this.started {
            *this.started = true;
            this.recorder.on_event(id, EventKind::TaskStart);
        } else if *this.blocked {
            this.recorder.on_event(id, EventKind::TaskUnblock);
        }

        let inner = this.inner;
        let result = CURRENT_TASK.sync_scope(id, || inner.poll(cx));

        match result {
            Poll::Ready(_) => {
                *this.finished = true;
                *this.blocked = false;
                this.recorder.on_event(id, EventKind::TaskEnd);
            }
            Poll::Pending => {
                *this.blocked = true;
                this.recorder.on_event(id, EventKind::TaskBlock);
            }
        }

        result
    }
}

#[pinned_drop]
impl<F> PinnedDrop for TrackedFuture<F> {
    fn drop(self: Pin<&mut Self>) {
        let this = self.project();
        // an aborted or shut-down task no longer exists, so it ends here
        if !*this.finished {
            this.recorder.on_event(*this.id, EventKind::TaskEnd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::tests::SLOT;
    use crate::config::CaptureConfig;
    use leakscope_core::codec::decode_bytes;
    use std::sync::PoisonError;

    async fn finishes() {}

    #[tokio::test]
    async fn test_tracked_task_records_full_lifecycle() {
        let _serial = SLOT.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = capture::acquire(CaptureConfig::default().with_backtraces(false)).unwrap();

        spawn(finishes()).await.unwrap();

        let table = decode_bytes(&handle.release()).unwrap();
        let kinds: Vec<_> = table.events().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::TaskCreate, EventKind::TaskStart, EventKind::TaskEnd]
        );
        let task = table.events()[0].task;
        assert!(table.task_name(task).ends_with("task::tests::finishes"));
    }

    #[tokio::test]
    async fn test_blocked_task_has_no_end() {
        let _serial = SLOT.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = capture::acquire(CaptureConfig::default().with_backtraces(false)).unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let blocked = spawn_named("app::waiter", async move {
            let _ = rx.await;
        });
        tokio::task::yield_now().await;

        let table = decode_bytes(&handle.release()).unwrap();
        let last = table.events().last().unwrap();
        assert_eq!(last.kind, EventKind::TaskBlock);
        assert_eq!(table.task_name(last.task), "app::waiter");

        drop(tx);
        blocked.await.unwrap();
    }

    #[tokio::test]
    async fn test_child_records_parent() {
        let _serial = SLOT.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = capture::acquire(CaptureConfig::default().with_backtraces(false)).unwrap();

        spawn_named("app::parent", async {
            spawn_named("app::child", async {}).await.unwrap();
        })
        .await
        .unwrap();

        let table = decode_bytes(&handle.release()).unwrap();
        let child = table.tasks().find(|t| t.name == "app::child").unwrap();
        let parent = table.tasks().find(|t| t.name == "app::parent").unwrap();
        assert_eq!(child.parent, Some(parent.id));
    }

    #[tokio::test]
    async fn test_spawn_outside_capture_is_untracked() {
        let _serial = SLOT.lock().unwrap_or_else(PoisonError::into_inner);
        assert!(!capture::is_active());
        assert_eq!(spawn(async { 7 }).await.unwrap(), 7);
    }
}
