//! Process-wide capture slot.
//!
//! At most one capture may be active per process. [`acquire`] claims the
//! slot and fails with [`CaptureStartError::AlreadyActive`] instead of
//! replacing the active recorder; [`CaptureHandle::release`] frees it again.

use std::sync::{Arc, Mutex, PoisonError};

use leakscope_core::CaptureStartError;

use crate::config::CaptureConfig;
use crate::recorder::Recorder;

/// The active recorder, if a capture is running.
static ACTIVE: Mutex<Option<Arc<Recorder>>> = Mutex::new(None);

/// Exclusive ownership of the process-wide capture slot.
///
/// Dropping the handle releases the slot and discards the buffer.
pub struct CaptureHandle {
    recorder: Option<Arc<Recorder>>,
}

/// Claims the capture slot and starts recording.
pub fn acquire(config: CaptureConfig) -> Result<CaptureHandle, CaptureStartError> {
    let mut active = ACTIVE.lock().unwrap_or_else(PoisonError::into_inner);
    if active.is_some() {
        tracing::debug!("capture slot already taken");
        return Err(CaptureStartError::AlreadyActive);
    }

    let recorder = Arc::new(Recorder::new(config));
    *active = Some(Arc::clone(&recorder));
    tracing::debug!("capture started");

    Ok(CaptureHandle {
        recorder: Some(recorder),
    })
}

/// Returns whether a capture is currently active in this process.
pub fn is_active() -> bool {
    ACTIVE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
}

/// The recorder of the active capture, if any.
pub(crate) fn current() -> Option<Arc<Recorder>> {
    ACTIVE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

impl CaptureHandle {
    /// Releases the slot and returns the encoded capture.
    pub fn release(mut self) -> Vec<u8> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Vec<u8> {
        let Some(recorder) = self.recorder.take() else {
            return Vec::new();
        };

        let mut active = ACTIVE.lock().unwrap_or_else(PoisonError::into_inner);
        if active
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &recorder))
        {
            *active = None;
        }
        drop(active);

        let bytes = recorder.finish();
        tracing::debug!(bytes = bytes.len(), "capture stopped");
        bytes
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Serializes tests that touch the process-wide slot.
    pub(crate) static SLOT: Mutex<()> = Mutex::new(());

    #[test]
    fn test_second_acquire_fails_until_release() {
        let _serial = SLOT.lock().unwrap_or_else(PoisonError::into_inner);

        let handle = acquire(CaptureConfig::default()).unwrap();
        assert!(is_active());
        assert_eq!(
            acquire(CaptureConfig::default()).err(),
            Some(CaptureStartError::AlreadyActive)
        );

        let bytes = handle.release();
        assert!(!bytes.is_empty());
        assert!(!is_active());

        let again = acquire(CaptureConfig::default()).unwrap();
        drop(again);
        assert!(!is_active());
    }

    #[test]
    fn test_failed_acquire_keeps_active_buffer() {
        let _serial = SLOT.lock().unwrap_or_else(PoisonError::into_inner);

        let handle = acquire(CaptureConfig::default()).unwrap();
        let recorder = current().unwrap();
        recorder.on_spawn("app::a", None, Vec::new());

        assert!(acquire(CaptureConfig::default()).is_err());
        assert!(Arc::ptr_eq(&recorder, &current().unwrap()));

        let table = leakscope_core::codec::decode_bytes(&handle.release()).unwrap();
        assert_eq!(table.len(), 1);
    }
}
