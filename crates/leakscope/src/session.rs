//! Observation windows over spawned tasks.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::{Mutex, OnceLock, PoisonError};

use leakscope_analysis::{Analyzer, LeakReport};
use leakscope_core::codec;
use leakscope_core::{DecodeError, Error, EventTable, Result};
use leakscope_runtime::{CaptureConfig, CaptureHandle};

/// Lifecycle of a [`Session`]. No transition leaves `Decoded`.
///
/// There is no separate created state: [`Session::start_with`] returns a
/// session that is already `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Capturing task events.
    Active,
    /// Capture closed; buffer not decoded yet.
    Stopped,
    /// Buffer decoded; results are served from the decoded table.
    Decoded,
}

/// A single capture window.
///
/// Only one session may be active per process. Stopping is idempotent and
/// happens implicitly on the first query or when the session is dropped.
pub struct Session {
    capture: Mutex<Option<CaptureHandle>>,
    buffer: OnceLock<Vec<u8>>,
    decoded: OnceLock<std::result::Result<EventTable, DecodeError>>,
}

/// Starts a capture session configured from the environment.
pub fn start() -> Result<Session> {
    Session::start_with(CaptureConfig::from_env())
}

impl Session {
    /// Starts a capture session with an explicit configuration.
    ///
    /// Fails with [`Error::CaptureStart`] while another session is active.
    pub fn start_with(config: CaptureConfig) -> Result<Session> {
        let capture = leakscope_runtime::acquire(config)?;
        Ok(Session {
            capture: Mutex::new(Some(capture)),
            buffer: OnceLock::new(),
            decoded: OnceLock::new(),
        })
    }

    pub fn state(&self) -> SessionState {
        if self.decoded.get().is_some() {
            SessionState::Decoded
        } else if self.buffer.get().is_some() {
            SessionState::Stopped
        } else {
            SessionState::Active
        }
    }

    /// Stops the capture. Only the first call has an effect, including
    /// under concurrent callers.
    pub fn stop(&self) {
        self.stopped_buffer();
    }

    fn stopped_buffer(&self) -> &[u8] {
        self.buffer.get_or_init(|| {
            let capture = self
                .capture
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            capture.map(CaptureHandle::release).unwrap_or_default()
        })
    }

    /// Decodes the capture once and serves every later call from the cache.
    fn table(&self) -> Result<&EventTable> {
        self.decoded
            .get_or_init(|| codec::decode_bytes(self.stopped_buffer()))
            .as_ref()
            .map_err(|e| Error::Decode(e.clone()))
    }

    /// Returns the tasks spawned during the window that never terminated.
    ///
    /// `allow_list` entries are appended to the built-in defaults. Stops the
    /// session if needed. The capture is decoded on the first call only.
    pub fn leaks(&self, allow_list: &[&str]) -> Result<LeakReport> {
        let table = self.table()?;
        Analyzer::with_allow_list(allow_list).analyze(table)
    }

    /// Fails with [`Error::LeakCountMismatch`] unless exactly `want` tasks
    /// leaked.
    pub fn assert_leak_count(&self, want: usize, allow_list: &[&str]) -> Result<()> {
        let report = self.leaks(allow_list)?;
        if report.count != want {
            return Err(Error::LeakCountMismatch {
                got: report.count,
                want,
                reports: report.reports(),
            });
        }
        Ok(())
    }

    /// Stops the session and writes the raw capture to `path` for later
    /// analysis with [`leaks_from_capture`].
    pub fn save_capture(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.stopped_buffer())?;
        tracing::debug!(path = %path.as_ref().display(), "capture saved");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs leak detection over a capture previously saved to `path`.
pub fn leaks_from_capture(path: impl AsRef<Path>, allow_list: &[&str]) -> Result<LeakReport> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| Error::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    leaks_from_reader(file, allow_list)
}

/// Runs leak detection over a capture read from `reader`.
pub fn leaks_from_reader<R: Read>(reader: R, allow_list: &[&str]) -> Result<LeakReport> {
    let table = codec::decode(reader)?;
    Analyzer::with_allow_list(allow_list).analyze(&table)
}
