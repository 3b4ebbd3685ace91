//! In-memory recorder.
//!
//! Records lifecycle calls without touching disk. Used by tests to observe
//! exactly what the controller drives, with injectable failures; the same
//! role the scripted detector plays on the inference side.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::episode::ArtifactMetadata;
use crate::frame::Frame;
use crate::recording::recorder::{Recorder, RecorderError, RecorderHandle, RecorderMode};

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    begin_calls: u64,
    fail_begin_remaining: u32,
    fail_next_write: bool,
    sessions: HashMap<u64, MemorySession>,
}

struct MemorySession {
    mode: RecorderMode,
    frames_written: u64,
    confidence_sum: f64,
    first_ts: Option<Duration>,
    last_ts: Option<Duration>,
}

/// Shared-state in-memory recorder. Clones observe the same state, so a test
/// can keep a probe clone while the controller owns the boxed original.
#[derive(Clone)]
pub struct MemoryRecorder {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    /// Make the next `n` `begin` calls fail with `Unavailable`.
    pub fn fail_begin(&self, n: u32) {
        self.state.lock().unwrap().fail_begin_remaining = n;
    }

    /// Make the next `write` call fail with `Io`.
    pub fn fail_next_write(&self) {
        self.state.lock().unwrap().fail_next_write = true;
    }

    /// Total `begin` calls, including failed ones.
    pub fn begin_calls(&self) -> u64 {
        self.state.lock().unwrap().begin_calls
    }

    /// Artifacts currently open (begun but not ended).
    pub fn open_sessions(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }
}

impl Default for MemoryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder for MemoryRecorder {
    fn begin(&mut self, mode: RecorderMode) -> Result<RecorderHandle, RecorderError> {
        let mut state = self.state.lock().unwrap();
        state.begin_calls += 1;
        if state.fail_begin_remaining > 0 {
            state.fail_begin_remaining -= 1;
            return Err(RecorderError::Unavailable("injected begin failure".into()));
        }

        state.next_id += 1;
        let id = state.next_id;
        state.sessions.insert(
            id,
            MemorySession {
                mode,
                frames_written: 0,
                confidence_sum: 0.0,
                first_ts: None,
                last_ts: None,
            },
        );
        Ok(RecorderHandle::new(id, mode))
    }

    fn write(
        &mut self,
        handle: &RecorderHandle,
        frame: &Frame,
        confidence: f32,
    ) -> Result<(), RecorderError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_write {
            state.fail_next_write = false;
            return Err(RecorderError::Io("injected write failure".into()));
        }
        let session = state
            .sessions
            .get_mut(&handle.id())
            .ok_or_else(|| RecorderError::Io(format!("unknown session {}", handle.id())))?;

        session.frames_written += 1;
        session.confidence_sum += confidence as f64;
        if session.first_ts.is_none() {
            session.first_ts = Some(frame.timestamp);
        }
        session.last_ts = Some(frame.timestamp);
        Ok(())
    }

    fn end(&mut self, handle: RecorderHandle) -> Result<ArtifactMetadata, RecorderError> {
        let mut state = self.state.lock().unwrap();
        let session = state
            .sessions
            .remove(&handle.id())
            .ok_or_else(|| RecorderError::Io(format!("unknown session {}", handle.id())))?;

        let duration_s = match (session.first_ts, session.last_ts) {
            (Some(first), Some(last)) => last.saturating_sub(first).as_secs_f64(),
            _ => 0.0,
        };
        let average_confidence = if session.frames_written > 0 {
            (session.confidence_sum / session.frames_written as f64) as f32
        } else {
            0.0
        };

        Ok(ArtifactMetadata {
            path: PathBuf::from(format!("mem://{}-{}", session.mode, handle.id())),
            mode: session.mode,
            frames_written: session.frames_written,
            duration_s,
            average_confidence,
        })
    }
}
