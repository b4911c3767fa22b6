//! Recording sink for unit and integration testing.
//!
//! Lets tests observe exactly which frames a peer was handed, and simulate a
//! dead socket, without running a WebSocket server.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use super::sink::{FrameSink, SinkError};

/// A [`FrameSink`] that stores every frame it receives.
///
/// Clones share the same buffer, so a test can keep one handle and give the
/// other to the registry.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<Arc<str>>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingSink {
    /// Creates a healthy sink with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink whose every send fails, like a dead socket.
    pub fn failing() -> Self {
        let sink = Self::new();
        sink.set_failing(true);
        sink
    }

    /// Switches failure simulation on or off.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Frames received so far, oldest first.
    pub fn received(&self) -> Vec<String> {
        self.frames
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|f| f.to_string())
            .collect()
    }

    /// Number of frames received so far.
    pub fn count(&self) -> usize {
        self.frames.lock().expect("lock poisoned").len()
    }
}

impl FrameSink for RecordingSink {
    fn send_frame(&self, frame: Arc<str>) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Closed);
        }
        self.frames.lock().expect("lock poisoned").push(frame);
        Ok(())
    }
}
