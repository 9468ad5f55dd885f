//! Audio output for the adzan recording.

use crate::error::Result;
use std::time::Duration;
use tracing::debug;

const LOG_TARGET: &str = "sholat::audio";

/// A single playable adzan recording.
///
/// Implementations must tolerate `stop()` when nothing is playing and a
/// `play()` while already playing (restart at the new offset).
pub trait AudioSink: Send + Sync {
    /// Start playback at `offset` into the recording.
    ///
    /// # Errors
    ///
    /// Returns an error if playback cannot start (no device, missing file).
    fn play(&self, offset: Duration) -> Result<()>;

    /// Stop playback and rewind to the start.
    fn stop(&self);
}

/// Sink that plays nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudioSink;

impl AudioSink for NullAudioSink {
    fn play(&self, offset: Duration) -> Result<()> {
        debug!(target: LOG_TARGET, "Audio disabled, skipping playback at {:?}", offset);
        Ok(())
    }

    fn stop(&self) {}
}
