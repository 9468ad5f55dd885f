//! Adzan output for the terminal.

use std::io::Write;
use std::time::Duration;

use sholat_core::{AudioSink, Result};
use tracing::info;

const LOG_TARGET: &str = "sholat::audio";

/// Rings the terminal bell when an adzan starts.
#[derive(Debug, Default)]
pub struct BellAudioSink;

impl AudioSink for BellAudioSink {
    fn play(&self, offset: Duration) -> Result<()> {
        info!(target: LOG_TARGET, "Adzan started ({}s into the window)", offset.as_secs());
        // Only ring when the adzan is starting, not when resuming after a restart
        if offset.is_zero() {
            let mut stdout = std::io::stdout();
            stdout.write_all(b"\x07")?;
            stdout.flush()?;
        }
        Ok(())
    }

    fn stop(&self) {}
}

#[cfg(feature = "audio")]
pub use rodio_sink::RodioAudioSink;

#[cfg(feature = "audio")]
mod rodio_sink {
    use std::fs::File;
    use std::io::BufReader;
    use std::path::{Path, PathBuf};
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::time::Duration;

    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
    use sholat_core::{AudioSink, CoreError, Result};
    use tracing::{debug, warn};

    use super::LOG_TARGET;

    enum Command {
        Play(Duration),
        Stop,
    }

    /// Plays an adzan recording through the default output device.
    ///
    /// `rodio`'s output stream is not `Send`, so playback lives on a dedicated
    /// thread driven over a channel. The thread exits when the sink is dropped.
    pub struct RodioAudioSink {
        commands: Sender<Command>,
    }

    impl RodioAudioSink {
        /// Spawn the playback thread for `path` at `volume` (0-100).
        ///
        /// # Errors
        ///
        /// Returns `AudioError` if the file does not exist or the thread
        /// cannot be spawned.
        pub fn new(path: impl Into<PathBuf>, volume: u8) -> Result<Self> {
            let path = path.into();
            if !path.is_file() {
                return Err(CoreError::AudioError {
                    reason: format!("adzan file not found: {}", path.display()),
                });
            }

            let (tx, rx) = mpsc::channel();
            std::thread::Builder::new()
                .name("sholat-audio".to_string())
                .spawn(move || run(&path, volume, &rx))
                .map_err(|e| CoreError::AudioError {
                    reason: format!("failed to spawn audio thread: {e}"),
                })?;

            Ok(Self { commands: tx })
        }

        fn send(&self, command: Command) -> Result<()> {
            self.commands.send(command).map_err(|_| CoreError::AudioError {
                reason: "audio thread is not running".to_string(),
            })
        }
    }

    impl AudioSink for RodioAudioSink {
        fn play(&self, offset: Duration) -> Result<()> {
            self.send(Command::Play(offset))
        }

        fn stop(&self) {
            let _ = self.send(Command::Stop);
        }
    }

    fn run(path: &Path, volume: u8, commands: &Receiver<Command>) {
        let Ok((_stream, handle)) = OutputStream::try_default() else {
            warn!(target: LOG_TARGET, "No audio output device, adzan playback disabled");
            return;
        };

        let mut current: Option<Sink> = None;
        while let Ok(command) = commands.recv() {
            if let Some(sink) = current.take() {
                sink.stop();
            }
            match command {
                Command::Play(offset) => match start(&handle, path, volume, offset) {
                    Ok(sink) => {
                        debug!(target: LOG_TARGET, "Playing {} from {:?}", path.display(), offset);
                        current = Some(sink);
                    }
                    Err(e) => warn!(target: LOG_TARGET, "Failed to play adzan: {}", e),
                },
                Command::Stop => {}
            }
        }
        debug!(target: LOG_TARGET, "Audio thread exiting");
    }

    fn start(handle: &OutputStreamHandle, path: &Path, volume: u8, offset: Duration) -> Result<Sink> {
        let file = File::open(path)?;
        let source = Decoder::new(BufReader::new(file)).map_err(|e| CoreError::AudioError {
            reason: e.to_string(),
        })?;
        let sink = Sink::try_new(handle).map_err(|e| CoreError::AudioError {
            reason: e.to_string(),
        })?;
        sink.set_volume(f32::from(volume) / 100.0);
        sink.append(source.skip_duration(offset));
        Ok(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bell_sink_never_fails() {
        let sink = BellAudioSink;
        assert!(sink.play(Duration::from_secs(120)).is_ok());
        sink.stop();
    }

    #[cfg(feature = "audio")]
    #[test]
    fn test_rodio_sink_rejects_missing_file() {
        let err = RodioAudioSink::new("/nonexistent/adzan.mp3", 80).err();
        assert!(matches!(err, Some(sholat_core::CoreError::AudioError { .. })));
    }
}
