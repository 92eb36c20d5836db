//! Playback outputs.
//!
//! An [`AudioOutput`] is opened lazily into an [`AudioSink`], which the
//! narration controller keeps for the life of a quiz and drops on teardown.
//! Every call to [`AudioSink::play`] returns a [`Playback`] handle that can be
//! stopped at any time and reports how the sound ended.

use std::path::PathBuf;
use std::process::Stdio;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, info, warn};

use crate::pcm::AudioBuffer;
use crate::wav::encode_wav;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio device unavailable: {0}")]
    Device(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// The whole buffer was played.
    Completed,
    /// Cancelled through [`Playback::stop`] or by dropping the handle.
    Stopped,
    /// The output gave up part way (player crashed, spool write failed).
    Failed,
}

/// Handle to one sound in flight. Dropping it stops the sound.
#[derive(Debug)]
pub struct Playback {
    cancel: CancellationToken,
    finished: Option<oneshot::Receiver<PlaybackEnd>>,
}

/// Output-side half of a [`Playback`].
#[derive(Debug)]
pub struct PlaybackDriver {
    cancel: CancellationToken,
    done: oneshot::Sender<PlaybackEnd>,
}

impl Playback {
    /// Create a connected handle/driver pair.
    pub fn channel() -> (Playback, PlaybackDriver) {
        let cancel = CancellationToken::new();
        let (done, finished) = oneshot::channel();
        (
            Playback {
                cancel: cancel.clone(),
                finished: Some(finished),
            },
            PlaybackDriver { cancel, done },
        )
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Receiver that resolves once the output is done with this sound.
    ///
    /// Can be taken only once. A closed receiver means the output went away
    /// without reporting, which callers treat as [`PlaybackEnd::Stopped`].
    pub fn take_finished(&mut self) -> Option<oneshot::Receiver<PlaybackEnd>> {
        self.finished.take()
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl PlaybackDriver {
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn finish(self, end: PlaybackEnd) {
        let _ = self.done.send(end);
    }
}

/// Something that can be opened into a sink.
pub trait AudioOutput: Send + Sync {
    fn open(&self) -> Result<Box<dyn AudioSink>, PlaybackError>;
}

/// An open output. Must be called from within a Tokio runtime.
pub trait AudioSink: Send {
    fn play(&mut self, buffer: AudioBuffer) -> Result<Playback, PlaybackError>;
}

/// Output that plays nothing but takes as long as the sound would.
///
/// Used when no player is configured so narration still walks through
/// Loading, Playing and back to Idle with realistic timing.
#[derive(Debug, Clone, Default)]
pub struct SilentOutput;

struct SilentSink;

impl AudioOutput for SilentOutput {
    fn open(&self) -> Result<Box<dyn AudioSink>, PlaybackError> {
        Ok(Box::new(SilentSink))
    }
}

impl AudioSink for SilentSink {
    fn play(&mut self, buffer: AudioBuffer) -> Result<Playback, PlaybackError> {
        let (playback, driver) = Playback::channel();
        let duration = buffer.duration();
        debug!(frames = buffer.frames(), ?duration, "Silent playback started");

        tokio::spawn(async move {
            let end = tokio::select! {
                _ = tokio::time::sleep(duration) => PlaybackEnd::Completed,
                _ = driver.cancelled() => PlaybackEnd::Stopped,
            };
            driver.finish(end);
        });

        Ok(playback)
    }
}

/// Output that writes each sound to a WAV file and hands it to an external
/// player, e.g. `["aplay", "-q"]` or `["afplay"]`. The file path is appended
/// as the last argument.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    argv: Vec<String>,
    spool_dir: PathBuf,
}

impl CommandOutput {
    pub fn new(argv: Vec<String>, spool_dir: impl Into<PathBuf>) -> Self {
        Self {
            argv,
            spool_dir: spool_dir.into(),
        }
    }
}

struct CommandSink {
    program: String,
    args: Vec<String>,
    spool_dir: PathBuf,
}

impl AudioOutput for CommandOutput {
    fn open(&self) -> Result<Box<dyn AudioSink>, PlaybackError> {
        let Some((program, args)) = self.argv.split_first() else {
            return Err(PlaybackError::Device("player command is empty".into()));
        };
        std::fs::create_dir_all(&self.spool_dir)?;
        info!(player = %program, spool = %self.spool_dir.display(), "Audio output opened");

        Ok(Box::new(CommandSink {
            program: program.clone(),
            args: args.to_vec(),
            spool_dir: self.spool_dir.clone(),
        }))
    }
}

/// Spool file name: `narration_<timestamp>_<id>.wav`.
fn spool_filename() -> String {
    let ts = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("narration_{ts}_{}.wav", &id[..8])
}

impl AudioSink for CommandSink {
    fn play(&mut self, buffer: AudioBuffer) -> Result<Playback, PlaybackError> {
        let (playback, driver) = Playback::channel();
        let path = self.spool_dir.join(spool_filename());
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.args)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        tokio::spawn(async move {
            let end = run_player(command, &path, &buffer, &driver).await;
            if let Err(e) = tokio::fs::remove_file(&path).await {
                debug!(path = %path.display(), %e, "Spool file not removed");
            }
            driver.finish(end);
        });

        Ok(playback)
    }
}

async fn run_player(
    mut command: tokio::process::Command,
    path: &std::path::Path,
    buffer: &AudioBuffer,
    driver: &PlaybackDriver,
) -> PlaybackEnd {
    if let Err(e) = tokio::fs::write(path, encode_wav(buffer)).await {
        warn!(path = %path.display(), %e, "Failed to write narration audio");
        return PlaybackEnd::Failed;
    }
    if driver.is_cancelled() {
        return PlaybackEnd::Stopped;
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(%e, "Failed to start audio player");
            return PlaybackEnd::Failed;
        }
    };

    tokio::select! {
        status = child.wait() => match status {
            Ok(status) if status.success() => PlaybackEnd::Completed,
            Ok(status) => {
                warn!(code = ?status.code(), "Audio player exited with failure");
                PlaybackEnd::Failed
            }
            Err(e) => {
                warn!(%e, "Failed waiting for audio player");
                PlaybackEnd::Failed
            }
        },
        _ = driver.cancelled() => {
            if let Err(e) = child.kill().await {
                debug!(%e, "Audio player already gone");
            }
            PlaybackEnd::Stopped
        }
    }
}
