//! Speech synthesis backends.
//!
//! The playback controller talks to a [`SpeechEngine`], which starts one
//! utterance at a time and reports word-boundary and completion events
//! over a channel. The default backend shells out to the platform speech
//! command (`say` on macOS, `espeak-ng`/`espeak` elsewhere); since those
//! commands do not report word boundaries themselves, boundaries are
//! paced from the utterance rate while the child process runs.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Speaking rate in words per minute at `rate == 1.0`.
const BASE_WPM: f32 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechEventKind {
    WordBoundary,
    Finished,
}

/// An event from the engine, tagged with the utterance that produced it
/// so events from a cancelled utterance can be discarded.
#[derive(Debug, Clone, Copy)]
pub struct SpeechEvent {
    pub utterance: u64,
    pub kind: SpeechEventKind,
}

#[derive(Debug, Clone, Copy)]
pub struct UtteranceParams {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for UtteranceParams {
    fn default() -> Self {
        // Slightly below normal rate for comprehension
        Self {
            rate: 0.9,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no speech engine available")]
    Unavailable,

    #[error("failed to start speech engine: {0}")]
    Spawn(#[source] std::io::Error),
}

/// One active utterance at a time; `speak` implicitly cancels any prior
/// utterance, and `cancel` is idempotent when idle.
pub trait SpeechEngine: Send {
    fn speak(
        &mut self,
        utterance: u64,
        text: &str,
        params: UtteranceParams,
        events: mpsc::UnboundedSender<SpeechEvent>,
    ) -> Result<(), EngineError>;

    fn cancel(&mut self);
}

enum Flavor {
    Say,
    Espeak,
}

struct ActiveUtterance {
    cancel: Arc<Notify>,
    _task: JoinHandle<()>,
}

/// Speech via the platform speech command as a child process per
/// utterance. Cancellation kills the child.
pub struct CommandEngine {
    program: PathBuf,
    flavor: Flavor,
    active: Option<ActiveUtterance>,
}

impl CommandEngine {
    /// Find a usable speech command on PATH. `None` means no engine is
    /// installed; callers treat that as a silent no-op, not an error.
    pub fn detect() -> Option<Self> {
        for (name, flavor) in [
            ("say", Flavor::Say),
            ("espeak-ng", Flavor::Espeak),
            ("espeak", Flavor::Espeak),
        ] {
            if let Some(program) = find_in_path(name) {
                debug!(program = %program.display(), "speech engine detected");
                return Some(Self {
                    program,
                    flavor,
                    active: None,
                });
            }
        }
        debug!("no speech engine found on PATH");
        None
    }

    fn command(&self, text: &str, params: UtteranceParams) -> Command {
        let wpm = (BASE_WPM * params.rate).round() as u32;
        let mut cmd = Command::new(&self.program);
        match self.flavor {
            Flavor::Say => {
                cmd.arg("-r").arg(wpm.to_string());
            }
            Flavor::Espeak => {
                let pitch = (params.pitch * 50.0).clamp(0.0, 99.0).round() as u32;
                let volume = (params.volume * 100.0).clamp(0.0, 200.0).round() as u32;
                cmd.arg("-s")
                    .arg(wpm.to_string())
                    .arg("-p")
                    .arg(pitch.to_string())
                    .arg("-a")
                    .arg(volume.to_string());
            }
        }
        cmd.arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

impl SpeechEngine for CommandEngine {
    fn speak(
        &mut self,
        utterance: u64,
        text: &str,
        params: UtteranceParams,
        events: mpsc::UnboundedSender<SpeechEvent>,
    ) -> Result<(), EngineError> {
        self.cancel();

        let mut child = self
            .command(text, params)
            .spawn()
            .map_err(EngineError::Spawn)?;

        let word_count = text.split_whitespace().count();
        let wpm = (BASE_WPM * params.rate).max(1.0);
        let per_word = Duration::from_secs_f32(60.0 / wpm);

        let cancel = Arc::new(Notify::new());
        let cancelled = cancel.clone();
        let task = tokio::spawn(async move {
            let mut boundaries = tokio::time::interval(per_word);
            let mut emitted = 0usize;
            loop {
                tokio::select! {
                    _ = cancelled.notified() => {
                        if let Err(err) = child.kill().await {
                            warn!(%err, "failed to kill speech process");
                        }
                        return;
                    }
                    _ = child.wait() => {
                        let _ = events.send(SpeechEvent {
                            utterance,
                            kind: SpeechEventKind::Finished,
                        });
                        return;
                    }
                    _ = boundaries.tick(), if emitted < word_count => {
                        let _ = events.send(SpeechEvent {
                            utterance,
                            kind: SpeechEventKind::WordBoundary,
                        });
                        emitted += 1;
                    }
                }
            }
        });

        self.active = Some(ActiveUtterance {
            cancel,
            _task: task,
        });
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.notify_one();
        }
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_slow_the_rate() {
        let params = UtteranceParams::default();
        assert!(params.rate < 1.0);
        assert_eq!(params.volume, 1.0);
    }

    #[test]
    fn test_find_in_path_misses_nonexistent_binary() {
        assert!(find_in_path("definitely-not-a-real-binary-1b2c3").is_none());
    }
}
