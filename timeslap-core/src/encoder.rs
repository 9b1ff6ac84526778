//! Encoder subprocess lifecycle management.
//!
//! [`FfmpegEncoder`] owns exactly one ffmpeg subprocess at a time: it spawns
//! the process, streams its merged output through the progress parser, and
//! reports progress, raw output, and completion through caller-supplied
//! callbacks. The read loop is blocking and sequential; callers run
//! [`FfmpegEncoder::wait_for_completion`] off their main control thread and
//! dispatch the callbacks onto whatever thread owns their UI state.
//!
//! Cancellation is the only operation allowed to race the read loop. The
//! terminal state (`Completed`, `Failed`, or `Cancelled`) is decided exactly
//! once, under the state lock, after the process has fully terminated.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::command::FfmpegCommandBuilder;
use crate::config::EncodingConfig;
use crate::error::{CoreError, CoreResult};
use crate::progress::ProgressParser;
use crate::sequence::{self, SequenceInfo};

/// How long a graceful cancellation may take before the process is killed.
const TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while waiting for a cancelled process to exit.
const TERMINATE_POLL: Duration = Duration::from_millis(100);

/// Lifecycle of one encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    Idle,
    Starting,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl EncoderState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Callbacks the orchestrator reports through. All optional; each is invoked
/// from the thread running [`FfmpegEncoder::wait_for_completion`].
#[derive(Default)]
pub struct EncoderCallbacks {
    /// Fires when a progress percentage could be computed for an output line.
    pub on_progress: Option<Box<dyn Fn(u8) + Send>>,
    /// Fires for every output line, verbatim, progress or not.
    pub on_output: Option<Box<dyn Fn(&str) + Send>>,
    /// Fires exactly once with (success, message) when the encode reaches a
    /// terminal state.
    pub on_finished: Option<Box<dyn Fn(bool, &str) + Send>>,
}

/// Classified failure information for a terminal encoder error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Short, user-facing description of what went wrong.
    pub user_message: String,
    /// Remediation hint followed by the raw encoder output.
    pub technical_details: String,
    /// Whether changing the configuration can plausibly fix it.
    pub recoverable: bool,
}

struct ErrorPattern {
    pattern: Regex,
    message: &'static str,
    hint: &'static str,
    recoverable: bool,
}

/// Ordered error classification table, evaluated top to bottom; the first
/// matching pattern wins. New patterns are additive.
static ERROR_PATTERNS: Lazy<Vec<ErrorPattern>> = Lazy::new(|| {
    let entry = |pattern: &str, message, hint, recoverable| ErrorPattern {
        pattern: Regex::new(pattern).expect("valid error pattern"),
        message,
        hint,
        recoverable,
    };
    vec![
        entry(
            r"(?i)No such file or directory",
            "Input file not found",
            "Check the input folder and the file names",
            true,
        ),
        entry(
            r"(?i)Invalid pixel format",
            "Invalid pixel format",
            "The selected pixel format is not supported by this codec",
            true,
        ),
        entry(
            r"(?i)height not divisible by 2",
            "Image height not divisible by 2",
            "Enable the padding filter for odd dimensions",
            true,
        ),
        entry(
            r"(?i)width not divisible by 2",
            "Image width not divisible by 2",
            "Enable the padding filter for odd dimensions",
            true,
        ),
        entry(
            r"(?i)Permission denied",
            "Permission denied",
            "No write permission for the output folder",
            true,
        ),
        entry(
            r"(?i)Codec .* not found",
            "Codec not found",
            "The selected codec is not available in this ffmpeg installation",
            false,
        ),
        entry(
            r"(?i)Unknown encoder",
            "Unknown encoder",
            "The selected codec is not available in this ffmpeg installation",
            false,
        ),
    ]
});

/// Classifies raw encoder output into user-facing error information.
///
/// Patterns are tried in table order; without a match the full raw text
/// becomes the technical detail of a generic, non-recoverable error.
#[must_use]
pub fn classify_error(output: &str) -> ErrorInfo {
    for entry in ERROR_PATTERNS.iter() {
        if entry.pattern.is_match(output) {
            return ErrorInfo {
                user_message: entry.message.to_string(),
                technical_details: format!("{}\n\n{}", entry.hint, output),
                recoverable: entry.recoverable,
            };
        }
    }

    ErrorInfo {
        user_message: "An unknown error occurred".to_string(),
        technical_details: output.to_string(),
        recoverable: false,
    }
}

/// Manages one ffmpeg encoding process.
pub struct FfmpegEncoder {
    config: EncodingConfig,
    sequence: SequenceInfo,
    ffmpeg_path: std::path::PathBuf,
    command: Vec<String>,
    parser: ProgressParser,
    callbacks: EncoderCallbacks,
    state: Arc<Mutex<EncoderState>>,
    child: Arc<Mutex<Option<Child>>>,
    cancel_requested: Arc<AtomicBool>,
}

impl FfmpegEncoder {
    /// Creates an encoder for the given configuration and analyzed sequence.
    /// `ffmpeg_path` is the executable the caller located; discovery is not
    /// this crate's concern.
    #[must_use]
    pub fn new(
        config: EncodingConfig,
        sequence: SequenceInfo,
        ffmpeg_path: impl Into<std::path::PathBuf>,
    ) -> Self {
        let ffmpeg_path = ffmpeg_path.into();
        let command = FfmpegCommandBuilder::new(&config, &sequence, &ffmpeg_path).build();
        let parser = ProgressParser::new(Some(sequence.count as u64));

        Self {
            config,
            sequence,
            ffmpeg_path,
            command,
            parser,
            callbacks: EncoderCallbacks::default(),
            state: Arc::new(Mutex::new(EncoderState::Idle)),
            child: Arc::new(Mutex::new(None)),
            cancel_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Installs the progress/output/completion callbacks.
    pub fn set_callbacks(&mut self, callbacks: EncoderCallbacks) {
        self.callbacks = callbacks;
    }

    /// The full argument vector this encoder will run.
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Shell-quoted command string for preview.
    #[must_use]
    pub fn command_string(&self) -> String {
        FfmpegCommandBuilder::new(&self.config, &self.sequence, &self.ffmpeg_path)
            .build_shell_string()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EncoderState {
        *self.state.lock().expect("state lock poisoned")
    }

    /// Starts the encoder subprocess.
    ///
    /// In concat mode the manifest is materialized first and the argument
    /// list rebuilt to include it. A spawn failure is reported immediately
    /// through `on_finished` and the state moves straight to `Failed`; it
    /// never reaches `Running`.
    pub fn start(&mut self) -> CoreResult<()> {
        self.set_state(EncoderState::Starting);

        if self.sequence.use_concat && self.sequence.concat_file.is_none() {
            // The manifest lives next to the images to keep its paths simple.
            // A materialization failure is terminal, exactly like a failed
            // spawn: the state machine must not stay in Starting.
            let manifest = sequence::list_image_files(&self.config.input_folder)
                .and_then(|files| sequence::write_concat_manifest(&files, &self.config.input_folder));
            match manifest {
                Ok(manifest) => {
                    self.sequence.concat_file = Some(manifest);
                    self.command =
                        FfmpegCommandBuilder::new(&self.config, &self.sequence, &self.ffmpeg_path)
                            .build();
                }
                Err(e) => {
                    let message = format!("Failed to prepare concat manifest: {e}");
                    warn!("{message}");
                    self.set_state(EncoderState::Failed);
                    self.notify_finished(false, &message);
                    return Err(e);
                }
            }
        }

        info!("Starting encode: {}", shell_words::join(&self.command));

        let spawned = Command::new(&self.command[0])
            .args(&self.command[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        match spawned {
            Ok(child) => {
                *self.child.lock().expect("child lock poisoned") = Some(child);
                self.set_state(EncoderState::Running);
                Ok(())
            }
            Err(e) => {
                let message = format!("Failed to start encoding: {e}");
                warn!("{message}");
                self.set_state(EncoderState::Failed);
                self.notify_finished(false, &message);
                Err(CoreError::ProcessStart(message))
            }
        }
    }

    /// Blocks until the encode reaches a terminal state, streaming output
    /// through the callbacks on the way. Returns whether the encode
    /// succeeded.
    ///
    /// Standard output and standard error are merged into one line stream;
    /// every line goes to `on_output`, and `on_progress` fires only when a
    /// percentage could be computed. The completion callback is invoked
    /// exactly once.
    pub fn wait_for_completion(&mut self) -> bool {
        let (stdout, stderr) = {
            let mut guard = self.child.lock().expect("child lock poisoned");
            let Some(child) = guard.as_mut() else {
                return false;
            };
            (child.stdout.take(), child.stderr.take())
        };

        let (tx, rx) = mpsc::channel::<String>();
        let readers = [
            stdout.map(|s| spawn_line_reader(s, tx.clone())),
            stderr.map(|s| spawn_line_reader(s, tx.clone())),
        ];
        drop(tx);

        let mut collected_output = String::new();
        for line in rx {
            let progress = self.parser.parse(&line);
            if let (Some(percent), Some(on_progress)) =
                (progress.percentage, self.callbacks.on_progress.as_ref())
            {
                on_progress(percent);
            }
            if let Some(on_output) = self.callbacks.on_output.as_ref() {
                on_output(&line);
            }
            collected_output.push_str(&line);
            collected_output.push('\n');
        }

        for reader in readers.into_iter().flatten() {
            let _ = reader.join();
        }

        let status = {
            let mut guard = self.child.lock().expect("child lock poisoned");
            match guard.as_mut().map(Child::wait) {
                Some(Ok(status)) => status,
                _ => {
                    drop(guard);
                    self.set_state(EncoderState::Failed);
                    self.notify_finished(false, "Encoder process could not be awaited");
                    return false;
                }
            }
        };

        // Single terminal transition; a cancel request racing the read loop
        // must not produce a second one.
        if status.success() {
            self.set_state(EncoderState::Completed);
            self.notify_finished(true, "Encoding completed successfully");
            true
        } else if self.cancel_requested.load(Ordering::SeqCst) {
            self.set_state(EncoderState::Cancelled);
            self.notify_finished(false, "Encoding cancelled");
            false
        } else {
            let code = status.code().map_or_else(|| "signal".to_string(), |c| c.to_string());
            let error = classify_error(&collected_output);
            debug!(
                "Encode failed (exit {code}): {} (recoverable: {})",
                error.user_message, error.recoverable
            );
            self.set_state(EncoderState::Failed);
            self.notify_finished(
                false,
                &format!("Encoding failed with code {code}: {}", error.user_message),
            );
            false
        }
    }

    /// Handle for cancelling this encode from another thread while
    /// [`wait_for_completion`](Self::wait_for_completion) is blocking.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            child: Arc::clone(&self.child),
            cancel_requested: Arc::clone(&self.cancel_requested),
        }
    }

    /// Requests cancellation of a running encode; see [`CancelHandle::cancel`].
    pub fn cancel(&self) {
        self.cancel_handle().cancel();
    }

    /// True while the subprocess is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        let mut guard = self.child.lock().expect("child lock poisoned");
        guard
            .as_mut()
            .is_some_and(|child| matches!(child.try_wait(), Ok(None)))
    }

    fn set_state(&self, next: EncoderState) {
        let mut state = self.state.lock().expect("state lock poisoned");
        // Terminal states are final.
        if !state.is_terminal() {
            *state = next;
        }
    }

    fn notify_finished(&self, success: bool, message: &str) {
        if let Some(on_finished) = self.callbacks.on_finished.as_ref() {
            on_finished(success, message);
        }
    }
}

/// Cloneable, thread-safe handle for stopping an encode in flight.
pub struct CancelHandle {
    child: Arc<Mutex<Option<Child>>>,
    cancel_requested: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Requests cancellation of a running encode.
    ///
    /// Asks ffmpeg to quit gracefully, waits up to [`TERMINATE_TIMEOUT`], and
    /// force-kills if it is still alive. Cancelling a process that has
    /// already exited (or an encoder that never started) is a no-op and does
    /// not disturb a previously reached terminal state. Cancellation is not
    /// an error; the completion callback reports it with a distinct message.
    pub fn cancel(&self) {
        let mut guard = self.child.lock().expect("child lock poisoned");
        let Some(child) = guard.as_mut() else {
            return;
        };
        if matches!(child.try_wait(), Ok(Some(_))) {
            debug!("Cancel requested after process exit; ignoring");
            return;
        }

        self.cancel_requested.store(true, Ordering::SeqCst);
        info!("Cancelling encode");

        // ffmpeg quits cleanly on 'q'; fall through to kill if it ignores us.
        if let Some(stdin) = child.stdin.as_mut() {
            let _ = stdin.write_all(b"q");
            let _ = stdin.flush();
        }

        let deadline = Instant::now() + TERMINATE_TIMEOUT;
        while Instant::now() < deadline {
            if matches!(child.try_wait(), Ok(Some(_))) {
                return;
            }
            thread::sleep(TERMINATE_POLL);
        }

        warn!("Encoder did not exit within {TERMINATE_TIMEOUT:?}; killing");
        let _ = child.kill();
    }
}

/// Feeds lines from one child stream into the merged channel. Send failures
/// mean the receiver is gone, which only happens on teardown.
fn spawn_line_reader<R: Read + Send + 'static>(
    stream: R,
    tx: mpsc::Sender<String>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for line in BufReader::new(stream).lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    })
}
