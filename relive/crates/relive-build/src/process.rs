//! The external compiler process.
//!
//! The compiler is spawned with both output streams piped. One reader
//! thread per stream forwards classified lines over a channel, so the
//! driving thread only ever polls: [`CompilerProcess::poll`] never blocks
//! on compiler I/O.

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use relive_core::Severity;

use crate::command::CompileCommand;
use crate::error::{BuildError, BuildResult};

/// Which stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// One line of compiler output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub severity: Severity,
    pub stream: Stream,
    pub text: String,
}

impl OutputLine {
    pub fn new(stream: Stream, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            severity: classify(&text),
            stream,
            text,
        }
    }
}

const ERROR_MARKERS: [&str; 3] = ["error:", "error[", "undefined reference"];
const WARNING_MARKERS: [&str; 2] = ["warning:", "warning["];

/// Classify a compiler line by pattern.
///
/// Matching is case-sensitive and keyed on diagnostic tokens (`error:`,
/// `error[E0308]`, `warning:`), so flags like `-Werror` or summaries like
/// `0 errors` stay informational.
pub fn classify(line: &str) -> Severity {
    if ERROR_MARKERS.iter().any(|marker| line.contains(marker)) {
        Severity::Error
    } else if WARNING_MARKERS.iter().any(|marker| line.contains(marker)) {
        Severity::Warning
    } else {
        Severity::Info
    }
}

/// Result of a non-blocking check on the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Exited(ExitStatus),
}

/// A running (or finished) compiler invocation.
#[derive(Debug)]
pub struct CompilerProcess {
    child: Child,
    lines: Receiver<OutputLine>,
    readers: Vec<JoinHandle<()>>,
    exit: Option<ExitStatus>,
}

impl CompilerProcess {
    pub fn spawn(command: &CompileCommand) -> BuildResult<Self> {
        let mut child = command
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BuildError::Spawn {
                program: command.program().display().to_string(),
                source,
            })?;

        let (tx, rx) = channel::unbounded();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader("relive-compiler-stdout", Stream::Stdout, stdout, tx.clone())?);
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader("relive-compiler-stderr", Stream::Stderr, stderr, tx)?);
        }

        log::debug!("spawned compiler pid {}: {}", child.id(), command);
        Ok(Self {
            child,
            lines: rx,
            readers,
            exit: None,
        })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Check for exit without blocking.
    ///
    /// Exit is reported only once both output streams have closed, so every
    /// line is in [`drain_output`](Self::drain_output) by then.
    pub fn poll(&mut self) -> BuildResult<ProcessState> {
        if let Some(status) = self.exit {
            return Ok(ProcessState::Exited(status));
        }
        let Some(status) = self.child.try_wait()? else {
            return Ok(ProcessState::Running);
        };
        if self.readers.iter().any(|reader| !reader.is_finished()) {
            return Ok(ProcessState::Running);
        }
        for reader in self.readers.drain(..) {
            if reader.join().is_err() {
                log::warn!("compiler output reader panicked");
            }
        }
        self.exit = Some(status);
        Ok(ProcessState::Exited(status))
    }

    /// Lines received since the last call.
    pub fn drain_output(&self) -> Vec<OutputLine> {
        self.lines.try_iter().collect()
    }
}

fn spawn_reader<R>(
    name: &str,
    stream: Stream,
    source: R,
    tx: Sender<OutputLine>,
) -> BuildResult<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
        let reader = BufReader::new(source);
        for line in reader.lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(OutputLine::new(stream, line)).is_err() {
                break;
            }
        }
    })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("src/a.c:3:1: error: expected ';'"), Severity::Error);
        assert_eq!(classify("ld: undefined reference to `tick'"), Severity::Error);
        assert_eq!(classify("src/a.c:9:5: warning: unused variable"), Severity::Warning);
        assert_eq!(classify("Compiling game v0.1.0"), Severity::Info);
        assert_eq!(classify("error[E0308]: mismatched types"), Severity::Error);
        assert_eq!(classify("warning[unused]: variable `x`"), Severity::Warning);
    }

    #[test]
    fn test_classify_ignores_words_without_diagnostic_tokens() {
        assert_eq!(classify("cc -Werror -c src/a.c"), Severity::Info);
        assert_eq!(classify("0 errors, 0 warnings"), Severity::Info);
        assert_eq!(classify("src/error_codes.c: compiled"), Severity::Info);
        assert_eq!(classify("ERROR: case differs"), Severity::Info);
    }

    #[test]
    fn test_output_line_keeps_stream() {
        let line = OutputLine::new(Stream::Stderr, "fatal error: a.h: No such file");
        assert_eq!(line.severity, Severity::Error);
        assert_eq!(line.stream, Stream::Stderr);
    }
}
