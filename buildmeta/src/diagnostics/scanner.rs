// SPDX-License-Identifier: GPL-3.0-or-later

//! Finds the error and warning blocks in CMake console output.
//!
//! A script problem looks like this, and ends with two blank lines:
//!
//! ```text
//! CMake Error at CMakeLists.txt:12 (add_executable):
//!   Cannot find source file:
//!
//!     missing.c
//!
//!
//! ```
//!
//! The recognition is split in two. [`transition`] is a pure function from
//! the current state and a line to the next state and an [`Action`]. The
//! [`ConsoleScanner`] applies the actions: it owns the marker being built and
//! hands completed markers to a [`MarkerSink`].
//!
//! A line the current state cannot take is answered with [`Action::Reject`].
//! The scanner then drops the marker in progress, if any, and looks at the
//! same line again from [`ParserState::None`].

use super::{MarkerKind, MarkerSink, ProblemMarker, Severity};
use regex::Regex;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::LazyLock;

static SCRIPT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^CMake (Error|Warning|Deprecation Error|Deprecation Warning)(?: \(dev\))? (?:at (.+?):(\d+)(?: \((.+?)\))?|in (.+?)):\s*$",
    )
    .expect("Invalid script header regex pattern")
});

static INVOCATION_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^CMake Error: (.+?)\s*$").expect("Invalid invocation header regex pattern"));

const INFORMATIONAL_PREFIX: &str = "-- ";

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ParserState {
    #[default]
    None,
    /// A script header was seen, waiting for the description.
    ScriptError,
    /// The description ended with a colon, waiting for its continuation.
    DescriptionPart1,
    /// The marker was emitted, waiting for the first closing blank line.
    AwaitingBlankAfterDescription,
    AwaitingSecondBlank,
    /// An invocation error message ended with a colon.
    InvokeError,
}

/// The parts of a script problem header.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScriptHeader {
    pub severity: Severity,
    /// As written in the output, relative to the source root.
    pub file: String,
    pub line: Option<u32>,
    pub context: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Action {
    /// The line was taken, nothing to do.
    Consume,
    /// The line does not fit the current state.
    Reject,
    /// Start a script problem marker.
    OpenScript(ScriptHeader),
    /// Start an invocation problem marker and wait for more text.
    OpenInvocation(String),
    /// Report a complete invocation problem.
    EmitInvocation(String),
    /// Add text to the description.
    Append(String),
    /// Add text to the description and report the marker.
    AppendAndEmit(String),
    /// The block is over.
    Close,
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn is_informational(line: &str) -> bool {
    line.starts_with(INFORMATIONAL_PREFIX)
}

fn is_header(line: &str) -> bool {
    SCRIPT_HEADER.is_match(line) || INVOCATION_HEADER.is_match(line)
}

fn script_header(line: &str) -> Option<ScriptHeader> {
    let captures = SCRIPT_HEADER.captures(line)?;
    let severity = match &captures[1] {
        "Error" | "Deprecation Error" => Severity::ErrorResource,
        "Deprecation Warning" => Severity::Info,
        _ => Severity::Warning,
    };
    let file = captures.get(2).or_else(|| captures.get(5))?.as_str().to_string();
    let line = captures.get(3).and_then(|number| number.as_str().parse().ok());
    let context = captures.get(4).map(|context| context.as_str().to_string());

    Some(ScriptHeader { severity, file, line, context })
}

/// Computes the next state of the scanner for one line of output.
pub fn transition(state: ParserState, line: &str) -> (ParserState, Action) {
    let text = line.trim();
    match state {
        ParserState::None => {
            if let Some(header) = script_header(line) {
                (ParserState::ScriptError, Action::OpenScript(header))
            } else if let Some(captures) = INVOCATION_HEADER.captures(line) {
                let message = captures[1].to_string();
                if message.ends_with(':') {
                    (ParserState::InvokeError, Action::OpenInvocation(message))
                } else {
                    (ParserState::None, Action::EmitInvocation(message))
                }
            } else {
                (ParserState::None, Action::Consume)
            }
        }
        ParserState::ScriptError => {
            if is_blank(line) || is_informational(line) {
                (state, Action::Consume)
            } else if is_header(line) {
                (state, Action::Reject)
            } else if text.ends_with(':') {
                (ParserState::DescriptionPart1, Action::Append(text.to_string()))
            } else if text.ends_with('.') || text.ends_with('!') {
                (ParserState::AwaitingBlankAfterDescription, Action::AppendAndEmit(text.to_string()))
            } else {
                (state, Action::Append(text.to_string()))
            }
        }
        ParserState::DescriptionPart1 => {
            if is_blank(line) || is_informational(line) {
                (state, Action::Consume)
            } else if is_header(line) {
                (state, Action::Reject)
            } else {
                (ParserState::AwaitingBlankAfterDescription, Action::AppendAndEmit(text.to_string()))
            }
        }
        ParserState::AwaitingBlankAfterDescription if is_blank(line) => (ParserState::AwaitingSecondBlank, Action::Consume),
        ParserState::AwaitingSecondBlank if is_blank(line) => (ParserState::None, Action::Close),
        ParserState::AwaitingBlankAfterDescription | ParserState::AwaitingSecondBlank => (state, Action::Reject),
        ParserState::InvokeError => {
            if is_blank(line) {
                (state, Action::Consume)
            } else if is_header(line) {
                (state, Action::Reject)
            } else {
                (ParserState::None, Action::AppendAndEmit(text.to_string()))
            }
        }
    }
}

/// Runs the state machine over console output.
pub struct ConsoleScanner<S: MarkerSink> {
    source_root: PathBuf,
    state: ParserState,
    current: Option<ProblemMarker>,
    sink: S,
}

impl<S: MarkerSink> ConsoleScanner<S> {
    /// Script paths are resolved against `source_root`.
    pub fn new(source_root: impl Into<PathBuf>, sink: S) -> Self {
        Self { source_root: source_root.into(), state: ParserState::None, current: None, sink }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Forgets the block in progress.
    pub fn reset(&mut self) {
        self.state = ParserState::None;
        self.current = None;
    }

    /// Feeds one line, without its terminator.
    pub fn process_line(&mut self, line: &str) {
        let (next, action) = transition(self.state, line);
        if action == Action::Reject {
            log::debug!("Unexpected line in state {:?}, starting over: {line}", self.state);
            self.reset();
            let (next, action) = transition(ParserState::None, line);
            self.apply(next, action);
        } else {
            self.apply(next, action);
        }
    }

    /// Feeds every line of the reader. Invalid UTF-8 is replaced.
    pub fn scan<R: BufRead>(&mut self, mut reader: R) -> io::Result<()> {
        let mut buffer = Vec::new();
        while reader.read_until(b'\n', &mut buffer)? > 0 {
            let line = String::from_utf8_lossy(&buffer);
            self.process_line(line.trim_end_matches(['\n', '\r']));
            buffer.clear();
        }
        Ok(())
    }

    fn apply(&mut self, next: ParserState, action: Action) {
        self.state = next;
        match action {
            Action::Consume | Action::Reject => {}
            Action::OpenScript(header) => {
                let file = self.source_root.join(&header.file);
                self.current = Some(ProblemMarker {
                    file: Some(file),
                    line: header.line,
                    description: String::new(),
                    severity: header.severity,
                    kind: MarkerKind::Script,
                    context: header.context,
                });
            }
            Action::OpenInvocation(message) => self.current = Some(ProblemMarker::invocation(message)),
            Action::EmitInvocation(message) => self.sink.accept(ProblemMarker::invocation(message)),
            Action::Append(text) => {
                if let Some(marker) = self.current.as_mut() {
                    marker.append_description(&text);
                }
            }
            Action::AppendAndEmit(text) => {
                if let Some(mut marker) = self.current.take() {
                    marker.append_description(&text);
                    self.sink.accept(marker);
                }
            }
            Action::Close => self.current = None,
        }
    }
}
