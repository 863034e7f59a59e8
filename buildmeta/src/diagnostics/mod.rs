// SPDX-License-Identifier: GPL-3.0-or-later

//! Problem markers recovered from the console output of a build orchestrator.

pub mod scanner;

pub use scanner::{Action, ConsoleScanner, ParserState, ScriptHeader, transition};

use serde::Serialize;
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    /// An error in a build script, bound to a file.
    ErrorResource,
    /// The build tool itself failed.
    ErrorBuild,
}

/// Tells configuration script problems from build invocation problems.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Script,
    Build,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ProblemMarker {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// 1-based line number, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub description: String,
    pub severity: Severity,
    pub kind: MarkerKind,
    /// The command the script problem was reported for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ProblemMarker {
    /// A problem without file association, reported by the build tool itself.
    pub fn invocation(description: impl Into<String>) -> Self {
        Self {
            file: None,
            line: None,
            description: description.into(),
            severity: Severity::ErrorBuild,
            kind: MarkerKind::Build,
            context: None,
        }
    }

    /// Adds a piece of the description, separated by a space.
    pub fn append_description(&mut self, text: &str) {
        if !self.description.is_empty() {
            self.description.push(' ');
        }
        self.description.push_str(text);
    }
}

/// Receives the completed markers.
pub trait MarkerSink {
    fn accept(&mut self, marker: ProblemMarker);
}

impl MarkerSink for Vec<ProblemMarker> {
    fn accept(&mut self, marker: ProblemMarker) {
        self.push(marker);
    }
}

impl<S: MarkerSink + ?Sized> MarkerSink for &mut S {
    fn accept(&mut self, marker: ProblemMarker) {
        (**self).accept(marker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_description() {
        let mut sut = ProblemMarker::invocation("");

        sut.append_description("first part:");
        sut.append_description("second part.");

        assert_eq!(sut.description, "first part: second part.");
    }

    #[test]
    fn test_marker_json_shape() {
        let marker = ProblemMarker::invocation("The source directory does not exist.");

        let json = serde_json::to_value(&marker).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "description": "The source directory does not exist.",
                "severity": "error_build",
                "kind": "build"
            })
        );
    }

    #[test]
    fn test_sink_by_reference() {
        fn report<S: MarkerSink>(mut sink: S) {
            sink.accept(ProblemMarker::invocation("x"));
        }
        let mut markers: Vec<ProblemMarker> = Vec::new();

        report(&mut markers);
        report(&mut markers);

        assert_eq!(markers.len(), 2);
    }
}
