// SPDX-License-Identifier: GPL-3.0-or-later

//! Tool recognition using regex patterns.
//!
//! The leading token of a command line names the executable. Its base name is
//! matched against an ordered list of signatures; the first one that matches
//! selects the tool chain used to parse the rest of the command line.

use super::ToolChain;
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;

/// Identifies a tool by the base name of its executable.
#[derive(Clone, Debug)]
pub struct ToolSignature {
    /// Regular expression for the whole base name, without anchors.
    pub pattern: String,
    /// Whether an executable suffix is accepted under Windows conventions.
    pub match_extension: bool,
    pub tool: Arc<ToolChain>,
}

impl ToolSignature {
    pub fn new(pattern: impl Into<String>, match_extension: bool, tool: Arc<ToolChain>) -> Self {
        Self { pattern: pattern.into(), match_extension, tool }
    }
}

/// The tool a command line invokes.
#[derive(Debug)]
pub struct Detection<'a> {
    pub tool: Arc<ToolChain>,
    /// The executable as written, one layer of quotes removed.
    pub executable: String,
    /// The command line after the executable.
    pub arguments: &'a str,
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Invalid tool signature '{pattern}': {source}")]
    InvalidSignature {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Matches command lines against an ordered list of tool signatures.
#[derive(Debug)]
pub struct ToolDetector {
    signatures: Vec<(Regex, Arc<ToolChain>)>,
    windows: bool,
}

impl ToolDetector {
    /// Compiles the signatures.
    ///
    /// The optional `version_suffix` is appended to every signature. With
    /// `windows` set, `\` also separates directories and signatures that ask
    /// for it accept a trailing `.exe`.
    pub fn new(
        signatures: Vec<ToolSignature>,
        version_suffix: Option<&str>,
        windows: bool,
    ) -> Result<Self, DetectorError> {
        let suffix = version_suffix.map(|suffix| format!("(?:{suffix})?")).unwrap_or_default();
        let compiled = signatures
            .into_iter()
            .map(|signature| {
                let extension = if windows && signature.match_extension { r"(?:\.[eE][xX][eE])?" } else { "" };
                let pattern = format!("^(?:{}){suffix}{extension}$", signature.pattern);
                Regex::new(&pattern)
                    .map(|regex| (regex, signature.tool))
                    .map_err(|source| DetectorError::InvalidSignature { pattern, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { signatures: compiled, windows })
    }

    /// Finds the tool the command line invokes.
    ///
    /// Returns `None` for an empty command line and for executables no
    /// signature matches; this is not an error.
    pub fn detect<'a>(&self, command: &'a str) -> Option<Detection<'a>> {
        let (executable, arguments) = leading_token(command)?;
        let base_name = self.base_name(&executable);

        let tool = self
            .signatures
            .iter()
            .find(|(regex, _)| regex.is_match(base_name))
            .map(|(_, tool)| Arc::clone(tool));
        match tool {
            Some(tool) => {
                log::debug!("Recognized {} as {}", executable, tool.family());
                Some(Detection { tool, executable, arguments })
            }
            None => {
                log::debug!("Not recognized as a known tool: {executable}");
                None
            }
        }
    }

    fn base_name<'a>(&self, executable: &'a str) -> &'a str {
        let separators: &[char] = if self.windows { &['/', '\\'] } else { &['/'] };
        executable.rsplit(separators).next().unwrap_or(executable)
    }
}

/// Splits the executable off a command line.
///
/// A token that starts with a quote runs to the matching quote, which is
/// removed. Otherwise it runs to the first white space.
fn leading_token(command: &str) -> Option<(String, &str)> {
    let command = command.trim_start();
    if command.is_empty() {
        return None;
    }

    let quoted = command
        .chars()
        .next()
        .filter(|first| *first == '"' || *first == '\'')
        .and_then(|quote| command[1..].find(quote).map(|end| (&command[1..end + 1], &command[end + 2..])));

    let (token, rest) = match quoted {
        Some(found) => found,
        None => command.split_at(command.find(char::is_whitespace).unwrap_or(command.len())),
    };
    Some((token.to_string(), rest.trim_start()))
}
