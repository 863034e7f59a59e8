// SPDX-License-Identifier: GPL-3.0-or-later

use super::matchers::{Dialect, split_token};
use std::fs;
use std::path::Path;

/// Expands `@file` style arguments into the contents of the file.
///
/// The expansion is scanned by the same driver, so nested references are
/// followed until `max_depth` levels deep.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResponseFiles {
    marker: String,
    max_depth: usize,
}

impl Default for ResponseFiles {
    fn default() -> Self {
        Self::new("@", 8)
    }
}

impl ResponseFiles {
    pub fn new(marker: impl Into<String>, max_depth: usize) -> Self {
        Self { marker: marker.into(), max_depth }
    }

    /// Never expands anything.
    pub fn disabled() -> Self {
        Self::new("", 0)
    }

    /// Reads the response file referenced by the token at the head of `args`.
    ///
    /// Returns the length of the token and the file contents. Returns `None`
    /// when the token is not a reference, the nesting is too deep, or the file
    /// cannot be read; the token is then parsed as an ordinary argument.
    pub(super) fn expand(&self, dialect: Dialect, args: &str, cwd: &Path, depth: usize) -> Option<(usize, String)> {
        if self.marker.is_empty() || !args.starts_with(self.marker.as_str()) {
            return None;
        }
        let (consumed, token) = split_token(dialect, args);
        let reference = token.strip_prefix(self.marker.as_str()).filter(|path| !path.is_empty())?;
        if depth >= self.max_depth {
            log::warn!("Response file {reference} nested too deep, not expanded");
            return None;
        }

        let path = cwd.join(reference);
        match fs::read_to_string(&path) {
            Ok(contents) => {
                log::debug!("Expanding response file: {}", path.display());
                Some((consumed, contents))
            }
            Err(error) => {
                log::warn!("Failed to read response file {}: {error}", path.display());
                None
            }
        }
    }
}
