// SPDX-License-Identifier: GPL-3.0-or-later

//! Structured settings extracted from compiler command lines and from the
//! compiler's own description of its builtins.
//!
//! The main abstractions are:
//! - `SettingEntry`: one include path, macro definition, macro removal or
//!   language standard hint, together with where it came from.
//! - `ParseContext`: the accumulator a single command line parse writes into.
//! - `SharedEntries`: a thread-safe, ordered collection used when the entries
//!   are produced on the thread that drains a compiler's output.

use crate::arglets::Dialect;
use serde::Serialize;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Where a settings entry was learned from.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Given explicitly on the command line.
    Argument,
    /// Reported by the compiler when asked for its builtins.
    Builtin,
}

/// How an include directory takes part in the header search.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IncludeKind {
    /// Searched for both `#include "..."` and `#include <...>`.
    #[default]
    Normal,
    /// Searched after the normal directories, warnings suppressed.
    System,
    /// Searched for `#include "..."` only.
    Quote,
    /// Apple framework directory.
    Framework,
}

/// The payload of a settings entry.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryKind {
    IncludePath { path: PathBuf, include: IncludeKind },
    MacroDefine { name: String, value: String },
    MacroUndefine { name: String },
    /// The language standard option, kept verbatim.
    LanguageStandard { text: String },
}

/// A single settings entry.
///
/// Two entries are equal when their payloads are equal; the origin is not
/// taken into account. The parser does not remove duplicates.
#[derive(Clone, Debug, Serialize)]
pub struct SettingEntry {
    #[serde(flatten)]
    pub kind: EntryKind,
    pub origin: Origin,
}

impl SettingEntry {
    pub fn include_path(path: impl Into<PathBuf>, include: IncludeKind, origin: Origin) -> Self {
        Self { kind: EntryKind::IncludePath { path: path.into(), include }, origin }
    }

    pub fn macro_define(name: impl Into<String>, value: impl Into<String>, origin: Origin) -> Self {
        Self { kind: EntryKind::MacroDefine { name: name.into(), value: value.into() }, origin }
    }

    pub fn macro_undefine(name: impl Into<String>, origin: Origin) -> Self {
        Self { kind: EntryKind::MacroUndefine { name: name.into() }, origin }
    }

    pub fn language_standard(text: impl Into<String>) -> Self {
        Self { kind: EntryKind::LanguageStandard { text: text.into() }, origin: Origin::Argument }
    }
}

impl PartialEq for SettingEntry {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for SettingEntry {}

impl Hash for SettingEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
    }
}

/// Accumulates the result of parsing one command line.
///
/// The context is owned by a single parse call and handed back to the
/// caller as a [`ParseResult`](crate::arglets::ParseResult) when it returns.
#[derive(Debug)]
pub struct ParseContext {
    cwd: PathBuf,
    entries: Vec<SettingEntry>,
    builtin_detection_args: Vec<String>,
}

impl ParseContext {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into(), entries: Vec::new(), builtin_detection_args: Vec::new() }
    }

    /// The working directory of the parsed command.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn add_entry(&mut self, entry: SettingEntry) {
        self.entries.push(entry);
    }

    /// Records an argument that has to be repeated when the compiler is asked
    /// for its builtins.
    pub fn add_builtin_detection_arg(&mut self, argument: impl Into<String>) {
        self.builtin_detection_args.push(argument.into());
    }

    /// Makes a path from the command line absolute, relative to the working
    /// directory. The result is not normalized and the filesystem is not read.
    ///
    /// Under the Windows dialect drive letter and UNC paths are absolute,
    /// whatever the host platform is.
    pub fn resolve(&self, path: &str, dialect: Dialect) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() || (dialect == Dialect::Windows && is_windows_absolute(path)) {
            candidate.to_path_buf()
        } else {
            self.cwd.join(candidate)
        }
    }

    pub fn entries(&self) -> &[SettingEntry] {
        &self.entries
    }

    pub fn builtin_detection_args(&self) -> &[String] {
        &self.builtin_detection_args
    }

    pub fn into_parts(self) -> (Vec<SettingEntry>, Vec<String>) {
        (self.entries, self.builtin_detection_args)
    }
}

fn is_windows_absolute(path: &str) -> bool {
    match path.as_bytes() {
        [b'\\', b'\\', ..] => true,
        [drive, b':', b'\\' | b'/', ..] => drive.is_ascii_alphabetic(),
        _ => false,
    }
}

/// An ordered collection of entries that can be appended to from one thread
/// while another one holds a handle to read the results.
#[derive(Clone, Debug, Default)]
pub struct SharedEntries {
    inner: Arc<Mutex<Vec<SettingEntry>>>,
}

impl SharedEntries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: SettingEntry) {
        self.lock().push(entry);
    }

    /// Returns a copy of the entries collected so far.
    pub fn snapshot(&self) -> Vec<SettingEntry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A writer that panicked mid-push cannot leave the vector half updated,
    // so a poisoned lock still holds consistent data.
    fn lock(&self) -> MutexGuard<'_, Vec<SettingEntry>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_equality_ignores_origin() {
        let explicit = SettingEntry::macro_define("FOO", "1", Origin::Argument);
        let builtin = SettingEntry::macro_define("FOO", "1", Origin::Builtin);

        assert_eq!(explicit, builtin);
        assert_ne!(explicit, SettingEntry::macro_define("FOO", "2", Origin::Argument));
        assert_ne!(explicit, SettingEntry::macro_undefine("FOO", Origin::Argument));
    }

    #[test]
    fn test_hash_agrees_with_equality() {
        let mut set = HashSet::new();
        set.insert(SettingEntry::include_path("/usr/include", IncludeKind::System, Origin::Argument));
        set.insert(SettingEntry::include_path("/usr/include", IncludeKind::System, Origin::Builtin));

        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_resolve_relative_and_absolute_paths() {
        let context = ParseContext::new("/project/build");

        assert_eq!(context.resolve("include", Dialect::Posix), PathBuf::from("/project/build/include"));
        assert_eq!(context.resolve("/opt/include", Dialect::Posix), PathBuf::from("/opt/include"));
    }

    #[test]
    fn test_resolve_windows_absolute_paths() {
        let context = ParseContext::new("/project/build");
        let cases = [
            (r"C:\sdk\include", PathBuf::from(r"C:\sdk\include")),
            ("d:/sdk/include", PathBuf::from("d:/sdk/include")),
            (r"\\server\share\inc", PathBuf::from(r"\\server\share\inc")),
            (r"inc\sub", PathBuf::from("/project/build").join(r"inc\sub")),
            ("C:relative", PathBuf::from("/project/build").join("C:relative")),
        ];

        for (input, expected) in cases {
            assert_eq!(context.resolve(input, Dialect::Windows), expected, "input: {input}");
        }
        assert_eq!(
            context.resolve(r"C:\sdk\include", Dialect::Posix),
            PathBuf::from("/project/build").join(r"C:\sdk\include")
        );
    }

    #[test]
    fn test_context_keeps_insertion_order() {
        let mut context = ParseContext::new("/tmp");
        context.add_entry(SettingEntry::macro_define("A", "", Origin::Argument));
        context.add_entry(SettingEntry::macro_define("A", "", Origin::Argument));
        context.add_builtin_detection_arg("-std=c11");

        let (entries, args) = context.into_parts();
        assert_eq!(entries.len(), 2, "duplicates are kept");
        assert_eq!(args, vec!["-std=c11"]);
    }

    #[test]
    fn test_shared_entries_across_threads() {
        let shared = SharedEntries::new();
        let writer = shared.clone();

        let handle = thread::spawn(move || {
            for index in 0..100 {
                writer.push(SettingEntry::macro_define(format!("M{index}"), "", Origin::Builtin));
            }
        });
        handle.join().unwrap();

        let entries = shared.snapshot();
        assert_eq!(entries.len(), 100);
        assert_eq!(entries[0], SettingEntry::macro_define("M0", "", Origin::Builtin));
        assert_eq!(entries[99], SettingEntry::macro_define("M99", "", Origin::Builtin));
    }

    #[test]
    fn test_serialized_shape() {
        let entry = SettingEntry::macro_define("FOO", "bar", Origin::Argument);
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"kind": "macro_define", "name": "FOO", "value": "bar", "origin": "argument"})
        );
    }
}
