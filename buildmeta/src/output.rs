// SPDX-License-Identifier: GPL-3.0-or-later

//! JSON rendering of the results, and reading of compilation databases.
//!
//! The results are written as pretty printed JSON arrays. The writer streams
//! the elements, so a long array does not need to be collected first.

use crate::arglets::{Dialect, ParseResult};
use crate::config::Family;
use crate::settings::SettingEntry;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::{Read, Write};
use std::path::PathBuf;

/// What was learned from one compiler command line.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParseReport {
    /// The executable as written on the command line.
    pub executable: String,
    /// `None` when the executable is not a known tool.
    pub family: Option<Family>,
    pub directory: PathBuf,
    pub entries: Vec<SettingEntry>,
    pub builtin_detection_args: Vec<String>,
    /// The command that reveals the builtins of the compiler.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_command: Option<Vec<String>>,
}

impl ParseReport {
    /// A report for a command line that could not be attributed to a tool.
    pub fn unrecognized(executable: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            family: None,
            directory: directory.into(),
            entries: vec![],
            builtin_detection_args: vec![],
            detection_command: None,
        }
    }

    pub fn recognized(
        executable: impl Into<String>,
        family: Family,
        directory: impl Into<PathBuf>,
        result: ParseResult,
    ) -> Self {
        Self {
            executable: executable.into(),
            family: Some(family),
            directory: directory.into(),
            entries: result.entries,
            builtin_detection_args: result.builtin_detection_args,
            detection_command: None,
        }
    }
}

/// Writes the elements as a pretty printed JSON array.
pub fn serialize_seq<T: Serialize>(
    writer: impl Write,
    elements: impl Iterator<Item = T>,
) -> Result<(), serde_json::Error> {
    let mut serializer = serde_json::Serializer::pretty(writer);
    let mut seq = serializer.serialize_seq(None)?;
    for element in elements {
        seq.serialize_element(&element)?;
    }
    seq.end()
}

/// Writes one value as pretty printed JSON.
pub fn serialize_one<T: Serialize>(writer: impl Write, value: &T) -> Result<(), serde_json::Error> {
    serde_json::to_writer_pretty(writer, value)
}

/// Represents an entry of a compilation database.
///
/// Either the `command` or the `arguments` field is present. Fields that
/// are irrelevant here, like `output`, are ignored.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CompileCommand {
    pub directory: PathBuf,
    pub file: PathBuf,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub arguments: Vec<String>,
}

impl CompileCommand {
    /// The command line of the entry, as a single string.
    ///
    /// The `arguments` are joined with the quoting rules of `dialect`.
    pub fn command_line(&self, dialect: Dialect) -> String {
        if self.command.is_empty() {
            join_words(&self.arguments, dialect)
        } else {
            self.command.clone()
        }
    }
}

/// Joins the words into a command line.
///
/// Only words that are empty or contain white space are quoted; the others
/// are kept verbatim, so `-DNAME="value"` stays readable for the arglets.
/// Glued options keep their prefix unquoted, so `-Imy dir` is still an
/// include option after the join.
pub fn join_words<S: AsRef<str>>(words: &[S], dialect: Dialect) -> String {
    words
        .iter()
        .enumerate()
        .map(|(index, word)| quote_word(word.as_ref(), index == 0, dialect))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote_word(word: &str, leading: bool, dialect: Dialect) -> Cow<'_, str> {
    if !word.is_empty() && !word.contains(char::is_whitespace) {
        return Cow::Borrowed(word);
    }
    match dialect {
        // The executable is recognized with one pair of quotes removed.
        _ if leading => Cow::Owned(format!("\"{word}\"")),
        Dialect::Posix if word.is_empty() => Cow::Borrowed("''"),
        Dialect::Posix => {
            let mut escaped = String::with_capacity(word.len() * 2);
            for current in word.chars() {
                if current.is_whitespace() || matches!(current, '\\' | '"' | '\'') {
                    escaped.push('\\');
                }
                escaped.push(current);
            }
            Cow::Owned(escaped)
        }
        Dialect::Windows => {
            let (prefix, rest) = match word.as_bytes() {
                [b'/' | b'-', letter, ..] if letter.is_ascii_alphabetic() => word.split_at(2),
                _ => ("", word),
            };
            Cow::Owned(format!("{prefix}\"{}\"", rest.replace('"', "\\\"")))
        }
    }
}

/// Reads all entries of a compilation database.
pub fn read_compile_commands(reader: impl Read) -> Result<Vec<CompileCommand>, serde_json::Error> {
    serde_json::from_reader(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arglets::{ArgumentParser, GCC_ARGLETS, ResponseFiles};
    use crate::settings::{IncludeKind, Origin};
    use std::path::Path;
    use serde_json::json;

    #[test]
    fn test_serialize_seq_is_an_array() {
        let entries = vec![
            SettingEntry::include_path("/usr/include", IncludeKind::System, Origin::Builtin),
            SettingEntry::macro_undefine("NDEBUG", Origin::Argument),
        ];
        let mut buffer = Vec::new();

        serialize_seq(&mut buffer, entries.iter()).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(
            value,
            json!([
                {"kind": "include_path", "path": "/usr/include", "include": "system", "origin": "builtin"},
                {"kind": "macro_undefine", "name": "NDEBUG", "origin": "argument"}
            ])
        );
    }

    #[test]
    fn test_serialize_seq_empty() {
        let mut buffer = Vec::new();

        serialize_seq(&mut buffer, std::iter::empty::<SettingEntry>()).unwrap();

        assert_eq!(String::from_utf8(buffer).unwrap(), "[]");
    }

    #[test]
    fn test_report_shape() {
        let result = ParseResult {
            entries: vec![SettingEntry::macro_define("A", "1", Origin::Argument)],
            builtin_detection_args: vec!["-std=c++17".to_string()],
        };
        let mut report = ParseReport::recognized("g++", Family::Gcc, "/work", result);
        report.detection_command = Some(vec!["g++".to_string(), "spec.cpp".to_string()]);

        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(
            value,
            json!({
                "executable": "g++",
                "family": "gcc",
                "directory": "/work",
                "entries": [{"kind": "macro_define", "name": "A", "value": "1", "origin": "argument"}],
                "builtin_detection_args": ["-std=c++17"],
                "detection_command": ["g++", "spec.cpp"]
            })
        );
    }

    #[test]
    fn test_unrecognized_report_shape() {
        let report = ParseReport::unrecognized("make", "/work");

        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["family"], serde_json::Value::Null);
        assert!(value.get("detection_command").is_none());
    }

    #[test]
    fn test_read_compile_commands() {
        let content = r#"[
            {
                "directory": "/home/user/project",
                "file": "src/main.c",
                "command": "gcc -DDEBUG -c src/main.c",
                "output": "main.o"
            },
            {
                "directory": "/home/user/project",
                "file": "src/with space.c",
                "arguments": ["clang", "-I", "my include", "-c", "src/with space.c"]
            }
        ]"#;

        let entries = read_compile_commands(content.as_bytes()).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].command_line(Dialect::Posix), "gcc -DDEBUG -c src/main.c");
        assert_eq!(entries[1].command_line(Dialect::Posix), r"clang -I my\ include -c src/with\ space.c");
    }

    #[test]
    fn test_join_words_quotes_only_white_space() {
        let words = ["g++", "-std=c++20", "-DNAME=\"v\"", "-I", "my dir", ""];

        assert_eq!(join_words(&words, Dialect::Posix), r#"g++ -std=c++20 -DNAME="v" -I my\ dir ''"#);
    }

    #[test]
    fn test_join_words_keeps_glued_options_recognizable() {
        let words = ["gcc", "-Imy include", "-DMSG=hello world", "-c", "a.c"];

        let command = join_words(&words, Dialect::Posix);
        assert_eq!(command, r"gcc -Imy\ include -DMSG=hello\ world -c a.c");

        let responses = ResponseFiles::disabled();
        let result = ArgumentParser::new(&GCC_ARGLETS, Dialect::Posix, &responses).parse(Path::new("/work"), &command[4..]);
        assert_eq!(
            result.entries,
            vec![
                SettingEntry::include_path("/work/my include", IncludeKind::Normal, Origin::Argument),
                SettingEntry::macro_define("MSG", "hello world", Origin::Argument),
            ]
        );
    }

    #[test]
    fn test_join_words_windows() {
        let words = [r"C:\Program Files\cl.exe", r"/IC:\my dir", "/DMSG=a b", r"C:\src\x y.c", "/c", ""];

        assert_eq!(
            join_words(&words, Dialect::Windows),
            r#""C:\Program Files\cl.exe" /I"C:\my dir" /D"MSG=a b" "C:\src\x y.c" /c """#
        );
    }

    #[test]
    fn test_read_compile_commands_fails_on_missing_fields() {
        let content = r#"[{"command": "gcc -c main.c"}]"#;

        assert!(read_compile_commands(content.as_bytes()).is_err());
    }
}
