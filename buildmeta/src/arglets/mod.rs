// SPDX-License-Identifier: GPL-3.0-or-later

//! Argument parsing chain.
//!
//! An arglet recognizes one option family (include path, macro definition,
//! language standard, ...) at the head of an argument string. It reports how
//! many bytes it consumed and records the settings it found in the parse
//! context. The [`ArgumentParser`] walks the argument string, offers every
//! position to the arglets of the tool in a fixed order, and skips the tokens
//! none of them wants.
//!
//! The arglets are a closed list. Each one owns an ordered set of regular
//! expressions, one per surface form of the option, with the quoted and the
//! argument-list aware forms tried before the generic ones.

mod matchers;
mod response;

pub use matchers::Dialect;
pub use response::ResponseFiles;

pub(crate) use matchers::split_token;

use crate::settings::{IncludeKind, Origin, ParseContext, SettingEntry};
use matchers::{NameOptionMatcher, Unquote};
use serde::Serialize;
use std::path::Path;
use std::sync::LazyLock;

/// Macro name with an optional parameter list, outside of quotes.
const NAME_BARE: &str = r"[A-Za-z_$][\w$]*(?:\([^)\s]*\))?";
/// Macro name with an optional parameter list, inside quotes.
const NAME_QUOTED: &str = r"[A-Za-z_$][\w$]*(?:\([^)]*\))?";

/// What an arglet does with the text it matched.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ArgletKind {
    IncludePath(IncludeKind),
    MacroDefine,
    MacroUndefine,
    LanguageStandard,
    Sysroot,
}

/// A parser for one option family.
#[derive(Debug)]
pub struct Arglet {
    kind: ArgletKind,
    dialect: Dialect,
    matchers: Vec<NameOptionMatcher>,
}

impl Arglet {
    /// Include directory given by `option`, e.g. `-I`.
    ///
    /// Accepts the path glued to the option or separated by white space,
    /// bare or in single or double quotes.
    pub fn include_path(option: &str, include: IncludeKind, dialect: Dialect) -> Self {
        let bare = match dialect {
            Dialect::Posix => r#"(?:\\.|[^\s"'\\])+"#,
            Dialect::Windows => r#"[^\s"]+"#,
        };
        let matchers = vec![
            NameOptionMatcher::new(&format!(r#"(?:{option})\s*"((?:\\.|[^"\\])*)""#), 2, Unquote::Double),
            NameOptionMatcher::new(&format!(r"(?:{option})\s*'([^']*)'"), 2, Unquote::Verbatim),
            NameOptionMatcher::new(&format!(r"(?:{option})\s*({bare})"), 2, Unquote::Bare),
        ];
        Self { kind: ArgletKind::IncludePath(include), dialect, matchers }
    }

    /// Macro definition given by `option`, e.g. `-D`.
    ///
    /// The `NAME[=value]` unit may be quoted as a whole, or only the value
    /// may be quoted. A value starting with an escaped quote is taken
    /// literally, escapes included.
    pub fn macro_define(option: &str, dialect: Dialect) -> Self {
        let value = match dialect {
            Dialect::Posix => r"(?:\\.|[^\s\\])*",
            Dialect::Windows => r#"[^\s"]*"#,
        };
        let matchers = vec![
            NameOptionMatcher::new(&format!(r#"(?:{option})\s*"({NAME_QUOTED})(?:=((?:\\.|[^"\\])*))?""#), 2, Unquote::Verbatim)
                .with_value(3, Unquote::Double),
            NameOptionMatcher::new(&format!(r"(?:{option})\s*'({NAME_QUOTED})(?:=([^']*))?'"), 2, Unquote::Verbatim)
                .with_value(3, Unquote::Verbatim),
            NameOptionMatcher::new(&format!(r#"(?:{option})\s*({NAME_BARE})=(\\".*?\\")"#), 2, Unquote::Verbatim)
                .with_value(3, Unquote::Verbatim),
            NameOptionMatcher::new(&format!(r"(?:{option})\s*({NAME_BARE})=(\\'.*?\\')"), 2, Unquote::Verbatim)
                .with_value(3, Unquote::Verbatim),
            NameOptionMatcher::new(&format!(r#"(?:{option})\s*({NAME_BARE})="((?:\\.|[^"\\])*)""#), 2, Unquote::Verbatim)
                .with_value(3, Unquote::Double),
            NameOptionMatcher::new(&format!(r"(?:{option})\s*({NAME_BARE})='([^']*)'"), 2, Unquote::Verbatim)
                .with_value(3, Unquote::Verbatim),
            NameOptionMatcher::new(&format!(r"(?:{option})\s*({NAME_BARE})=({value})"), 2, Unquote::Verbatim)
                .with_value(3, Unquote::Bare),
            NameOptionMatcher::new(&format!(r"(?:{option})\s*({NAME_BARE})"), 2, Unquote::Verbatim),
        ];
        Self { kind: ArgletKind::MacroDefine, dialect, matchers }
    }

    /// Macro removal given by `option`, e.g. `-U`. A parameter list is
    /// accepted but not part of the recorded name.
    pub fn macro_undefine(option: &str, dialect: Dialect) -> Self {
        let name = r"([A-Za-z_$][\w$]*)";
        let matchers = vec![
            NameOptionMatcher::new(&format!(r#"(?:{option})\s*"{name}(?:\([^)]*\))?""#), 2, Unquote::Verbatim),
            NameOptionMatcher::new(&format!(r"(?:{option})\s*'{name}(?:\([^)]*\))?'"), 2, Unquote::Verbatim),
            NameOptionMatcher::new(&format!(r"(?:{option})\s*{name}(?:\([^)\s]*\))?"), 2, Unquote::Verbatim),
        ];
        Self { kind: ArgletKind::MacroUndefine, dialect, matchers }
    }

    /// Language standard selection, e.g. `-std=c++17` or `--std c++17`,
    /// kept verbatim. `option` includes the separator.
    pub fn language_standard(option: &str, dialect: Dialect) -> Self {
        let matchers = vec![NameOptionMatcher::new(&format!(r"(?:{option})\S+"), 1, Unquote::Verbatim)];
        Self { kind: ArgletKind::LanguageStandard, dialect, matchers }
    }

    /// Target system root, which changes the builtin include directories.
    pub fn sysroot(dialect: Dialect) -> Self {
        let body = r#"(?:--sysroot(?:=|\s+)|-isysroot\s*)(?:"[^"]*"|'[^']*'|\S+)"#;
        let matchers = vec![NameOptionMatcher::new(body, 1, Unquote::Verbatim)];
        Self { kind: ArgletKind::Sysroot, dialect, matchers }
    }

    /// Tries to recognize the option at the head of `args`.
    ///
    /// Returns the number of bytes consumed, zero when the option does not
    /// match here. On a match the findings are recorded in the context.
    pub fn try_consume(&self, context: &mut ParseContext, args: &str) -> usize {
        for matcher in &self.matchers {
            if let Some(found) = matcher.matches(self.dialect, args) {
                log::debug!("Arglet {:?} matched: {}", self.kind, &args[..found.consumed]);
                self.record(context, found.name, found.value);
                return found.consumed;
            }
        }
        0
    }

    fn record(&self, context: &mut ParseContext, name: String, value: Option<String>) {
        match self.kind {
            ArgletKind::IncludePath(_) if name.is_empty() => {
                log::debug!("Ignoring empty include path");
            }
            ArgletKind::IncludePath(include) => {
                let path = context.resolve(&name, self.dialect);
                context.add_entry(SettingEntry::include_path(path, include, Origin::Argument));
            }
            ArgletKind::MacroDefine => {
                let value = value.unwrap_or_default();
                context.add_entry(SettingEntry::macro_define(name, value, Origin::Argument));
            }
            ArgletKind::MacroUndefine => {
                context.add_entry(SettingEntry::macro_undefine(name, Origin::Argument));
            }
            ArgletKind::LanguageStandard => {
                for argument in split_arguments(&name) {
                    context.add_builtin_detection_arg(argument);
                }
                context.add_entry(SettingEntry::language_standard(name));
            }
            ArgletKind::Sysroot => {
                for argument in split_arguments(&name) {
                    context.add_builtin_detection_arg(argument);
                }
            }
        }
    }
}

/// Splits an option with a separate value into its words.
fn split_arguments(text: &str) -> Vec<String> {
    shell_words::split(text).unwrap_or_else(|_| text.split_whitespace().map(String::from).collect())
}

/// The outcome of parsing one argument string.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct ParseResult {
    /// Settings in the order they appeared on the command line.
    pub entries: Vec<SettingEntry>,
    /// Arguments to repeat when asking the compiler for its builtins.
    pub builtin_detection_args: Vec<String>,
}

impl From<ParseContext> for ParseResult {
    fn from(context: ParseContext) -> Self {
        let (entries, builtin_detection_args) = context.into_parts();
        Self { entries, builtin_detection_args }
    }
}

/// Drives a set of arglets over an argument string.
pub struct ArgumentParser<'a> {
    arglets: &'a [Arglet],
    dialect: Dialect,
    responses: &'a ResponseFiles,
}

impl<'a> ArgumentParser<'a> {
    pub fn new(arglets: &'a [Arglet], dialect: Dialect, responses: &'a ResponseFiles) -> Self {
        Self { arglets, dialect, responses }
    }

    /// Parses the arguments of a command executed in `cwd`.
    ///
    /// The arguments must not contain the executable itself.
    pub fn parse(&self, cwd: &Path, arguments: &str) -> ParseResult {
        let mut context = ParseContext::new(cwd);
        self.scan(&mut context, arguments, 0);
        ParseResult::from(context)
    }

    fn scan(&self, context: &mut ParseContext, arguments: &str, depth: usize) {
        let mut position = 0;
        while position < arguments.len() {
            let rest = &arguments[position..];
            let head = rest.trim_start();
            if head.is_empty() {
                break;
            }
            position += rest.len() - head.len();
            position += self.consume(context, head, depth);
        }
    }

    /// Consumes the option at the head of `args` and returns its length.
    fn consume(&self, context: &mut ParseContext, args: &str, depth: usize) -> usize {
        if let Some((consumed, contents)) = self.responses.expand(self.dialect, args, context.cwd(), depth) {
            self.scan(context, &contents, depth + 1);
            return consumed;
        }
        for arglet in self.arglets {
            let consumed = arglet.try_consume(context, args);
            if consumed > 0 {
                return consumed;
            }
        }
        let (consumed, token) = split_token(self.dialect, args);
        log::debug!("Argument not recognized, skipping: {token}");
        consumed
    }
}

/// Arglets of GCC compatible compilers.
pub static GCC_ARGLETS: LazyLock<Vec<Arglet>> = LazyLock::new(|| {
    vec![
        Arglet::include_path("-I", IncludeKind::Normal, Dialect::Posix),
        Arglet::include_path("-isystem=?|-idirafter", IncludeKind::System, Dialect::Posix),
        Arglet::include_path("-iquote", IncludeKind::Quote, Dialect::Posix),
        Arglet::macro_define("-D", Dialect::Posix),
        Arglet::macro_undefine("-U", Dialect::Posix),
        Arglet::language_standard(r"--?std(?:=|\s+)", Dialect::Posix),
        Arglet::sysroot(Dialect::Posix),
    ]
});

/// Arglets of the CUDA compiler driver, which also takes long option names.
pub static NVCC_ARGLETS: LazyLock<Vec<Arglet>> = LazyLock::new(|| {
    vec![
        Arglet::include_path("-I|--include-path=?", IncludeKind::Normal, Dialect::Posix),
        Arglet::include_path("-isystem=?|--system-include=?", IncludeKind::System, Dialect::Posix),
        Arglet::macro_define("-D|--define-macro=?", Dialect::Posix),
        Arglet::macro_undefine("-U|--undefine-macro=?", Dialect::Posix),
        Arglet::language_standard(r"--?std(?:=|\s+)", Dialect::Posix),
    ]
});

/// Arglets of the MSVC compiler, options start with either `/` or `-`.
pub static MSVC_ARGLETS: LazyLock<Vec<Arglet>> = LazyLock::new(|| {
    vec![
        Arglet::include_path("[-/]I", IncludeKind::Normal, Dialect::Windows),
        Arglet::macro_define("[-/]D", Dialect::Windows),
        Arglet::macro_undefine("[-/]U", Dialect::Windows),
        Arglet::language_standard("[-/]std:", Dialect::Windows),
    ]
});
