// SPDX-License-Identifier: GPL-3.0-or-later

//! Regular expression matchers for option surface forms, and the quoting
//! rules shared by the arglets, the scanning driver and response files.

use regex::Regex;

/// The quoting conventions of the command line being parsed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Dialect {
    /// Backslash escapes the next character outside of single quotes.
    Posix,
    /// Backslash is literal, except in front of a double quote.
    Windows,
}

/// How a captured text is turned into a value.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(super) enum Unquote {
    /// Taken as is.
    Verbatim,
    /// Captured between double quotes.
    Double,
    /// Captured outside of quotes.
    Bare,
}

/// The values a matcher extracted from the head of the argument string.
#[derive(Debug, PartialEq)]
pub(super) struct OptionMatch {
    /// Number of bytes the option occupies, closing quotes included.
    pub consumed: usize,
    pub name: String,
    pub value: Option<String>,
}

/// Matches one surface form of an option at the start of the argument string.
///
/// The regular expression must be anchored and have a capture group named
/// `m` that spans the option text. The option must be followed by white
/// space or the end of the input, the separator itself is not consumed.
#[derive(Debug)]
pub(super) struct NameOptionMatcher {
    regex: Regex,
    name_group: usize,
    name_unquote: Unquote,
    value_group: Option<usize>,
    value_unquote: Unquote,
}

impl NameOptionMatcher {
    pub(super) fn new(body: &str, name_group: usize, name_unquote: Unquote) -> Self {
        Self {
            regex: anchored(body),
            name_group,
            name_unquote,
            value_group: None,
            value_unquote: Unquote::Verbatim,
        }
    }

    pub(super) fn with_value(mut self, group: usize, unquote: Unquote) -> Self {
        self.value_group = Some(group);
        self.value_unquote = unquote;
        self
    }

    pub(super) fn matches(&self, dialect: Dialect, args: &str) -> Option<OptionMatch> {
        let captures = self.regex.captures(args)?;
        let consumed = captures.name("m")?.end();
        let name = captures.get(self.name_group)?.as_str();
        let value = self
            .value_group
            .and_then(|group| captures.get(group))
            .map(|value| unquote(dialect, self.value_unquote, value.as_str()));

        Some(OptionMatch { consumed, name: unquote(dialect, self.name_unquote, name), value })
    }
}

/// Compiles an option body into an anchored expression that also requires a
/// separator after the option.
///
/// Panics on a malformed body; the bodies are built from constant fragments.
fn anchored(body: &str) -> Regex {
    let pattern = format!(r"^(?P<m>{body})(?:\s|$)");
    Regex::new(&pattern).unwrap_or_else(|error| panic!("invalid arglet pattern {pattern}: {error}"))
}

fn unquote(dialect: Dialect, style: Unquote, text: &str) -> String {
    match (style, dialect) {
        (Unquote::Verbatim, _) => text.to_string(),
        (Unquote::Double, Dialect::Posix) => unescape(text, |next| matches!(next, '"' | '\\' | '$' | '`')),
        (Unquote::Double, Dialect::Windows) => unescape(text, |next| next == '"'),
        (Unquote::Bare, Dialect::Posix) => unescape(text, |_| true),
        (Unquote::Bare, Dialect::Windows) => text.to_string(),
    }
}

/// Drops the backslash in front of the characters `escapable` accepts.
fn unescape(text: &str, escapable: impl Fn(char) -> bool) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(current) = chars.next() {
        match (current, chars.peek()) {
            ('\\', Some(&next)) if escapable(next) => {
                result.push(next);
                chars.next();
            }
            _ => result.push(current),
        }
    }
    result
}

/// Splits the first argument off the string.
///
/// Returns the number of bytes the raw token occupies and the token with one
/// level of quoting removed. The token ends at the first white space that is
/// neither escaped nor quoted; an unterminated quote runs to the end.
pub(crate) fn split_token(dialect: Dialect, args: &str) -> (usize, String) {
    let mut token = String::new();
    let mut quote: Option<char> = None;
    let mut chars = args.char_indices().peekable();

    while let Some((index, current)) = chars.next() {
        match (quote, current) {
            (None, c) if c.is_whitespace() => return (index, token),
            (None, '"' | '\'') => quote = Some(current),
            (Some(open), c) if c == open => quote = None,
            (Some('\''), c) => token.push(c),
            (_, '\\') => match (dialect, quote, chars.peek()) {
                (Dialect::Posix, None, Some(&(_, next))) => {
                    token.push(next);
                    chars.next();
                }
                (_, Some('"'), Some(&(_, next))) if next == '"' || (dialect == Dialect::Posix && next == '\\') => {
                    token.push(next);
                    chars.next();
                }
                _ => token.push('\\'),
            },
            (_, c) => token.push(c),
        }
    }
    (args.len(), token)
}
