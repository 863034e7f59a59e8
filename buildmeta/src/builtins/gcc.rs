// SPDX-License-Identifier: GPL-3.0-or-later

//! Reads the output of `cc -E -P -dM -v` style invocations.
//!
//! The macros are printed as `#define` lines on the standard output. The
//! search path is printed on the standard error, framed by the lines the
//! preprocessor itself writes:
//!
//! ```text
//! #include "..." search starts here:
//!  /work/local
//! #include <...> search starts here:
//!  /usr/lib/gcc/x86_64-linux-gnu/13/include
//!  /usr/include
//!  /System/Library/Frameworks (framework directory)
//! End of search list.
//! ```

use super::LineProcessor;
use crate::settings::{IncludeKind, Origin, SettingEntry, SharedEntries};
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

static DEFINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#define\s+([A-Za-z_$][\w$]*(?:\([^)]*\))?)(?:\s+(.*?))?\s*$").expect("Invalid define regex pattern")
});

static UNDEFINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#undef\s+([A-Za-z_$][\w$]*)\s*$").expect("Invalid undef regex pattern"));

static SEARCH_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+(.+?)(\s+\(framework directory\))?\s*$").expect("Invalid search path regex pattern")
});

const QUOTE_BLOCK_START: &str = "#include \"...\" search starts here:";
const SYSTEM_BLOCK_START: &str = "#include <...> search starts here:";
const BLOCK_END: &str = "End of search list.";

/// Classifies the lines of a GCC style builtins dump.
#[derive(Debug)]
pub struct GccOutputProcessor {
    entries: SharedEntries,
    /// The kind of the include block being read, if any.
    block: Option<IncludeKind>,
    shut_down: bool,
}

impl GccOutputProcessor {
    pub fn new(entries: SharedEntries) -> Self {
        Self { entries, block: None, shut_down: false }
    }

    fn classify(&mut self, line: &str) {
        match line.trim_end() {
            QUOTE_BLOCK_START => self.block = Some(IncludeKind::Quote),
            SYSTEM_BLOCK_START => self.block = Some(IncludeKind::System),
            BLOCK_END => self.block = None,
            _ => {
                if let Some(include) = self.block {
                    self.include_path(line, include);
                } else {
                    self.macro_line(line);
                }
            }
        }
    }

    fn include_path(&self, line: &str, include: IncludeKind) {
        if let Some(captures) = SEARCH_PATH.captures(line) {
            let include = if captures.get(2).is_some() { IncludeKind::Framework } else { include };
            let path = PathBuf::from(&captures[1]);
            self.entries.push(SettingEntry::include_path(path, include, Origin::Builtin));
        }
    }

    fn macro_line(&self, line: &str) {
        if let Some(captures) = DEFINE.captures(line) {
            let value = captures.get(2).map_or("", |value| value.as_str());
            self.entries.push(SettingEntry::macro_define(&captures[1], value, Origin::Builtin));
        } else if let Some(captures) = UNDEFINE.captures(line) {
            self.entries.push(SettingEntry::macro_undefine(&captures[1], Origin::Builtin));
        }
    }
}

impl LineProcessor for GccOutputProcessor {
    fn process_line(&mut self, line: &str) {
        if self.shut_down {
            log::debug!("Line after shutdown ignored: {line}");
            return;
        }
        self.classify(line);
    }

    fn shutdown(&mut self) {
        if !self.shut_down {
            self.shut_down = true;
            if self.block.take().is_some() {
                log::warn!("Builtin output ended inside the include search list");
            }
        }
    }
}
