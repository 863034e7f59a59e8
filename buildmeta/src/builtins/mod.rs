// SPDX-License-Identifier: GPL-3.0-or-later

//! Builtin detection.
//!
//! Compilers can be asked to print their predefined macros and their default
//! include search path. This module describes, per compiler family, how to
//! ask (the enabling arguments and a synthetic input file) and how to read
//! the answer (a line processor). Running the compiler is left to the caller;
//! its output is expected to be streamed through an
//! [`OutputSniffer`](crate::sniffer::OutputSniffer) into the processor.

pub mod gcc;

pub use gcc::GccOutputProcessor;

use crate::settings::SharedEntries;
use std::fmt;

/// Receives the output of a process line by line.
pub trait LineProcessor: Send {
    /// Called with every complete line, without the line terminator.
    fn process_line(&mut self, line: &str);

    /// Called once when the stream ends. Calling it again has no effect.
    fn shutdown(&mut self) {}
}

impl<P: LineProcessor + ?Sized> LineProcessor for Box<P> {
    fn process_line(&mut self, line: &str) {
        (**self).process_line(line)
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}

/// The capabilities of a compiler family for builtin detection.
pub trait BuiltinsDetectionBehavior: Send + Sync + fmt::Debug {
    /// Arguments that switch the compiler into self description mode.
    fn enabling_arguments(&self) -> &'static [&'static str];

    /// Creates a processor that appends its findings to `entries`.
    fn create_processor(&self, entries: SharedEntries) -> Box<dyn LineProcessor>;

    /// Whether a non-zero exit status of the detection run is a failure.
    fn fail_on_error(&self) -> bool;

    /// The extension of the synthetic input file for a language, if the
    /// language is supported.
    fn input_extension(&self, language: &str) -> Option<&'static str>;

    /// Assembles the command that reveals the builtins.
    ///
    /// The arguments collected while parsing the compiler command line come
    /// first, so they can change what the compiler reports.
    fn detection_command(&self, compiler: &str, arguments: &[String], language: &str) -> Option<Vec<String>> {
        let extension = self.input_extension(language)?;

        let mut command = Vec::with_capacity(arguments.len() + self.enabling_arguments().len() + 2);
        command.push(compiler.to_string());
        command.extend(arguments.iter().cloned());
        command.extend(self.enabling_arguments().iter().map(|argument| argument.to_string()));
        command.push(format!("spec.{extension}"));
        Some(command)
    }
}

/// GCC and the compilers that mimic its command line.
#[derive(Debug, Default)]
pub struct GccBuiltins;

impl BuiltinsDetectionBehavior for GccBuiltins {
    fn enabling_arguments(&self) -> &'static [&'static str] {
        &["-E", "-P", "-dM", "-Wp,-v"]
    }

    fn create_processor(&self, entries: SharedEntries) -> Box<dyn LineProcessor> {
        Box::new(GccOutputProcessor::new(entries))
    }

    fn fail_on_error(&self) -> bool {
        true
    }

    fn input_extension(&self, language: &str) -> Option<&'static str> {
        match language {
            "c" => Some("c"),
            "c++" | "cpp" | "cxx" => Some("cpp"),
            _ => None,
        }
    }
}

/// Clang prints the same format as GCC, but needs `-v` for the search path.
#[derive(Debug, Default)]
pub struct ClangBuiltins;

impl BuiltinsDetectionBehavior for ClangBuiltins {
    fn enabling_arguments(&self) -> &'static [&'static str] {
        &["-E", "-P", "-dM", "-v"]
    }

    fn create_processor(&self, entries: SharedEntries) -> Box<dyn LineProcessor> {
        Box::new(GccOutputProcessor::new(entries))
    }

    fn fail_on_error(&self) -> bool {
        true
    }

    fn input_extension(&self, language: &str) -> Option<&'static str> {
        match language {
            "c" => Some("c"),
            "c++" | "cpp" | "cxx" => Some("cpp"),
            "objc" => Some("m"),
            "objc++" => Some("mm"),
            _ => None,
        }
    }
}

/// The CUDA driver forwards the request to the host compiler.
///
/// The host compiler output arrives through the driver, which exits with
/// failure on an empty translation unit.
#[derive(Debug, Default)]
pub struct NvccBuiltins;

impl BuiltinsDetectionBehavior for NvccBuiltins {
    fn enabling_arguments(&self) -> &'static [&'static str] {
        &["-E", "-Xcompiler", "-P", "-Xcompiler", "-dM", "-Xcompiler", "-v"]
    }

    fn create_processor(&self, entries: SharedEntries) -> Box<dyn LineProcessor> {
        Box::new(GccOutputProcessor::new(entries))
    }

    fn fail_on_error(&self) -> bool {
        false
    }

    fn input_extension(&self, language: &str) -> Option<&'static str> {
        match language {
            "cuda" | "cu" => Some("cu"),
            "c" => Some("c"),
            "c++" | "cpp" | "cxx" => Some("cpp"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Origin, SettingEntry};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn test_gcc_detection_command() {
        let sut = GccBuiltins;

        let result = sut.detection_command("/usr/bin/g++", &strings(&["-std=c++17", "--sysroot=/opt/arm"]), "c++");

        assert_eq!(
            result,
            Some(strings(&[
                "/usr/bin/g++",
                "-std=c++17",
                "--sysroot=/opt/arm",
                "-E",
                "-P",
                "-dM",
                "-Wp,-v",
                "spec.cpp"
            ]))
        );
    }

    #[test]
    fn test_detection_command_for_unknown_language() {
        assert_eq!(GccBuiltins.detection_command("gcc", &[], "fortran"), None);
        assert_eq!(GccBuiltins.detection_command("gcc", &[], "cuda"), None);
        assert_eq!(
            ClangBuiltins.detection_command("clang", &[], "objc"),
            Some(strings(&["clang", "-E", "-P", "-dM", "-v", "spec.m"]))
        );
    }

    #[test]
    fn test_nvcc_behavior() {
        let sut = NvccBuiltins;

        assert!(!sut.fail_on_error());
        assert_eq!(sut.input_extension("cuda"), Some("cu"));
        assert_eq!(
            sut.detection_command("nvcc", &[], "cuda"),
            Some(strings(&["nvcc", "-E", "-Xcompiler", "-P", "-Xcompiler", "-dM", "-Xcompiler", "-v", "spec.cu"]))
        );
    }

    #[test]
    fn test_processor_writes_into_shared_entries() {
        let entries = SharedEntries::new();
        let mut processor = GccBuiltins.create_processor(entries.clone());

        processor.process_line("#define __GNUC__ 13");
        processor.shutdown();

        assert_eq!(entries.snapshot(), vec![SettingEntry::macro_define("__GNUC__", "13", Origin::Builtin)]);
        assert_eq!(entries.snapshot()[0].origin, Origin::Builtin);
    }
}
