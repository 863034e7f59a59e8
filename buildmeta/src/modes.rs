// SPDX-License-Identifier: GPL-3.0-or-later

use crate::arglets::{Dialect, ResponseFiles};
use crate::args::{self, ParseInput};
use crate::config::{self, Family};
use crate::diagnostics::ConsoleScanner;
use crate::output::{self, ParseReport};
use crate::settings::SharedEntries;
use crate::sniffer::OutputSniffer;
use crate::tools::{self, DetectorError, ToolChain, ToolDetector};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::{env, fmt, slice};

/// Represent the modes the application can run in.
///
/// Each mode is one pipeline of the library: command line parsing, builtin
/// detection output processing, and build output scanning.
pub enum Mode {
    Parse(Parser, ParseInput),
    Builtins {
        tool: ToolChain,
        input: Option<PathBuf>,
        echo: bool,
    },
    Scan {
        source_root: PathBuf,
        input: Option<PathBuf>,
    },
}

/// Everything needed to turn a command line into a report.
pub struct Parser {
    detector: ToolDetector,
    responses: ResponseFiles,
    cwd: PathBuf,
    language: Option<String>,
}

impl Mode {
    /// Configure the application mode based on the command line arguments and the configuration.
    pub fn configure(args: args::Arguments, config: config::Main) -> Result<Self, ConfigurationError> {
        match args.mode {
            args::Mode::Parse { input, cwd, language } => {
                log::debug!("Mode: parse compiler command lines");

                let detector = ToolDetector::new(
                    tools::signatures_with(&config.tools),
                    config.detection.version_suffix.as_deref(),
                    config.detection.windows_conventions,
                )?;
                let responses = ResponseFiles::new(config.response_files.marker, config.response_files.max_depth);
                let cwd = match cwd {
                    Some(cwd) => cwd,
                    None => env::current_dir().map_err(ConfigurationError::WorkingDirectory)?,
                };

                Ok(Self::Parse(Parser { detector, responses, cwd, language }, input))
            }
            args::Mode::Builtins { family, input, echo } => {
                log::debug!("Mode: process builtin detection output of {family}");

                let tool = ToolChain::for_family(family);
                if tool.builtins().is_none() {
                    return Err(ConfigurationError::NoBuiltinDetection(family));
                }
                Ok(Self::Builtins { tool, input, echo })
            }
            args::Mode::Scan { source_root, input } => {
                log::debug!("Mode: scan build output for problems");

                let source_root = source_root.unwrap_or(config.diagnostics.source_root);
                Ok(Self::Scan { source_root, input })
            }
        }
    }

    /// It actually runs the application mode.
    ///
    /// The results go to the standard output. When the builtin detection
    /// output is echoed there, the results go to the standard error instead.
    pub fn run(self) -> ExitCode {
        let echo = matches!(self, Self::Builtins { echo: true, .. });
        let status = if echo {
            self.execute(&mut io::stderr().lock(), &mut io::stdout().lock())
        } else {
            self.execute(&mut io::stdout().lock(), &mut io::sink())
        };
        match status {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                log::error!("buildmeta: {error}");
                ExitCode::FAILURE
            }
        }
    }

    /// Runs the pipeline and writes the results to `out`.
    ///
    /// The input of the builtin detection is forwarded to `echo`.
    pub fn execute(self, out: &mut dyn Write, echo: &mut dyn Write) -> Result<(), RunError> {
        match self {
            Self::Parse(parser, ParseInput::CommandLine(arguments)) => {
                let command = match arguments.as_slice() {
                    [single] => single.clone(),
                    words => parser.join(words),
                };
                let report = parser.parse(&parser.cwd, &command, None);
                output::serialize_one(&mut *out, &report)?;
            }
            Self::Parse(parser, ParseInput::CompilationDatabase(path)) => {
                let file = File::open(&path).map_err(|source| RunError::InputAccess { path: path.clone(), source })?;
                let commands = output::read_compile_commands(BufReader::new(file))
                    .map_err(|source| RunError::CompilationDatabase { path, source })?;
                log::info!("Parsing {} compilation database entries", commands.len());

                let reports = commands.iter().map(|entry| {
                    let directory = parser.cwd.join(&entry.directory);
                    let command = entry.command_line(parser.dialect_of(&entry.arguments));
                    parser.parse(&directory, &command, language_of(&entry.file))
                });
                output::serialize_seq(&mut *out, reports)?;
            }
            Self::Builtins { tool, input, echo: _ } => {
                let Some(behavior) = tool.builtins() else {
                    return Err(RunError::NoBuiltinDetection(tool.family()));
                };
                let entries = SharedEntries::new();
                let mut reader = open(input.as_deref())?;
                let mut sniffer = OutputSniffer::new(&mut *echo, behavior.create_processor(entries.clone()));
                io::copy(&mut reader, &mut sniffer).map_err(RunError::Transfer)?;
                sniffer.close().map_err(RunError::Transfer)?;
                drop(sniffer);

                if entries.is_empty() {
                    log::warn!("No builtin settings found in the {} output", tool.family());
                } else {
                    log::info!("Found {} builtin settings", entries.len());
                }
                output::serialize_seq(&mut *out, entries.snapshot().iter())?;
            }
            Self::Scan { source_root, input } => {
                let reader = open(input.as_deref())?;
                let mut scanner = ConsoleScanner::new(source_root, Vec::new());
                scanner.scan(reader).map_err(RunError::Transfer)?;
                let markers = scanner.into_sink();

                log::info!("Found {} problem markers", markers.len());
                output::serialize_seq(&mut *out, markers.iter())?;
            }
        }
        writeln!(out).map_err(RunError::Transfer)
    }
}

impl Parser {
    fn parse(&self, directory: &Path, command: &str, guessed_language: Option<&str>) -> ParseReport {
        let Some(detection) = self.detector.detect(command) else {
            let executable = command.split_whitespace().next().unwrap_or_default();
            log::info!("Not a known compiler: {executable}");
            return ParseReport::unrecognized(executable, directory);
        };

        let result = detection.tool.parser(&self.responses).parse(directory, detection.arguments);
        let language = self
            .language
            .as_deref()
            .or(guessed_language)
            .or_else(|| language_in(detection.arguments));
        let detection_command = match (detection.tool.builtins(), language) {
            (Some(behavior), Some(language)) => {
                behavior.detection_command(&detection.executable, &result.builtin_detection_args, language)
            }
            _ => None,
        };

        let mut report = ParseReport::recognized(detection.executable, detection.tool.family(), directory, result);
        report.detection_command = detection_command;
        report
    }

    /// Joins the words with the quoting rules of the tool they invoke.
    fn join(&self, words: &[String]) -> String {
        output::join_words(words, self.dialect_of(words))
    }

    /// The quoting dialect of the tool the first word names.
    fn dialect_of(&self, words: &[String]) -> Dialect {
        let Some(executable) = words.first() else {
            return Dialect::Posix;
        };
        let executable = output::join_words(slice::from_ref(executable), Dialect::Posix);
        self.detector
            .detect(&executable)
            .map_or(Dialect::Posix, |detection| detection.tool.dialect())
    }
}


/// Guesses the language from the first source file on the command line.
fn language_in(arguments: &str) -> Option<&'static str> {
    let words = shell_words::split(arguments).ok()?;
    words.iter().find_map(|word| language_of(Path::new(word)))
}

fn language_of(file: &Path) -> Option<&'static str> {
    match file.extension()?.to_str()? {
        "c" => Some("c"),
        "cc" | "cp" | "cpp" | "cxx" | "c++" | "C" => Some("c++"),
        "cu" => Some("cuda"),
        "m" => Some("objc"),
        "mm" => Some("objc++"),
        _ => None,
    }
}

fn open(input: Option<&Path>) -> Result<Box<dyn BufRead>, RunError> {
    match input {
        None => Ok(Box::new(io::stdin().lock())),
        Some(path) => {
            let file = File::open(path).map_err(|source| RunError::InputAccess { path: path.to_path_buf(), source })?;
            Ok(Box::new(BufReader::new(file)))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Failed to create tool detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("Failed to get working directory: {0}")]
    WorkingDirectory(io::Error),
    #[error("Builtin detection is not supported for {0}")]
    NoBuiltinDetection(Family),
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Failed to open input {path}: {source}", path = .path.display())]
    InputAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to read compilation database {path}: {source}", path = .path.display())]
    CompilationDatabase {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to transfer data: {0}")]
    Transfer(io::Error),
    #[error("Failed to write output: {0}")]
    Output(#[from] serde_json::Error),
    #[error("Builtin detection is not supported for {0}")]
    NoBuiltinDetection(Family),
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(parser, input) => f
                .debug_struct("Parse")
                .field("cwd", &parser.cwd)
                .field("language", &parser.language)
                .field("input", input)
                .finish(),
            Self::Builtins { tool, input, echo } => f
                .debug_struct("Builtins")
                .field("family", &tool.family())
                .field("input", input)
                .field("echo", echo)
                .finish(),
            Self::Scan { source_root, input } => f
                .debug_struct("Scan")
                .field("source_root", source_root)
                .field("input", input)
                .finish(),
        }
    }
}
