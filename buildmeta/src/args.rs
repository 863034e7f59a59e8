// SPDX-License-Identifier: GPL-3.0-or-later

//! This module contains the command line interface of the application.
//!
//! The command line parsing is implemented using the `clap` library.
//! The `Arguments` type is the structured form of a program invocation;
//! each subcommand maps to one `Mode` variant.

use crate::config::Family;
use anyhow::anyhow;
use clap::{ArgAction, ArgMatches, Command, arg, command, value_parser};
use std::path::PathBuf;

const MODE_PARSE_SUBCOMMAND: &str = "parse";
const MODE_BUILTINS_SUBCOMMAND: &str = "builtins";
const MODE_SCAN_SUBCOMMAND: &str = "scan";
const DEFAULT_FAMILY: &str = "gcc";

/// Represents the command line arguments of the application.
#[derive(Debug, PartialEq)]
pub struct Arguments {
    // The path of the configuration file.
    pub config: Option<String>,
    // How many times the verbose flag was given.
    pub verbose: u8,
    // The mode of the application.
    pub mode: Mode,
}

/// Represents the mode of the application.
#[derive(Debug, PartialEq)]
pub enum Mode {
    /// Extract the settings of compiler command lines.
    Parse {
        input: ParseInput,
        cwd: Option<PathBuf>,
        language: Option<String>,
    },
    /// Extract the builtin settings from the self description of a compiler.
    Builtins {
        family: Family,
        input: Option<PathBuf>,
        echo: bool,
    },
    /// Extract problem markers from the output of a build orchestrator.
    Scan {
        source_root: Option<PathBuf>,
        input: Option<PathBuf>,
    },
}

/// Where the command lines to parse come from.
#[derive(Debug, PartialEq)]
pub enum ParseInput {
    /// A single command line, as separate words or as one string.
    CommandLine(Vec<String>),
    /// The entries of a compilation database file.
    CompilationDatabase(PathBuf),
}

impl TryFrom<ArgMatches> for Arguments {
    type Error = anyhow::Error;

    fn try_from(matches: ArgMatches) -> Result<Self, Self::Error> {
        let config = matches.get_one::<String>("config").map(String::to_string);
        let verbose = matches.get_count("verbose");

        let mode = match matches.subcommand() {
            Some((MODE_PARSE_SUBCOMMAND, parse_matches)) => Mode::try_from(parse_matches)?,
            Some((MODE_BUILTINS_SUBCOMMAND, builtins_matches)) => {
                let family = builtins_matches
                    .get_one::<String>("family")
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_FAMILY);
                Mode::Builtins {
                    family: family_from(family)?,
                    input: builtins_matches.get_one::<PathBuf>("input").cloned(),
                    echo: builtins_matches.get_flag("echo"),
                }
            }
            Some((MODE_SCAN_SUBCOMMAND, scan_matches)) => Mode::Scan {
                source_root: scan_matches.get_one::<PathBuf>("source-root").cloned(),
                input: scan_matches.get_one::<PathBuf>("input").cloned(),
            },
            _ => return Err(anyhow!("unrecognized subcommand")),
        };
        Ok(Arguments { config, verbose, mode })
    }
}

impl TryFrom<&ArgMatches> for Mode {
    type Error = anyhow::Error;

    fn try_from(matches: &ArgMatches) -> Result<Self, Self::Error> {
        let input = match matches.get_one::<PathBuf>("compile-commands") {
            Some(path) => ParseInput::CompilationDatabase(path.clone()),
            None => {
                let arguments: Vec<String> = matches
                    .get_many::<String>("COMMAND")
                    .ok_or_else(|| anyhow!("missing compiler command"))?
                    .cloned()
                    .collect();
                ParseInput::CommandLine(arguments)
            }
        };
        Ok(Mode::Parse {
            input,
            cwd: matches.get_one::<PathBuf>("cwd").cloned(),
            language: matches.get_one::<String>("language").cloned(),
        })
    }
}

fn family_from(name: &str) -> anyhow::Result<Family> {
    match name {
        "gcc" => Ok(Family::Gcc),
        "clang" => Ok(Family::Clang),
        "nvcc" => Ok(Family::Nvcc),
        "intel" => Ok(Family::Intel),
        _ => Err(anyhow!("no builtin detection for compiler family: {name}")),
    }
}

/// Represents the command line interface of the application.
///
/// This describes how the user can interact with the application.
/// The three pipelines of the application are the subcommands.
pub fn cli() -> Command {
    command!()
        .subcommand_required(true)
        .arg_required_else_help(true)
        .args(&[
            arg!(-v --verbose ... "Sets the level of verbosity").action(ArgAction::Count),
            arg!(-c --config <FILE> "Path of the config file"),
        ])
        .subcommand(
            Command::new(MODE_PARSE_SUBCOMMAND)
                .about("extracts include paths and macros from compiler command lines")
                .args(&[
                    arg!([COMMAND] "Compiler command line")
                        .action(ArgAction::Append)
                        .num_args(1..)
                        .last(true)
                        .required_unless_present("compile-commands")
                        .conflicts_with("compile-commands"),
                    arg!(--"compile-commands" <FILE> "Path of a compilation database to parse")
                        .value_parser(value_parser!(PathBuf)),
                    arg!(--cwd <DIR> "Directory to resolve relative paths against")
                        .value_parser(value_parser!(PathBuf)),
                    arg!(--language <LANG> "Language of the source, guessed from the source file if not given"),
                ])
                .arg_required_else_help(true),
        )
        .subcommand(
            Command::new(MODE_BUILTINS_SUBCOMMAND)
                .about("extracts builtin include paths and macros from compiler output")
                .args(&[
                    arg!(--family <FAMILY> "Compiler family that produced the output")
                        .value_parser([DEFAULT_FAMILY, "clang", "nvcc", "intel"])
                        .default_value(DEFAULT_FAMILY)
                        .hide_default_value(false),
                    arg!(-i --input <FILE> "Path of the compiler output, standard input if not given")
                        .value_parser(value_parser!(PathBuf)),
                    arg!(--echo "Forward the compiler output to the standard output")
                        .action(ArgAction::SetTrue),
                ]),
        )
        .subcommand(
            Command::new(MODE_SCAN_SUBCOMMAND)
                .about("extracts problem markers from build orchestrator output")
                .args(&[
                    arg!(--"source-root" <DIR> "Directory script paths are relative to")
                        .value_parser(value_parser!(PathBuf)),
                    arg!(-i --input <FILE> "Path of the build output, standard input if not given")
                        .value_parser(value_parser!(PathBuf)),
                ]),
        )
}
