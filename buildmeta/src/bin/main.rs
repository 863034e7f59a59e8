// SPDX-License-Identifier: GPL-3.0-or-later

use buildmeta::{args, config, modes};
use std::env;
use std::path::Path;
use std::process::ExitCode;

/// Driver function of the application.
fn main() -> anyhow::Result<ExitCode> {
    // Parse the command line arguments.
    let matches = args::cli().get_matches();
    let arguments = args::Arguments::try_from(matches)?;
    // Initialize the logging system. `RUST_LOG` takes precedence over the flags.
    let level = match arguments.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    // Get the package name and version from Cargo
    let pkg_name = env!("CARGO_PKG_NAME");
    let pkg_version = env!("CARGO_PKG_VERSION");
    log::info!("{pkg_name} v{pkg_version}");
    log::info!("{arguments:?}");

    // Load the configuration.
    let current_directory = env::current_dir()?;
    let configuration = config::Loader::load(&current_directory, arguments.config.as_deref().map(Path::new))?;
    log::info!("{configuration}");

    // Run the application.
    let application = modes::Mode::configure(arguments, configuration)?;
    log::debug!("Configuration complete, running {application:?}");
    let result = application.run();
    log::debug!("Exit code: {result:?}");

    Ok(result)
}
