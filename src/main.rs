// Copyright Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#![deny(warnings, clippy::all)]

use std::process::ExitCode;

use clap::Parser;
use commandline::Cli;
use lanwake::config;

mod commandline;

/// Set up logging.
///
/// Log to stderr; `$LANWAKE_LOG` configures the log level.
fn setup_logging() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_env(config::LOG_ENV_VAR)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    setup_logging();
    let cli = Cli::parse();
    log::debug!("Running {:?}", cli.command);
    cli.run().await
}
