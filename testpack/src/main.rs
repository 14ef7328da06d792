// Copyright (c) The testpack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

mod cli;
mod errors;
mod orchestrator;
#[cfg(test)]
mod tests_integration;

use clap::Parser;
use cli::Cli;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt::init();
    testpack_core::stream_capture::install_panic_restore_hook();

    let cli = Cli::parse();

    match orchestrator::run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            error.display_to_stderr();
            std::process::exit(error.process_exit_code())
        }
    }
}
