//! Wrapsync CLI - keeps binding descriptors in sync with C++ headers

use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands, GlobalArgs};
use wrapsync::core::document::DocumentError;
use wrapsync::core::project::ProjectError;
use wrapsync::sync::{ReconcileError, ReconcileFailures};
use wrapsync::util::diagnostic::{emit, render_source_diagnostic, suggestions};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.global.verbose {
        EnvFilter::new("wrapsync=debug")
    } else {
        EnvFilter::new("wrapsync=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let global = cli.global.clone();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            report_error(&e, &global);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let global = &cli.global;
    match cli.command {
        Commands::ScanHeaders(args) => commands::scan_headers::execute(args, global),
        Commands::CreateYaml(args) => commands::create_yaml::execute(args, global),
        Commands::UpdateYaml(args) => commands::update_yaml::execute(args, global),
    }
}

/// Print an error: the full chain under `-v`, otherwise a short summary.
fn report_error(e: &anyhow::Error, global: &GlobalArgs) {
    if global.verbose {
        eprintln!("error: {:?}", e);
        return;
    }

    let color = !global.no_color && std::io::stderr().is_terminal();

    if let Some(failures) = e.downcast_ref::<ReconcileFailures>() {
        for error in &failures.errors {
            match error {
                ReconcileError::Malformed(doc) => {
                    eprint!("{}", render_source_diagnostic(doc, color))
                }
                ReconcileError::Read { .. } => eprintln!("error: {}", error),
            }
        }
        eprintln!(
            "error: {} descriptor(s) could not be reconciled; nothing was written",
            failures.errors.len()
        );
    } else if let Some(err) = e.downcast_ref::<ProjectError>() {
        emit(&err.to_diagnostic(), color);
    } else if let Some(err) = e.downcast_ref::<DocumentError>() {
        eprint!("{}", render_source_diagnostic(err, color));
    } else {
        eprintln!("error: {}", e);
    }
    eprintln!("\n{}", suggestions::VERBOSE);
}
