//! `wrapsync update-yaml` command

use std::process::ExitCode;

use anyhow::Result;

use crate::cli::{GlobalArgs, UpdateYamlArgs};
use crate::commands::Session;
use wrapsync::extract;
use wrapsync::ops::update_yaml::{update_yaml, UpdateOptions, UpdateOutcome};

pub fn execute(args: UpdateYamlArgs, global: &GlobalArgs) -> Result<ExitCode> {
    let session = Session::open(global)?;
    let extractor = extract::from_config(&session.config);

    let opts = UpdateOptions {
        write: args.write,
        jobs: session.jobs(args.jobs),
        output_dir: session.user_path(args.output_dir.as_deref()),
        emit_plan: args.plan,
        scratch_dir: session.user_path(args.scratch_dir.as_deref()),
    };

    match update_yaml(
        &session.project,
        &session.config,
        &session.shell,
        extractor.as_ref(),
        &opts,
    )? {
        UpdateOutcome::Plan(json) => {
            println!("{}", json);
            Ok(ExitCode::SUCCESS)
        }
        UpdateOutcome::Synced { report, written } => {
            print!("{}", report.render(args.write));
            if let Some(count) = written {
                println!("{} files were updated", count);
                return Ok(ExitCode::SUCCESS);
            }

            // Dry run: the exit status says whether anything is pending.
            println!("{}", report.summary());
            if report.is_clean() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
