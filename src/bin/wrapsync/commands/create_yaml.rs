//! `wrapsync create-yaml` command

use std::process::ExitCode;

use anyhow::Result;

use crate::cli::{CreateYamlArgs, GlobalArgs};
use crate::commands::Session;
use wrapsync::extract;
use wrapsync::ops::create_yaml::{create_yaml, CreateOptions, WriteStatus};
use wrapsync::util::fs::to_slash;
use wrapsync::util::Status;

pub fn execute(args: CreateYamlArgs, global: &GlobalArgs) -> Result<ExitCode> {
    let session = Session::open(global)?;
    let extractor = extract::from_config(&session.config);

    let opts = CreateOptions {
        write: args.write,
        jobs: session.jobs(args.jobs),
        scratch_dir: session.user_path(args.scratch_dir.as_deref()),
    };
    let reports = create_yaml(
        &session.project,
        &session.config,
        &session.shell,
        extractor.as_ref(),
        &opts,
    )?;

    for report in &reports {
        let path = to_slash(&report.descriptor);
        match report.status {
            WriteStatus::Written => session.shell.status(Status::Created, &path),
            WriteStatus::AlreadyExists => session
                .shell
                .status(Status::Skipped, format!("{} already exists!", path)),
            WriteStatus::NotWritten => {}
        }
        println!("{}", report.render());
    }

    Ok(ExitCode::SUCCESS)
}
