//! `wrapsync scan-headers` command

use std::process::ExitCode;

use anyhow::Result;

use crate::cli::{GlobalArgs, ScanHeadersArgs};
use crate::commands::Session;
use wrapsync::ops::scan_headers::{scan_headers, ScanOptions};
use wrapsync::util::Status;

pub fn execute(args: ScanHeadersArgs, global: &GlobalArgs) -> Result<ExitCode> {
    let session = Session::open(global)?;
    session.shell.status(
        Status::Scanning,
        format!("{} module(s)", session.project.modules().len()),
    );

    let opts = ScanOptions {
        all: args.all,
        as_ignore: args.as_ignore,
    };
    let report = scan_headers(&session.project, &session.config, &opts)?;
    print!("{}", report.output);

    if args.check && report.has_difference {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
