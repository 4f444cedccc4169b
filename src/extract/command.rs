//! External extractor process.
//!
//! The configured command is run once per header with every input passed
//! as an argument:
//!
//! ```text
//! <command...> -I<dir>... -D<define>... --compiler <flavor> --depfile <path>
//!     [--descriptor <path>] [--report-only] <header>
//! ```
//!
//! `--descriptor` names the header's current descriptor and is passed only
//! when one exists. The program must print the header's report as a descriptor-vocabulary
//! YAML document on stdout and write the depfile itself.

use std::path::Path;

use crate::core::document::Document;
use crate::core::signature::SignatureReport;
use crate::extract::{ExtractError, ExtractRequest, Extractor, HeaderSignature};
use crate::util::process::{find_executable, ProcessBuilder};

/// Runs an external program per header.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    name: String,
    argv: Vec<String>,
}

impl CommandExtractor {
    /// `argv` is the program followed by its fixed leading arguments. It
    /// must not be empty.
    pub fn new(argv: Vec<String>) -> Self {
        let name = argv
            .first()
            .map(|program| {
                Path::new(program)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| program.clone())
            })
            .unwrap_or_default();
        CommandExtractor { name, argv }
    }

    /// Build the invocation for one request.
    pub fn command(&self, request: &ExtractRequest<'_>) -> ProcessBuilder {
        let (program, fixed) = match self.argv.split_first() {
            Some((program, rest)) => (program.as_str(), rest),
            None => ("", &[][..]),
        };
        let program = find_executable(program).unwrap_or_else(|| program.into());

        let action = request.action;
        let mut cmd = ProcessBuilder::new(program)
            .args(fixed)
            .cwd(request.project_root);
        for dir in &action.include_paths {
            cmd = cmd.arg(format!("-I{}", dir.display()));
        }
        for define in &action.defines {
            cmd = cmd.arg(format!("-D{}", define));
        }
        cmd = cmd
            .arg("--compiler")
            .arg(action.compiler.as_str())
            .arg("--depfile")
            .arg(&request.depfile);
        if action.descriptor_exists {
            cmd = cmd
                .arg("--descriptor")
                .arg(request.project_root.join(&action.descriptor));
        }
        if request.bootstrap {
            cmd = cmd.arg("--report-only");
        }
        cmd.arg(&action.header)
    }
}

impl Extractor for CommandExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, request: &ExtractRequest<'_>) -> Result<HeaderSignature, ExtractError> {
        let cmd = self.command(request);
        let command = cmd.display_command();
        tracing::debug!("running {}", command);

        let output = cmd.exec().map_err(|e| ExtractError::CommandFailed {
            command: command.clone(),
            status: "an error before starting".to_string(),
            output: format!("{:#}", e),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let captured = format!("{}{}", stdout, stderr);

        if !output.status.success() {
            return Err(ExtractError::CommandFailed {
                command,
                status: output.status.to_string(),
                output: captured,
            });
        }

        let header = request.action.header.display().to_string();
        let bad_output = |message: String| ExtractError::BadOutput {
            command: command.clone(),
            header: header.clone(),
            message,
            output: captured.clone(),
        };

        let doc = Document::parse(header.clone(), &stdout).map_err(|e| bad_output(e.to_string()))?;
        let report = SignatureReport::from_document(&doc).map_err(|e| bad_output(e.to_string()))?;

        Ok(HeaderSignature::new(report, request.descriptor))
    }
}
