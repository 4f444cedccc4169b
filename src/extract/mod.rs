//! Header signature extraction.
//!
//! An [`Extractor`] turns one header plus its current descriptor into a
//! [`SignatureReport`]. Two implementations ship: the built-in
//! [`HeaderScanner`] and [`CommandExtractor`], which delegates to an
//! external program configured in `[extractor] command`.

pub mod command;
pub mod scanner;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::builder::plan::BuildAction;
use crate::core::document::Document;
use crate::core::signature::SignatureReport;
use crate::util::config::Config;

pub use command::CommandExtractor;
pub use scanner::HeaderScanner;

/// Everything one extraction may look at. All of it is read-only.
#[derive(Debug)]
pub struct ExtractRequest<'a> {
    pub action: &'a BuildAction,
    /// Current descriptor, empty when none exists yet
    pub descriptor: &'a Document,
    /// Absolute depfile path inside the scratch area
    pub depfile: PathBuf,
    /// Bootstrap mode: tolerate problems that would otherwise fail the job
    pub bootstrap: bool,
    pub project_root: &'a Path,
}

/// Result of one extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSignature {
    pub report: SignatureReport,
    /// The part of `report` the descriptor does not mention yet
    pub missing: SignatureReport,
}

impl HeaderSignature {
    pub fn new(report: SignatureReport, descriptor: &Document) -> Self {
        let missing = report.missing_from(descriptor);
        HeaderSignature { report, missing }
    }
}

/// Error raised by a single extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("I/O error on `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}\n{output}")]
    CommandFailed {
        command: String,
        status: String,
        output: String,
    },

    #[error("`{command}` produced unusable output for `{header}`: {message}\n{output}")]
    BadOutput {
        command: String,
        header: String,
        message: String,
        output: String,
    },

    #[error("could not parse `{header}`: {message}")]
    Parse { header: String, message: String },
}

/// A header analysis backend. Implementations must be usable from many
/// worker threads at once and must not keep per-call state.
pub trait Extractor: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Analyse one header.
    fn extract(&self, request: &ExtractRequest<'_>) -> Result<HeaderSignature, ExtractError>;
}

/// Pick the extractor configured for this run.
pub fn from_config(config: &Config) -> Box<dyn Extractor> {
    match &config.extractor.command {
        Some(argv) if !argv.is_empty() => {
            tracing::debug!("using external extractor `{}`", argv.join(" "));
            Box::new(CommandExtractor::new(argv.clone()))
        }
        _ => Box::new(HeaderScanner::new()),
    }
}
