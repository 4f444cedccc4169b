//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Wrapsync - keeps binding descriptors in sync with C++ headers
#[derive(Parser)]
#[command(name = "wrapsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags accepted by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output and show the full error chain
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Path to the project file (default: search upward for Wrapsync.toml)
    #[arg(
        long = "project_file",
        visible_alias = "project-file",
        value_name = "PATH",
        global = true
    )]
    pub project_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List headers that no module declares yet
    ScanHeaders(ScanHeadersArgs),

    /// Report descriptor content missing for each header
    CreateYaml(CreateYamlArgs),

    /// Reconcile descriptors with their headers
    UpdateYaml(UpdateYamlArgs),
}

#[derive(Args)]
pub struct ScanHeadersArgs {
    /// Also list headers that are already declared
    #[arg(long)]
    pub all: bool,

    /// Print entries for `scan_headers_ignore` instead
    #[arg(long)]
    pub as_ignore: bool,

    /// Exit with an error if anything was printed
    #[arg(long)]
    pub check: bool,
}

#[derive(Args)]
pub struct CreateYamlArgs {
    /// Create descriptors that do not exist yet
    #[arg(long)]
    pub write: bool,

    /// Number of parallel jobs
    #[arg(short = 'j', long = "max-jobs", value_name = "N")]
    pub jobs: Option<usize>,

    /// Keep generated descriptors and depfiles in this directory
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct UpdateYamlArgs {
    /// Write the reconciled descriptors
    #[arg(long)]
    pub write: bool,

    /// Number of parallel jobs
    #[arg(short = 'j', long = "max-jobs", value_name = "N")]
    pub jobs: Option<usize>,

    /// Write below this directory instead of in place, dropping the first
    /// path component of each descriptor
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Print the build plan as JSON and exit
    #[arg(long)]
    pub plan: bool,

    /// Keep generated descriptors and depfiles in this directory
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,
}
