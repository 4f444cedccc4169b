//! Command implementations

pub mod create_yaml;
pub mod scan_headers;
pub mod update_yaml;

use anyhow::Result;

use crate::cli::GlobalArgs;
use wrapsync::core::project::Project;
use wrapsync::util::config::Config;
use wrapsync::util::{GlobalContext, Shell};

/// Everything a command needs before it starts.
pub struct Session {
    pub ctx: GlobalContext,
    pub project: Project,
    pub config: Config,
    pub shell: Shell,
}

impl Session {
    pub fn open(global: &GlobalArgs) -> Result<Self> {
        let mut ctx = GlobalContext::new()?;
        ctx.set_verbose(global.verbose);

        let project_file = ctx.find_project_file(global.project_file.as_deref())?;
        let project = Project::load(&project_file)?;
        let config = ctx.load_config(project.root());
        tracing::debug!("loaded {}", project_file.display());

        Ok(Session {
            shell: Shell::from_flags(global.verbose, global.no_color),
            ctx,
            project,
            config,
        })
    }

    /// Resolve a user-supplied path against the working directory.
    pub fn user_path(&self, path: Option<&std::path::Path>) -> Option<std::path::PathBuf> {
        path.map(|p| self.ctx.cwd().join(p))
    }

    /// Jobs from the command line, falling back to the tool config.
    pub fn jobs(&self, cli: Option<usize>) -> Option<usize> {
        cli.or(self.config.build.jobs)
    }
}
