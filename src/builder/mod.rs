//! Planning and running header extractions.
//!
//! [`plan::compile`] turns a project into a [`BuildPlan`], and a
//! [`JobExecutor`] runs it.

pub mod deps;
pub mod executor;
pub mod plan;

pub use deps::DependencyCache;
pub use executor::{ExtractionFailed, ExtractionSet, JobExecutor};
pub use plan::{BuildAction, BuildPlan, CompilerFlavor, PlanOptions};
