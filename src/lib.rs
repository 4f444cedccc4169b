//! Wrapsync - keeps binding descriptors in sync with C++ headers
//!
//! This crate provides the library behind the `wrapsync` command: project
//! loading, build planning, header extraction and descriptor
//! synchronization.

pub mod builder;
pub mod core;
pub mod extract;
pub mod ops;
pub mod sync;
pub mod util;

/// Fixtures and fake extractors for unit tests.
#[cfg(test)]
pub mod test_support;

pub use core::{document::Document, project::Project, signature::SignatureReport};
pub use util::context::GlobalContext;
