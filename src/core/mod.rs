//! Core data model: project declaration, descriptor documents and header
//! signature reports.

pub mod document;
pub mod project;
pub mod signature;

pub use document::{Document, DocumentError, Mapping, Node, NodePath, Scalar, Segment};
pub use project::{ExtensionModule, HeaderDecl, InvalidModule, Project, ProjectError};
pub use signature::{ClassSig, FunctionSig, SignatureReport};
