//! Core domain types for the Pier index engine.
//!
//! This crate is deliberately I/O-free: project names, version ordering, the
//! distribution filename grammar, and the simple-index document models all
//! live here so every other crate (scanner, builder, query surface) agrees on
//! one vocabulary.

pub mod dist;
pub mod name;
pub mod simple;
pub mod version;

pub use dist::{DistFilename, DistKind, FilenameError};
pub use name::{NameError, NormalizedName};
pub use simple::{FileEntry, IndexMeta, ProjectDetail, ProjectList, ProjectRef};
pub use version::Version;
