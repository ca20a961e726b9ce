//! Shared test utilities for the dir-mirror workspace.
//!
//! This crate provides standardised tree fixtures so each crate's tests do not
//! rebuild the same source/replica scaffolding. It is a dev-dependency only,
//! never published.
//!
//! # Modules
//!
//! - [`tree`]: [`TestTree`] fixture with a source, a replica and a log file
//!   beside them, plus [`snapshot`] for comparing trees

pub mod tree;

pub use tree::{Node, TestTree, snapshot};
