//! Version numbers and requirement constraints.
//!
//! The core treats requirement text as opaque for resolution purposes, but it
//! needs to read and write it when turning a resolved version back into
//! requirement text. This module provides that grammar:
//!
//! - [`Version`] - dotted version numbers of any precision
//! - [`ResolvedVersion`] - a version or an opaque VCS revision
//! - [`Constraint`] - comma separated `operator version` clauses

pub mod constraint;
pub mod number;

pub use constraint::{ceiling_for, Clause, Constraint, Operator};
pub use number::{ResolvedVersion, Version};
