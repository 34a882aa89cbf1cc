//! Data model shared by every component.
//!
//! - [`Dependency`] and [`Requirement`] - what is being checked
//! - [`ProjectFileSet`] - the manifest, lock and auxiliary files of one unit
//! - [`Credentials`] - opaque secrets forwarded into sandboxes
//! - [`UpdatePolicy`] and [`UpdateStrategy`] - how far a check may reach

pub mod credentials;
pub mod dependency;
pub mod files;
pub mod policy;

pub use credentials::{Credential, Credentials};
pub use dependency::{Dependency, GitPin, GitSource, Requirement, RequirementSource};
pub use files::{ProjectFile, ProjectFileSet};
pub use policy::{UpdatePolicy, UpdateStrategy};
