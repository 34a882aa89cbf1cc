//! Disposable probe files.
//!
//! A probe is a modified copy of the project's files asking the resolution
//! tool one question: "is there a version of D compatible with everything
//! else, under this constraint?"
//!
//! - [`ManifestEditor`] - an ecosystem's manifest/lock grammar
//! - [`ManifestProbeBuilder`] - relaxes constraints and unlocks per [`UpdatePolicy`](crate::model::UpdatePolicy)
//! - [`PatchPipeline`] - named workaround rewrites applied last

pub mod builder;
pub mod editor;
pub mod patch;

pub use builder::{ManifestProbeBuilder, ProbeBuilder, ProbeRequest};
pub use editor::{EntryEdit, ManifestEditor, ManifestEntry};
pub use patch::{PatchPipeline, PatchTarget, QuirkPatch, BUILTIN_PATCH_NAMES};
