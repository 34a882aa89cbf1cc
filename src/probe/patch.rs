//! Named workaround rewrites for known resolver defects.
//!
//! Each patch is a pure, idempotent function over one file's text. Patches run
//! in order after the main probe rewrite and can be disabled by name.

use crate::model::ProjectFileSet;
use std::collections::BTreeSet;
use tracing::debug;

/// Which probe file a patch applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchTarget {
    Manifest,
    Lockfile,
    /// Every file in the probe.
    Any,
}

/// One named rewrite step.
#[derive(Debug, Clone, Copy)]
pub struct QuirkPatch {
    pub name: &'static str,
    pub target: PatchTarget,
    pub apply: fn(&str) -> String,
}

impl QuirkPatch {
    pub const fn new(name: &'static str, target: PatchTarget, apply: fn(&str) -> String) -> Self {
        Self {
            name,
            target,
            apply,
        }
    }
}

/// Ordered patches plus the names switched off.
#[derive(Debug, Clone, Default)]
pub struct PatchPipeline {
    patches: Vec<QuirkPatch>,
    disabled: BTreeSet<String>,
}

impl PatchPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in patches in their standard order.
    pub fn builtin() -> Self {
        Self {
            patches: BUILTIN_PATCHES.to_vec(),
            disabled: BTreeSet::new(),
        }
    }

    pub fn with_patch(mut self, patch: QuirkPatch) -> Self {
        self.patches.push(patch);
        self
    }

    /// Skip the patch called `name`.
    pub fn disable(mut self, name: impl Into<String>) -> Self {
        self.disabled.insert(name.into());
        self
    }

    /// Patches that will run, in order.
    pub fn active(&self) -> impl Iterator<Item = &QuirkPatch> {
        self.patches
            .iter()
            .filter(|p| !self.disabled.contains(p.name))
    }

    /// Run every active patch over the files they target.
    pub fn apply(
        &self,
        files: &ProjectFileSet,
        manifest: &str,
        lockfile: Option<&str>,
    ) -> ProjectFileSet {
        let mut out = files.clone();
        for patch in self.active() {
            for file in files.files() {
                let targeted = match patch.target {
                    PatchTarget::Any => true,
                    PatchTarget::Manifest => file.name == manifest,
                    PatchTarget::Lockfile => Some(file.name.as_str()) == lockfile,
                };
                if !targeted {
                    continue;
                }
                let Some(current) = out.content(&file.name) else {
                    continue;
                };
                let patched = (patch.apply)(current);
                if patched != current {
                    debug!("Patch '{}' rewrote {}", patch.name, file.name);
                    out = out.with_content(&file.name, patched);
                }
            }
        }
        out
    }
}

/// Names of the built-in patches.
pub const BUILTIN_PATCH_NAMES: &[&str] = &[
    "strip_byte_order_mark",
    "normalize_line_endings",
    "strip_bundled_with",
];

const BUILTIN_PATCHES: &[QuirkPatch] = &[
    QuirkPatch::new(
        "strip_byte_order_mark",
        PatchTarget::Any,
        strip_byte_order_mark,
    ),
    QuirkPatch::new(
        "normalize_line_endings",
        PatchTarget::Any,
        normalize_line_endings,
    ),
    QuirkPatch::new(
        "strip_bundled_with",
        PatchTarget::Lockfile,
        strip_bundled_with,
    ),
];

/// Some resolvers reject a leading UTF-8 byte order mark.
pub fn strip_byte_order_mark(text: &str) -> String {
    text.strip_prefix('\u{feff}').unwrap_or(text).to_string()
}

/// CRLF lock files get rewritten wholesale by tools expecting LF.
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
}

/// Drop the `BUNDLED WITH` trailer so the tool does not try to switch to the
/// recorded bundler version inside the sandbox.
pub fn strip_bundled_with(text: &str) -> String {
    if !text.lines().any(|l| l.trim_end() == "BUNDLED WITH") {
        return text.to_string();
    }
    let mut out = Vec::new();
    let mut lines = text.lines().peekable();
    while let Some(line) = lines.next() {
        if line.trim_end() == "BUNDLED WITH" {
            while lines.peek().is_some_and(|l| l.starts_with(' ')) {
                lines.next();
            }
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|l| l.trim().is_empty()) {
        out.pop();
    }
    let mut result = out.join("\n");
    if text.ends_with('\n') && !result.is_empty() {
        result.push('\n');
    }
    result
}
