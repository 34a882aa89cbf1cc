//! Secret detection and redaction.
//!
//! - [`Redactor`] - masks known secret values in diagnostics
//! - [`SecretEnvMatcher`] - spots secret-looking environment variable names
//!
//! # Example
//!
//! ```
//! use uplift::secrets::{Redactor, SecretEnvMatcher};
//!
//! let matcher = SecretEnvMatcher::with_builtins();
//! assert!(matcher.is_secret("NPM_TOKEN"));
//!
//! let mut redactor = Redactor::new();
//! redactor.add_secret("npm-abc");
//! assert!(!redactor.redact("auth npm-abc rejected").contains("npm-abc"));
//! ```

pub mod mask;
pub mod pattern;

pub use mask::Redactor;
pub use pattern::{SecretEnvMatcher, BUILTIN_PATTERNS};
