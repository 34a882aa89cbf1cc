//! Configuration loading, parsing, and validation for uplift.
//!
//! - Schema definitions in [`schema`]
//! - File discovery and loading in [`loader`]
//! - Deep merging in [`merger`]
//! - Validation in [`validator`]
//!
//! # Example
//!
//! ```
//! use uplift::config::{load_merged_config, validate};
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! let dir = temp.path().join(".uplift");
//! fs::create_dir_all(&dir).unwrap();
//! fs::write(dir.join("config.yml"), "ecosystems:\n  local:\n    command: ./resolve\n").unwrap();
//!
//! let config = load_merged_config(temp.path()).unwrap();
//! validate(&config).unwrap();
//! assert_eq!(config.ecosystems["local"].command, "./resolve");
//! ```
//!
//! # Configuration File Locations
//!
//! uplift discovers and merges configuration in this order:
//! 1. User global config (`~/.uplift/config.yml`)
//! 2. Project config (`.uplift/config.yml`)
//! 3. Local overrides (`.uplift/config.local.yml`)

pub mod loader;
pub mod merger;
pub mod schema;
pub mod validator;

pub use schema::{
    BackoffConfig, CredentialConfig, EcosystemConfig, IgnoreConfig, RuleConfig, Settings,
    UpliftConfig,
};

pub use loader::{
    find_project_root, load_config, load_config_file, load_config_value, load_merged_config,
    parse_config, ConfigPaths,
};

pub use merger::{deep_merge, merge_configs};

pub use validator::{validate, validate_config, ValidationError};
