//! Configuration validation rules.
//!
//! This module validates configuration for correctness:
//! - Ecosystems must have a command
//! - Built-in rule sets and patches must exist
//! - Every pattern must compile
//! - Ignore entries must be valid constraints

use crate::classify::ClassifierRuleSet;
use crate::config::schema::{EcosystemConfig, UpliftConfig};
use crate::error::{Result, UpliftError};
use crate::probe::BUILTIN_PATCH_NAMES;
use crate::version::Constraint;
use regex::Regex;

/// Validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
    /// Ecosystem name if error is ecosystem-specific
    pub ecosystem: Option<String>,
}

impl ValidationError {
    fn new(rule: &str, message: String, ecosystem: Option<&str>) -> Self {
        Self {
            rule: rule.to_string(),
            message,
            ecosystem: ecosystem.map(str::to_string),
        }
    }
}

/// Validate a configuration and return all errors.
///
/// This function collects all validation errors rather than stopping
/// at the first one, allowing users to fix multiple issues at once.
pub fn validate_config(config: &UpliftConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_settings(config));
    for (name, ecosystem) in &config.ecosystems {
        errors.extend(validate_ecosystem(name, ecosystem));
    }
    errors.extend(validate_ignores(config));

    errors
}

fn validate_settings(config: &UpliftConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let settings = &config.settings;

    if settings.timeout_secs == 0 {
        errors.push(ValidationError::new(
            "invalid-timeout",
            "settings.timeout_secs must be greater than zero".to_string(),
            None,
        ));
    }

    if settings.backoff.min_ms > settings.backoff.max_ms {
        errors.push(ValidationError::new(
            "invalid-backoff",
            format!(
                "settings.backoff.min_ms ({}) exceeds max_ms ({})",
                settings.backoff.min_ms, settings.backoff.max_ms
            ),
            None,
        ));
    }

    if let Some(name) = &settings.default_ecosystem {
        if !config.ecosystems.contains_key(name) {
            errors.push(ValidationError::new(
                "unknown-ecosystem",
                format!("Default ecosystem '{}' is not defined", name),
                None,
            ));
        }
    }

    errors
}

fn validate_ecosystem(name: &str, ecosystem: &EcosystemConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let scope = Some(name);

    if ecosystem.command.trim().is_empty() {
        errors.push(ValidationError::new(
            "missing-command",
            format!("Ecosystem '{}' must have a 'command'", name),
            scope,
        ));
    }

    if ecosystem.manifest.trim().is_empty() {
        errors.push(ValidationError::new(
            "missing-manifest",
            format!("Ecosystem '{}' must name a manifest file", name),
            scope,
        ));
    }

    if let Some(builtin) = &ecosystem.builtin_rules {
        if ClassifierRuleSet::builtin(builtin).is_none() {
            errors.push(ValidationError::new(
                "unknown-builtin-rules",
                format!(
                    "Ecosystem '{}' uses unknown built-in rules '{}' (known: {})",
                    name,
                    builtin,
                    ClassifierRuleSet::builtin_names().join(", ")
                ),
                scope,
            ));
        }
    }

    let patterns = ecosystem
        .rules
        .iter()
        .map(|rule| (format!("rule '{}'", rule.name), &rule.pattern))
        .chain(
            ecosystem
                .embedded_result
                .iter()
                .map(|p| ("embedded_result".to_string(), p)),
        )
        .chain(
            ecosystem
                .conflict_pattern
                .iter()
                .map(|p| ("conflict_pattern".to_string(), p)),
        );
    for (label, pattern) in patterns {
        if let Err(e) = Regex::new(pattern) {
            errors.push(ValidationError::new(
                "invalid-pattern",
                format!("Ecosystem '{}' {} does not compile: {}", name, label, e),
                scope,
            ));
        }
    }

    for patch in &ecosystem.disabled_patches {
        if !BUILTIN_PATCH_NAMES.contains(&patch.as_str()) {
            errors.push(ValidationError::new(
                "unknown-patch",
                format!("Ecosystem '{}' disables unknown patch '{}'", name, patch),
                scope,
            ));
        }
    }

    errors
}

fn validate_ignores(config: &UpliftConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for ignore in &config.ignore {
        for versions in &ignore.versions {
            if let Err(e) = Constraint::parse(versions) {
                errors.push(ValidationError::new(
                    "invalid-constraint",
                    format!("Ignore entry for '{}': {}", ignore.dependency, e),
                    None,
                ));
            }
        }
    }

    errors
}

/// Validate and return Result (for convenience).
///
/// # Errors
///
/// Returns `ConfigValidationError` if any validation rules fail.
pub fn validate(config: &UpliftConfig) -> Result<()> {
    let errors = validate_config(config);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(UpliftError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}
