//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use crate::model::{UpdatePolicy, UpdateStrategy};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Uplift - find the newest version a dependency can move to.
#[derive(Debug, Parser)]
#[command(name = "uplift")]
#[command(author, version, long_about = None)]
#[command(about = "Find the newest version a dependency can move to")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config file (overrides default .uplift/config.yml)
    #[arg(short, long, global = true, env = "UPLIFT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to project root (overrides current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check one dependency for an update
    Check(CheckArgs),

    /// Show resolved configuration
    Config(ConfigArgs),
}

/// Arguments for the `check` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CheckArgs {
    /// Dependency to check
    pub dependency: String,

    /// How much of the graph may move: no_unlock, unlock_own, unlock_all
    #[arg(long, default_value = "unlock_own")]
    pub policy: UpdatePolicy,

    /// How requirements are rewritten: bump_versions, bump_versions_if_necessary, widen_ranges
    #[arg(long, default_value = "bump_versions")]
    pub strategy: UpdateStrategy,

    /// Force this version and report everything else that must move
    #[arg(long, value_name = "VERSION")]
    pub target: Option<String>,

    /// Ecosystem entry from the config (defaults to the only one)
    #[arg(short, long)]
    pub ecosystem: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl CheckArgs {
    pub fn new(dependency: impl Into<String>) -> Self {
        Self {
            dependency: dependency.into(),
            policy: UpdatePolicy::default(),
            strategy: UpdateStrategy::default(),
            target: None,
            ecosystem: None,
            json: false,
        }
    }
}

/// Arguments for the `config` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
