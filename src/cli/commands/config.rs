//! Config command implementation.
//!
//! The `uplift config` command shows the merged configuration.

use std::io::Write;

use crate::cli::args::ConfigArgs;
use crate::config::ConfigPaths;
use crate::error::{Result, UpliftError};

use super::dispatcher::{Command, CommandContext, CommandResult};

/// The config command implementation.
pub struct ConfigCommand {
    context: CommandContext,
    args: ConfigArgs,
}

impl ConfigCommand {
    /// Create a new config command.
    pub fn new(context: CommandContext, args: ConfigArgs) -> Self {
        Self { context, args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &ConfigArgs {
        &self.args
    }
}

impl Command for ConfigCommand {
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult> {
        let Some(config) = self.context.load_config(out)? else {
            return Ok(CommandResult::failure(2));
        };

        if self.args.json {
            let json =
                serde_json::to_string_pretty(&config).map_err(|e| UpliftError::Other(e.into()))?;
            writeln!(out, "{}", json)?;
            return Ok(CommandResult::success());
        }

        // Show the files that went into the merge
        match &self.context.config_override {
            Some(path) => writeln!(out, "# {}", path.display())?,
            None => {
                let paths = ConfigPaths::discover(&self.context.project_root);
                for path in paths.all_existing() {
                    writeln!(out, "# {}", path.display())?;
                }
            }
        }
        let yaml = serde_yaml::to_string(&config).map_err(|e| UpliftError::Other(e.into()))?;
        write!(out, "{}", yaml)?;

        Ok(CommandResult::success())
    }
}
