//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stackplan - dependency-ordered deployment of infrastructure stacks.
#[derive(Parser, Debug)]
#[command(name = "stackplan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, env = "STACKPLAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the project configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Show the launch order for a stack or stack group.
    Plan {
        /// Stack or stack group path (`.` for the whole project).
        path: String,
    },

    /// Create or update stacks in dependency order.
    Launch {
        /// Stack or stack group path (`.` for the whole project).
        path: String,

        /// Assume yes to all questions.
        #[arg(short, long)]
        yes: bool,
    },

    /// Update existing stacks, directly or through change sets.
    Update {
        /// Stack or stack group path (`.` for the whole project).
        path: String,

        /// Create a change set before updating.
        #[arg(short = 'c', long)]
        change_set: bool,

        /// Display verbose change-set output.
        #[arg(short, long)]
        verbose: bool,

        /// Assume yes to all questions.
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the status of stacks.
    Status {
        /// Stack or stack group path (`.` for the whole project).
        path: String,
    },

    /// Work with a named change set directly.
    ChangeSet {
        /// Change-set subcommand.
        #[command(subcommand)]
        command: ChangeSetCommands,
    },
}

/// Change-set subcommands.
#[derive(Subcommand, Debug)]
pub enum ChangeSetCommands {
    /// Create a change set.
    Create {
        /// Stack or stack group path.
        path: String,
        /// Change-set name.
        name: String,
        /// Assume yes to all questions.
        #[arg(short, long)]
        yes: bool,
    },

    /// Wait for a change set to settle.
    Wait {
        /// Stack or stack group path.
        path: String,
        /// Change-set name.
        name: String,
    },

    /// Describe a change set.
    Describe {
        /// Stack or stack group path.
        path: String,
        /// Change-set name.
        name: String,
        /// Display verbose output.
        #[arg(short, long)]
        verbose: bool,
    },

    /// Execute a change set.
    Execute {
        /// Stack or stack group path.
        path: String,
        /// Change-set name.
        name: String,
        /// Assume yes to all questions.
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete a change set.
    Delete {
        /// Stack or stack group path.
        path: String,
        /// Change-set name.
        name: String,
        /// Assume yes to all questions.
        #[arg(short, long)]
        yes: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_update_flags() {
        let cli = Cli::try_parse_from(["stackplan", "update", "dev", "-c", "-v", "-y"])
            .expect("arguments parse");
        match cli.command {
            Commands::Update {
                path,
                change_set,
                verbose,
                yes,
            } => {
                assert_eq!(path, "dev");
                assert!(change_set && verbose && yes);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "stackplan",
            "status",
            ".",
            "--output",
            "json",
            "--config",
            "infra/stackplan.yaml",
        ])
        .expect("arguments parse");
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("infra/stackplan.yaml")));
    }

    #[test]
    fn test_change_set_subcommand() {
        let cli = Cli::try_parse_from(["stackplan", "change-set", "describe", "dev/vpc", "cs-1", "-v"])
            .expect("arguments parse");
        assert!(matches!(
            cli.command,
            Commands::ChangeSet {
                command: ChangeSetCommands::Describe { verbose: true, .. }
            }
        ));
    }
}
