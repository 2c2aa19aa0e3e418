//! # Tangle CLI Module
//!
//! This module implements the CLI interface for the tangle binary.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `status` - Show graph status
//! - `init` - Initialize new database
//! - `add` - Admit a record with no parents
//! - `approve` - Admit a record approving existing records
//! - `show` - Show one record
//! - `list` - List all records
//! - `highest` - Record with the highest (cumulative) weight
//! - `tip` - Select a tip with the MCMC walk
//! - `validate` - Check cumulative weights for drift
//! - `checkpoint` - Create a checkpoint
//! - `latest-checkpoint` - Show the most recent checkpoint

mod commands;

use crate::config::{AppConfig, BackendKind};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tangle_core::TangleError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Tangle - approval DAG engine
///
/// Records approve earlier records; tips are picked by a weighted random walk.
#[derive(Parser, Debug)]
#[command(name = "tangle")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the configuration file [default: tangle.toml if present]
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the database (overrides `[storage] path`)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend (overrides `[storage] backend`)
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<BackendKind>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides `[server] host`)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides `[server] port`)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show graph status
    Status,

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Admit a record with no parents
    Add {
        /// Record id
        id: String,
    },

    /// Admit a record approving existing records
    Approve {
        /// Record id
        id: String,

        /// Parent ids (at least one)
        #[arg(required = true, num_args = 1..)]
        parents: Vec<String>,
    },

    /// Show one record
    Show {
        /// Record id
        id: String,
    },

    /// List all records
    List {
        /// Only list current tips
        #[arg(short, long)]
        tips: bool,
    },

    /// Show the record with the highest weight
    Highest {
        /// Rank by cumulative weight instead of direct approvals
        #[arg(long)]
        cumulative: bool,
    },

    /// Select a tip with the MCMC walk
    Tip {
        /// Bias towards heavier records (overrides `[walk] alpha`)
        #[arg(short, long)]
        alpha: Option<f64>,

        /// Proposal steps (overrides `[walk] max_steps`)
        #[arg(short, long)]
        max_steps: Option<usize>,
    },

    /// Check cumulative weights for drift
    Validate,

    /// Create a checkpoint of the current record set
    Checkpoint {
        /// Checkpoint id
        id: String,
    },

    /// Show the most recent checkpoint
    LatestCheckpoint,
}

impl Cli {
    /// Fold the global storage flags into `config`.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(path) = &self.database {
            config.storage.path = path.clone();
        }
        if let Some(backend) = self.backend {
            config.storage.backend = backend;
        }
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli, config: AppConfig) -> Result<(), TangleError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_server(&config).await
        }
        Some(Commands::Status) => cmd_status(&config, json_mode),
        Some(Commands::Init { force }) => cmd_init(&config, force),
        Some(Commands::Add { id }) => cmd_add(&config, json_mode, id),
        Some(Commands::Approve { id, parents }) => cmd_approve(&config, json_mode, id, parents),
        Some(Commands::Show { id }) => cmd_show(&config, json_mode, id),
        Some(Commands::List { tips }) => cmd_list(&config, json_mode, tips),
        Some(Commands::Highest { cumulative }) => cmd_highest(&config, json_mode, cumulative),
        Some(Commands::Tip { alpha, max_steps }) => {
            cmd_tip(&config, json_mode, alpha, max_steps)
        }
        Some(Commands::Validate) => cmd_validate(&config, json_mode),
        Some(Commands::Checkpoint { id }) => cmd_checkpoint(&config, json_mode, &id),
        Some(Commands::LatestCheckpoint) => cmd_latest_checkpoint(&config, json_mode),
        None => {
            // No subcommand - show status by default
            cmd_status(&config, json_mode)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_approve_with_parents() {
        let cli = Cli::try_parse_from(["tangle", "approve", "c", "a", "b"]).expect("parse");
        assert!(matches!(
            cli.command,
            Some(Commands::Approve { ref id, ref parents })
                if id == "c" && parents == &["a".to_string(), "b".to_string()]
        ));
    }

    #[test]
    fn approve_requires_a_parent() {
        assert!(Cli::try_parse_from(["tangle", "approve", "c"]).is_err());
    }

    #[test]
    fn global_flags_override_config() {
        let cli = Cli::try_parse_from([
            "tangle",
            "status",
            "--backend",
            "memory",
            "--database",
            "other.redb",
        ])
        .expect("parse");

        let mut config = AppConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.storage.backend, BackendKind::Memory);
        assert_eq!(config.storage.path, PathBuf::from("other.redb"));
    }

    #[test]
    fn unknown_backend_flag_rejected() {
        assert!(Cli::try_parse_from(["tangle", "status", "--backend", "leveldb"]).is_err());
    }

    #[test]
    fn latest_checkpoint_is_kebab_case() {
        let cli = Cli::try_parse_from(["tangle", "latest-checkpoint"]).expect("parse");
        assert!(matches!(cli.command, Some(Commands::LatestCheckpoint)));
    }
}
