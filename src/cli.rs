//! Command-line argument parsing for supaguard.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use supaguard::config::Config;
use supaguard::db::ChannelBackend;
use supaguard::query::ExecutionEnvelope;
use supaguard::safety::{QueryValidator, Verdict};

/// Read-only SQL endpoint for a Supabase admin dashboard.
#[derive(Parser, Debug)]
#[command(name = "supaguard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH", global = true, env = "SUPAGUARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write logs to the state directory instead of stderr
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the guarded SQL endpoint
    Serve {
        /// Address to listen on (overrides [server].bind)
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,

        /// Execution channel: rpc, postgres, or mock
        #[arg(long, value_name = "CHANNEL", default_value = "rpc")]
        channel: ChannelBackend,
    },

    /// Validate a query offline and print the normalized form
    Check {
        /// SQL text to validate
        #[arg(value_name = "QUERY")]
        query: String,

        /// Also print the execution envelope
        #[arg(long)]
        envelope: bool,
    },
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }
}

/// Output of the `check` subcommand.
#[derive(Debug, PartialEq, Eq)]
pub struct CheckReport {
    pub output: String,
    pub accepted: bool,
}

/// Runs the validator on `query` and renders the report.
pub fn check_query(validator: &QueryValidator, query: &str, show_envelope: bool) -> CheckReport {
    match validator.validate(query) {
        Verdict::Accepted(normalized) => {
            let mut output = format!("Accepted: {normalized}");
            if show_envelope {
                output.push_str("\n\n");
                output.push_str(ExecutionEnvelope::wrap(&normalized).as_str());
            }
            CheckReport {
                output,
                accepted: true,
            }
        }
        Verdict::Rejected(rejection) => CheckReport {
            output: format!("Rejected: {rejection}"),
            accepted: false,
        },
    }
}
