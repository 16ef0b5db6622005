use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use seshat::config::{DEFAULT_SWEEP_BATCH_SIZE, DEFAULT_SWEEP_INTERVAL_SECS};
use seshat::{MaxAge, SessionConfig};

/// Issue, validate and revoke session tokens
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Opts {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub cmd: OptsCmd,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path of the session database file
    #[arg(long, env = "SESHAT_DB_PATH")]
    pub db_path: PathBuf,

    /// How long a session stays valid after creation
    #[arg(long, env = "SESHAT_MAX_AGE_SECS", default_value = "315360000")]
    pub max_age_secs: u64,

    /// Maximum number of records deleted at once while sweeping
    #[arg(long, env = "SESHAT_SWEEP_BATCH_SIZE", default_value_t = DEFAULT_SWEEP_BATCH_SIZE)]
    pub sweep_batch_size: usize,
}

impl GlobalOpts {
    pub fn session_config(&self, sweep_interval: Option<Duration>) -> SessionConfig {
        SessionConfig::builder()
            .max_age(MaxAge::from_secs(self.max_age_secs))
            .sweep_batch_size(self.sweep_batch_size)
            .maybe_sweep_interval(sweep_interval)
            .build()
    }
}

#[derive(Debug, Subcommand)]
pub enum OptsCmd {
    /// Create a session and print its token
    Create {
        username: String,
        /// Payload to attach, a JSON object
        #[arg(long)]
        data: Option<String>,
    },
    /// Print the validation result as JSON
    Validate { token: String },
    /// Run a token through the authorization gate
    Authorize { token: Option<String> },
    /// Delete all records with the token
    Delete { token: String },
    /// Remove expired sessions once
    Sweep,
    /// Print the number of stored records
    Count,
    /// Sweep periodically until interrupted
    RunSweeper {
        #[arg(long, env = "SESHAT_SWEEP_INTERVAL_SECS", default_value_t = DEFAULT_SWEEP_INTERVAL_SECS)]
        interval_secs: u64,
    },
}
