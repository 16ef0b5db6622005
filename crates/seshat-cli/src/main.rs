mod cli;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser as _;
use seshat::sweeper::spawn_sweep_task;
use seshat::{AuthorizationGate, Outcome, SessionManager, session_data_from_json};
use seshat_core::SessionToken;
use seshat_db::Database;
use seshat_util_error::WhateverResult;
use snafu::{ResultExt as _, whatever};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::cli::{Opts, OptsCmd};

const LOG_TARGET: &str = "seshat::cli";

#[snafu::report]
#[tokio::main]
async fn main() -> WhateverResult<()> {
    init_logging()?;

    let opts = Opts::parse();

    let sweep_interval = match &opts.cmd {
        OptsCmd::RunSweeper { interval_secs } => Some(Duration::from_secs(*interval_secs)),
        _ => None,
    };
    let config = opts.global.session_config(sweep_interval);

    let db = Database::open(opts.global.db_path.clone())
        .await
        .whatever_context("Can't open session database")?;
    let manager = Arc::new(
        SessionManager::builder()
            .store(db)
            .config(config)
            .build(),
    );

    match opts.cmd {
        OptsCmd::Create { username, data } => {
            let data = data
                .as_deref()
                .map(session_data_from_json)
                .transpose()
                .whatever_context("Invalid --data")?;
            let token = manager
                .create_session(&username, data)
                .await
                .whatever_context("Can't create session")?;
            println!("{token}");
        }
        OptsCmd::Validate { token } => {
            let validation = manager
                .validate_session(&SessionToken::from(token))
                .await
                .whatever_context("Can't validate session")?;
            print_json(&validation)?;
        }
        OptsCmd::Authorize { token } => {
            let gate = AuthorizationGate::new(manager);
            match gate.authorize(token.as_deref()).await {
                Outcome::Allow(principal) => println!("allow {}", principal.username),
                Outcome::Deny(reason) => {
                    println!("deny {}", reason.as_str());
                    whatever!("Access denied: {reason}");
                }
            }
        }
        OptsCmd::Delete { token } => {
            let deletion = manager
                .delete_session(&SessionToken::from(token))
                .await
                .whatever_context("Can't delete session")?;
            println!("{}", deletion.removed_count);
        }
        OptsCmd::Sweep => {
            let outcome = manager.sweep().await.whatever_context("Sweep failed")?;
            print_json(&outcome)?;
        }
        OptsCmd::Count => {
            let count = manager
                .count_sessions()
                .await
                .whatever_context("Can't count sessions")?;
            println!("{count}");
        }
        OptsCmd::RunSweeper { .. } => {
            let every = manager.config().sweep_interval;
            info!(
                target: LOG_TARGET,
                interval_secs = every.as_secs(),
                max_age_secs = manager.config().max_age.as_duration().as_secs(),
                "Sweeper running. Press Ctrl+C to stop."
            );

            let handle = spawn_sweep_task(manager, every);
            tokio::signal::ctrl_c()
                .await
                .whatever_context("Can't wait for Ctrl+C")?;
            handle.abort();

            info!(target: LOG_TARGET, "Sweeper stopped");
        }
    }

    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> WhateverResult<()> {
    let s = serde_json::to_string_pretty(value).whatever_context("Can't serialize output")?;
    println!("{s}");
    Ok(())
}

pub fn init_logging() -> WhateverResult<()> {
    if let Err(err) = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init()
    {
        whatever!("Logging initialization failed: {err}");
    }

    Ok(())
}
