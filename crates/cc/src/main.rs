mod cli;

use cc_core::types::{Reply, Session};
use cc_core::{ConfigError, Settings, StoreError};
use cc_mcp::McpServer;
use cc_store::JsonFileStore;
use cc_vcs::GitDiffSource;
use cc_workflow::{ReviewOptions, ReviewOutcome, Workflow, WorkflowError};
use clap::Parser;
use cli::{Cli, Command, ReviewArgs};
use owo_colors::{OwoColorize, Stream};
use std::io::Read;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_ENV: &str = "CODECHAT_LOG";
const CANCELLED_EXIT: u8 = 130;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("--replies must be valid JSON.")]
    InvalidReplies,
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

type CodechatWorkflow = Workflow<JsonFileStore, GitDiffSource>;

fn setup_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!(
                "{} {err}",
                "Error:".if_supports_color(Stream::Stderr, |text| text.red())
            );
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let settings = Settings::load()?;
    let store = JsonFileStore::from_settings(&settings)?;
    let workflow = Workflow::new(Arc::new(store), Arc::new(GitDiffSource::new()), settings);

    match cli.command {
        None => review(&workflow, cli.review).await,
        Some(Command::Review(args)) => review(&workflow, args).await,
        Some(Command::GetSession { session_id }) => {
            let session = workflow.get_session(&session_id)?;
            print_json(&session)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Sessions) => {
            let sessions = workflow.list_sessions(&std::env::current_dir()?)?;
            if sessions.is_empty() {
                eprintln!("No sessions for this repository.");
            }
            for session in &sessions {
                println!("{}", session_line(session));
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Mcp) => {
            McpServer::new(workflow).run_stdio().await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn review(workflow: &CodechatWorkflow, args: ReviewArgs) -> Result<ExitCode, CliError> {
    let replies = match args.replies.as_deref() {
        Some(raw) => parse_replies(raw)?,
        None => Vec::new(),
    };
    let options = ReviewOptions {
        repo_path: std::env::current_dir()?,
        session_id: args.session_id,
        description: args.message,
        replies,
        skip_review: args.skip_review,
        port: args.port,
        timeout: args
            .timeout
            .map(|minutes| Duration::from_secs(minutes.saturating_mul(60))),
        open_browser: (args.no_open || args.skip_review).then_some(false),
    };

    let outcome = tokio::select! {
        outcome = workflow.execute_review(options) => outcome?,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nReview cancelled.");
            return Ok(ExitCode::from(CANCELLED_EXIT));
        }
    };

    match outcome {
        ReviewOutcome::EmptyDiff => eprintln!("No uncommitted changes found."),
        ReviewOutcome::Skipped { result } | ReviewOutcome::Reviewed { result, .. } => {
            print_json(&result)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn parse_replies(raw: &str) -> Result<Vec<Reply>, CliError> {
    let text = if raw == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        raw.to_string()
    };
    serde_json::from_str(&text).map_err(|_| CliError::InvalidReplies)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|err| StoreError::Encode {
        message: err.to_string(),
    })?;
    println!("{text}");
    Ok(())
}

fn session_line(session: &Session) -> String {
    format!(
        "{}  {:<17}  {}  {} open",
        session.id,
        session.status,
        session.updated_at.format("%Y-%m-%d %H:%M"),
        session.unresolved_count()
    )
}
