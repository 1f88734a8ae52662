//! bull-repl binary

use anyhow::{Context, Result};
use bull_repl::cli::{render, repl, Console, ReplCommand};
use bull_repl::config::BullReplConfig;
use bull_repl::confirm::TerminalPrompter;
use bull_repl::observability;
use bull_repl::queue::RedisConnector;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bull-repl")]
#[command(version)]
#[command(about = "Interactive console for Bull job queues", long_about = None)]
struct Cli {
    /// Queue to connect to at start-up
    queue: Option<String>,

    /// Configuration file [default: ./bull-repl.toml]
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Redis URL used by `connect`
    #[arg(short, long)]
    redis: Option<String>,

    /// Key prefix used by `connect`
    #[arg(short, long)]
    prefix: Option<String>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        BullReplConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(redis) = cli.redis {
        config.connection.redis_url = redis;
    }
    if let Some(prefix) = cli.prefix {
        config.connection.prefix = prefix;
    }
    if cli.queue.is_some() {
        config.connection.queue = cli.queue;
    }

    let level = match cli.verbose {
        0 => config.logging.level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    observability::init(&level, config.logging.format)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    runtime.block_on(run(config))
}

async fn run(config: BullReplConfig) -> Result<()> {
    let mut console = Console::new(
        Box::new(RedisConnector),
        Box::new(TerminalPrompter),
        config.connection.clone(),
        config.console.pause_scope,
    );

    if let Some(queue) = config.connection.queue.clone() {
        let connect = ReplCommand::Connect {
            queue,
            prefix: None,
            redis: None,
        };
        match console.execute(connect).await {
            Ok(outcome) => render::outcome(&outcome),
            Err(err) => render::error(&err),
        }
    }

    repl::run(&mut console, &config.console).await
}
