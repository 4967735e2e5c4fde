use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use autohedge::{load_config, render_output, ReplCommand, TaskRunner, REPL_HELP};
use clap::{Parser, Subcommand};
use hedge_models::{AutohedgeConfig, OutputMode, TickerConcurrency};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "config/autohedge.toml";

#[derive(Parser, Debug)]
#[command(name = "autohedge", about = "Multi-agent trading pipeline")]
struct Cli {
    /// Path to configuration file [default: config/autohedge.toml, built-in defaults if absent]
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one task and print the ledger
    Run {
        /// The trading task, e.g. "Analyze NVDA for 50k allocation"
        #[arg(short, long)]
        task: String,

        /// Ticker to analyze; repeatable. Without any, the director picks them.
        #[arg(long = "ticker")]
        tickers: Vec<String>,

        /// Ledger rendering: list, dict or str
        #[arg(short, long)]
        output: Option<OutputMode>,

        /// Process tickers concurrently
        #[arg(long)]
        concurrent: bool,

        /// Pretty-print the output JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Read tasks interactively
    Repl {
        #[arg(short, long)]
        output: Option<OutputMode>,

        #[arg(long)]
        pretty: bool,
    },

    /// Show recently archived runs
    History {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

fn read_config(path: Option<&str>) -> Result<AutohedgeConfig> {
    match path {
        Some(path) => load_config(Path::new(path)),
        None if Path::new(DEFAULT_CONFIG).exists() => load_config(Path::new(DEFAULT_CONFIG)),
        None => {
            warn!(path = DEFAULT_CONFIG, "Config file not found; using defaults");
            Ok(AutohedgeConfig::default())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // API keys may live in .env
    dotenv::dotenv().ok();

    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = read_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            task,
            tickers,
            output,
            concurrent,
            pretty,
        } => {
            if !tickers.is_empty() {
                config.run.tickers = tickers.iter().map(|t| t.trim().to_uppercase()).collect();
            }
            if let Some(mode) = output {
                config.run.output_mode = mode;
            }
            if concurrent {
                config.run.concurrency = TickerConcurrency::PerTicker;
            }
            run_once(&config, &task, pretty).await
        }
        Command::Repl { output, pretty } => {
            if let Some(mode) = output {
                config.run.output_mode = mode;
            }
            repl(&config, pretty).await
        }
        Command::History { limit } => history(&config, limit),
    }
}

async fn run_once(config: &AutohedgeConfig, task: &str, pretty: bool) -> Result<()> {
    let mut runner = TaskRunner::from_config(config).context("Failed to build pipeline")?;

    // Ctrl-C stops the run at the next stage boundary.
    let cancel = runner.pipeline().cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling after the current stage");
            cancel.cancel();
        }
    });

    match runner.run(task).await {
        Ok(outcome) => {
            println!("{}", render_output(&outcome.output, pretty)?);
            if let Some(path) = runner.last_report() {
                eprintln!("Report written to {}", path.display());
            }
            Ok(())
        }
        Err(err) => {
            let partial = err.ledger.render(config.run.output_mode);
            println!("{}", render_output(&partial, pretty)?);
            Err(anyhow::Error::new(err).context("Trading cycle failed"))
        }
    }
}

async fn repl(config: &AutohedgeConfig, pretty: bool) -> Result<()> {
    let mut runner = TaskRunner::from_config(config).context("Failed to build pipeline")?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{} - {}", config.run.name, config.run.description);
    println!("Type 'help' for examples, 'quit' to leave.");

    loop {
        print!("> ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read from stdin")? else {
            break;
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Quit => break,
            ReplCommand::Empty => continue,
            ReplCommand::Help => println!("{REPL_HELP}"),
            ReplCommand::History => {
                for task in runner.recent_tasks(10)? {
                    println!("  {task}");
                }
            }
            ReplCommand::Task(task) => match runner.run(&task).await {
                Ok(outcome) => println!("{}", render_output(&outcome.output, pretty)?),
                // A failed task does not end the session.
                Err(err) => eprintln!(
                    "Error: {err} ({} ledger entries recorded)",
                    err.ledger.len()
                ),
            },
        }
    }

    Ok(())
}

fn history(config: &AutohedgeConfig, limit: usize) -> Result<()> {
    if !config.archive.enabled {
        eprintln!("Run archive is disabled");
        return Ok(());
    }
    let archive = hedge_ledger::RunArchive::open(&config.archive.sqlite_path)
        .with_context(|| format!("Failed to open run archive: {}", config.archive.sqlite_path))?;

    for run in archive.recent_runs(limit)? {
        println!(
            "{}  {:<9}  {}  [{}]  {}",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.status,
            run.id.simple(),
            run.tickers.join(","),
            run.task
        );
    }
    Ok(())
}
