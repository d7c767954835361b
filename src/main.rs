use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use hostwarden::args::CommonArgs;
use hostwarden::bot::run_messenger_loop;
use hostwarden::catalog::Catalog;
use hostwarden::runner::{self, CommandRequest, Outcome};
use hostwarden::{logging, Config, Inspector, Messenger, Router, Section, TelegramMessenger};

// ── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "hostwarden",
    version,
    about = "Chat-bot control panel for a single server"
)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the bot (default when no subcommand is given)
    Run,
    /// Run a command line the way the bot would and print the result
    Exec {
        /// Timeout in seconds (default: command_timeout_secs from config)
        #[arg(long, short = 't', value_name = "SECS")]
        timeout: Option<u64>,
        /// The command line; quote it to keep pipes away from your shell
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Print one inspector report
    Inspect {
        /// host, memory, disk, disk-detailed, network, services or processes
        section: Section,
    },
    /// List the predefined commands
    Catalog,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.common.log_config());
    let config = cli.common.load_config()?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_bot(config).await.map(|()| ExitCode::SUCCESS),
        Commands::Exec { timeout, command } => {
            let timeout = timeout
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.command_timeout());
            let result = runner::execute(&CommandRequest::new(command.join(" "), timeout)).await;
            println!("{}", result.render());
            Ok(exit_code(result.outcome, result.exit_code))
        }
        Commands::Inspect { section } => {
            let inspector = Inspector::from_config(&config);
            println!("{}", inspector.report(section).await);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Catalog => {
            let catalog = Catalog::new(config.commands.clone());
            for cmd in catalog.iter() {
                let guard = if cmd.confirm { " (confirm)" } else { "" };
                println!("{:<16} {}{}\n{:<16} $ {}", cmd.id, cmd.description, guard, "", cmd.command);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Mirror the command's own status; 124 for a timeout as `timeout(1)` does.
fn exit_code(outcome: Outcome, code: Option<i32>) -> ExitCode {
    match outcome {
        Outcome::Success => ExitCode::SUCCESS,
        Outcome::Error => code
            .and_then(|c| u8::try_from(c).ok())
            .filter(|c| *c != 0)
            .map(ExitCode::from)
            .unwrap_or(ExitCode::FAILURE),
        Outcome::Timeout => ExitCode::from(124),
        Outcome::Exception => ExitCode::from(127),
    }
}

async fn run_bot(config: Config) -> Result<()> {
    let token = config.bot_token.clone().with_context(|| {
        format!(
            "No bot token configured; set bot_token in {} or the BOT_TOKEN variable",
            Config::default_path().display()
        )
    })?;

    if config.admin_ids.is_empty() {
        warn!("No admin ids configured; every operator will be denied");
    }
    info!(
        admins = config.admin_ids.len(),
        command_timeout = ?config.command_timeout(),
        monitoring_interval = ?config.monitoring_interval(),
        endpoints = config.services.len(),
        "Configuration loaded"
    );

    let mut telegram = TelegramMessenger::new("hostwarden".to_string(), token)
        .context("Failed to build Telegram client")?;
    telegram
        .initialize()
        .await
        .context("Telegram authentication failed")?;

    let messenger: Arc<dyn Messenger> = Arc::new(telegram);
    let router = Arc::new(Router::from_config(&config));

    // Set up graceful shutdown on Ctrl+C.
    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_for_signal.cancel();
    });

    #[cfg(unix)]
    {
        let cancel_for_term = cancel.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            if let Ok(mut sig) = signal(SignalKind::terminate()) {
                sig.recv().await;
                cancel_for_term.cancel();
            }
        });
    }

    run_messenger_loop(messenger, router, cancel).await;
    info!("Bot stopped");
    Ok(())
}
