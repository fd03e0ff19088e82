//! gram-accounts - Account pool inspection and removal

use anyhow::Result;
use clap::{Parser, Subcommand};
use libgramcast::protocol::mock::MockFactory;
use libgramcast::{Config, GramcastError, SessionManager};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "gram-accounts")]
#[command(version)]
#[command(about = "List and manage the active account pool")]
#[command(long_about = "\
gram-accounts - Account pool inspection and removal

DESCRIPTION:
    Reconciles the persisted session credentials with live connections,
    then lists the active accounts, lists the groups/channels visible to
    one account, or removes an account (best-effort: the live client is
    disconnected and the credential file deleted if present).

USAGE:
    gram-accounts list
    gram-accounts list --json
    gram-accounts dialogs 15551234567
    gram-accounts remove 15551234567

EXIT CODES:
    0 - Success
    1 - Runtime error
")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Emit JSON instead of plain text
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List active account identifiers
    List,
    /// List groups and channels visible to one account
    Dialogs { identifier: String },
    /// Remove an account from the pool
    Remove { identifier: String },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        let code = e
            .downcast_ref::<GramcastError>()
            .map(GramcastError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config();
    // Loopback transport; embedders supply a real ClientFactory.
    let factory = Arc::new(MockFactory::default());
    let manager = SessionManager::new(&config, factory)?;

    match &cli.command {
        Command::List => {
            let accounts = manager.list_accounts();
            if cli.json {
                println!("{}", serde_json::to_string(&accounts)?);
            } else {
                for account in accounts {
                    println!("{account}");
                }
            }
        }
        Command::Dialogs { identifier } => {
            let dialogs = manager.list_dialogs(identifier)?;
            if cli.json {
                for dialog in &dialogs {
                    println!("{}", serde_json::to_string(dialog)?);
                }
            } else {
                for dialog in &dialogs {
                    let kind = if dialog.is_group { "group" } else { "channel" };
                    println!("{}\t{}\t{}", dialog.id, kind, dialog.title);
                }
            }
        }
        Command::Remove { identifier } => {
            manager.remove_account(identifier)?;
            println!("Account {identifier} removed.");
        }
    }
    Ok(())
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|_| {
        info!("no config file, using defaults");
        Config::default_config()
    })
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
