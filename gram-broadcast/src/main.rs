//! gram-broadcast - Round-robin broadcast over the account pool
//!
//! Starts a broadcast job and waits for it in the foreground. Ctrl-C
//! requests a cooperative stop: the in-flight send completes and the job
//! winds down at its next checkpoint.

use anyhow::Result;
use clap::Parser;
use libgramcast::broadcast::BroadcastParams;
use libgramcast::protocol::mock::MockFactory;
use libgramcast::{Config, GramcastError, SessionManager};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "gram-broadcast")]
#[command(version)]
#[command(about = "Broadcast a message to destinations, round-robining accounts")]
#[command(long_about = "\
gram-broadcast - Round-robin broadcast over the account pool

DESCRIPTION:
    Snapshots the active accounts and sends the message to every
    destination in order, rotating through the accounts one destination
    at a time. A failed destination is logged and skipped; it never stops
    the job. With --repeat the pass restarts after the repeat interval
    until stopped.

    Destinations are numeric group/channel ids as reported by
    'gram-accounts dialogs'.

USAGE:
    gram-broadcast -m 'hello' -- -100200 -100300 -100400
    gram-broadcast -m 'hello' --delay 5 --repeat --repeat-interval 600 -- -100200

SIGNALS:
    SIGINT, SIGTERM - Cooperative stop (bounded by one delay interval)

EXIT CODES:
    0 - Job completed or was stopped
    1 - Job could not start (no active accounts, job already running)
")]
struct Cli {
    /// Message text to broadcast
    #[arg(short, long)]
    message: String,

    /// Seconds to wait between two sends (default from config)
    #[arg(long, value_name = "SECONDS")]
    delay: Option<u64>,

    /// Cycle over the destination list until stopped
    #[arg(long)]
    repeat: bool,

    /// Seconds between two cycles (default from config)
    #[arg(long, value_name = "SECONDS")]
    repeat_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Destination ids, in send order
    #[arg(required = true)]
    destinations: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("Broadcast failed: {e}");
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
    let manager = Arc::new(SessionManager::new(&config, factory)?);

    let params = BroadcastParams {
        destinations: cli.destinations.clone(),
        message: cli.message.clone(),
        delay: Duration::from_secs(cli.delay.unwrap_or(config.broadcast.delay_secs)),
        auto_repeat: cli.repeat,
        repeat_interval: Duration::from_secs(
            cli.repeat_interval
                .unwrap_or(config.broadcast.repeat_interval_secs),
        ),
    };

    setup_signal_handlers(manager.clone())?;

    info!(
        destinations = params.destinations.len(),
        accounts = manager.list_accounts().len(),
        "starting broadcast"
    );
    let handle = manager.start_broadcast(params)?;
    if handle.join().is_err() {
        eprintln!("Broadcast thread panicked");
        std::process::exit(1);
    }
    Ok(())
}

/// Forward SIGINT/SIGTERM into a cooperative stop request
#[cfg(unix)]
fn setup_signal_handlers(manager: Arc<SessionManager>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("received stop signal, finishing in-flight send");
                    manager.stop_broadcast();
                    break;
                }
                _ => {}
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_manager: Arc<SessionManager>) -> Result<()> {
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
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
