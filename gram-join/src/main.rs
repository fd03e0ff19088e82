//! gram-join - Sequential mass-join of destinations per account
//!
//! Every active account walks the (truncated) link list in order, with a
//! fixed flood-control delay after each attempt. The sweep runs to
//! completion in the foreground; there is no cancellation hook.

use anyhow::Result;
use clap::Parser;
use libgramcast::protocol::mock::MockFactory;
use libgramcast::{Config, GramcastError, SessionManager};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "gram-join")]
#[command(version)]
#[command(about = "Join target groups/channels with every active account")]
#[command(long_about = "\
gram-join - Sequential mass-join of destinations per account

DESCRIPTION:
    Each active account attempts to join the given destinations, one at a
    time, in order. Private invites (t.me/+HASH, t.me/joinchat/HASH) are
    imported by hash; everything else is resolved as a public identifier
    and joined. A failure on one destination is logged and the sweep
    continues. After every attempt the configured flood-control delay is
    applied.

USAGE:
    gram-join t.me/some_group https://t.me/chat_3/20162324 t.me/+AbCdEf12
    gram-join --count 2 link1 link2 link3

EXIT CODES:
    0 - Sweep completed
    1 - Sweep could not start (no active accounts)
")]
struct Cli {
    /// Only attempt the first COUNT links (defaults to all)
    #[arg(long, value_name = "COUNT")]
    count: Option<usize>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Destination links or usernames
    #[arg(required = true)]
    links: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("Mass join failed: {e}");
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

    let join_count = cli.count.unwrap_or(cli.links.len());
    manager.run_join(&cli.links, join_count)?;
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
