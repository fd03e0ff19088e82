//! gram-login - Interactive account sign-in
//!
//! Starts a login for one account identifier, prompts for the login code
//! and, when the account is protected, for the second-factor password.

use anyhow::Result;
use clap::Parser;
use libgramcast::error::AuthError;
use libgramcast::protocol::mock::MockFactory;
use libgramcast::{Config, GramcastError, SessionManager};
use std::io::{self, Write};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "gram-login")]
#[command(version)]
#[command(about = "Sign an account into the Gramcast session pool")]
#[command(long_about = "\
gram-login - Interactive account sign-in

DESCRIPTION:
    Starts a login for the given account identifier, waits for the login
    code and, for accounts with a second factor, for the password. On
    success the session credential is persisted under the session
    directory and the account joins the active pool.

    The identifier is normalized: surrounding whitespace and a leading
    '+' are stripped.

USAGE:
    gram-login 15551234567
    gram-login +15551234567 --verbose

CONFIGURATION:
    Configuration file: ~/.config/gramcast/config.toml (GRAMCAST_CONFIG
    overrides). Without one, built-in defaults are used.

TRANSPORT:
    This tool runs over the in-tree loopback transport. Embedders wire a
    real protocol client through libgramcast's ClientFactory seam.

EXIT CODES:
    0 - Account signed in
    1 - Runtime error
    2 - Authentication failed
    3 - Invalid input
")]
struct Cli {
    /// Account identifier (phone-like, leading '+' allowed)
    identifier: String,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("Login failed: {e}");
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

    let identifier = manager.start_login(&cli.identifier)?;
    println!("Login code requested for {identifier}.");

    loop {
        let code = prompt("Enter login code: ")?;
        match manager.submit_code(code.trim()) {
            Ok(user) => {
                println!("Signed in as {} ({identifier}).", user.first_name);
                return Ok(());
            }
            Err(GramcastError::Auth(AuthError::SecondFactorRequired)) => break,
            Err(GramcastError::Auth(AuthError::InvalidCode))
            | Err(GramcastError::Auth(AuthError::ExpiredCode)) => {
                eprintln!("Invalid or expired code, try again.");
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(account = %identifier, "second factor required");
    loop {
        let password = rpassword::prompt_password("Second-factor password: ")?;
        match manager.submit_password(&password) {
            Ok(user) => {
                println!("Signed in as {} ({identifier}).", user.first_name);
                return Ok(());
            }
            Err(GramcastError::Auth(AuthError::InvalidSecondFactor)) => {
                eprintln!("Wrong password, try again.");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input)
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
