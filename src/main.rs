use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use gtk_bookmarks_automount::config::{format_config, Config};
use gtk_bookmarks_automount::daemon;
use gtk_bookmarks_automount::logging::{init_logging, LogConfig, Verbosity};

#[derive(Parser)]
#[command(name = "gtk-bookmarks-automount")]
#[command(version)]
#[command(about = "Mount bookmarked network shares once the network is connected")]
#[command(
    long_about = "Waits for NetworkManager to report full connectivity, then mounts every bookmarked share whose credentials are stored in the keyring. Normally started from session autostart with no arguments."
)]
struct Cli {
    /// Read configuration from this file instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Also log to stderr
    #[arg(long)]
    stderr: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn log_config(&self, log_file: Option<String>) -> LogConfig {
        let verbosity = if self.quiet {
            Verbosity::Quiet
        } else {
            Verbosity::from_occurrences(self.verbose)
        };
        LogConfig {
            verbosity,
            stderr: self.stderr,
            log_file,
        }
    }

    fn load_config(&self) -> Result<Config> {
        match self.config {
            Some(ref path) => Config::load_from(path)
                .with_context(|| format!("Failed to load config file: {}", path.display())),
            None => Config::load().context("Failed to load configuration"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            // No log file is known yet; report to the journal before exiting
            let _log_guard = init_logging(&cli.log_config(None));
            tracing::error!("{:#}", e);
            return Err(e);
        }
    };

    if cli.print_config {
        println!("{}", format_config(&config));
        return Ok(());
    }

    let _log_guard = init_logging(&cli.log_config(config.log_file.clone()));

    match daemon::run(&config).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_already_running() => {
            tracing::info!("{}", e);
            Ok(())
        }
        Err(e) => {
            tracing::error!("{}", e);
            Err(e.into())
        }
    }
}
