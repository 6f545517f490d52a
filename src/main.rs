mod bot;
mod config;
mod health;
mod signals;
mod supervisor;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Serve a liveness endpoint, launch the bot once it is reachable, and exit
/// with the bot's exit code.
#[derive(Parser, Debug)]
#[command(name = "botshell", version, about)]
pub struct Cli {
    /// Config file path (missing file means built-in defaults)
    #[arg(short, long, default_value = "botshell.toml")]
    config: PathBuf,

    /// Print resolved settings and exit without binding or launching
    #[arg(long)]
    dry_run: bool,

    /// Debug logging (spawn details, state transitions)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "botshell=debug"
    } else {
        "botshell=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_thread_ids(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    let config = match config::ShellConfig::resolve(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    };

    if cli.dry_run {
        println!("botshell v{}", env!("CARGO_PKG_VERSION"));
        println!("Config file: {}", cli.config.display());
        println!("Listen:      {}:{}", config.server.bind, config.server.port);
        println!("Bot:         {} {}", config.bot.command, config.bot.args.join(" "));
        return;
    }

    let code = match supervisor::run(config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e}");
            1
        }
    };
    std::process::exit(code);
}
