//! Slipway CLI tool.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use slipway_core::event::EventKind;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "slipway")]
#[command(about = "Multi-architecture image release pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the release pipeline for a source event.
    ///
    /// The registry password or access token is read from the
    /// SLIPWAY_REGISTRY_PASSWORD environment variable only, so it never
    /// appears on a command line.
    Publish {
        /// Path to the release configuration file
        #[arg(long, default_value = "slipway.kdl")]
        config: String,
        /// Kind of source event that triggered this run
        #[arg(long, value_enum)]
        event: EventKindArg,
        /// Fully qualified git reference of the event
        #[arg(long = "git-ref")]
        git_ref: String,
        /// Registry username
        #[arg(long, env = "SLIPWAY_REGISTRY_USER")]
        username: String,
        /// Build every platform but skip the registry push
        #[arg(long)]
        no_push: bool,
    },
    /// Validate a release configuration
    Validate {
        /// Path to the configuration file
        #[arg(default_value = "slipway.kdl")]
        path: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum EventKindArg {
    Push,
    Release,
}

impl From<EventKindArg> for EventKind {
    fn from(kind: EventKindArg) -> Self {
        match kind {
            EventKindArg::Push => EventKind::Push,
            EventKindArg::Release => EventKind::Release,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Publish {
            config,
            event,
            git_ref,
            username,
            no_push,
        } => {
            let password = std::env::var("SLIPWAY_REGISTRY_PASSWORD")
                .context("SLIPWAY_REGISTRY_PASSWORD is not set")?;
            commands::publish(commands::PublishArgs {
                config_path: config,
                event_kind: event.into(),
                git_ref,
                username,
                password,
                push: !no_push,
            })
            .await?;
        }
        Commands::Validate { path } => {
            commands::validate(&path)?;
        }
    }

    Ok(())
}
