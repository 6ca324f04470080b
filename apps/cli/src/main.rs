//! keyturn CLI - rotate, reap and validate service credentials.

mod commands;
mod settings;

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "keyturn")]
#[command(about = "Rotate and retire access keys held in a secret store")]
#[command(version)]
struct Cli {
    /// TOML configuration file (defaults to ./keyturn.toml when present)
    #[arg(short, long, global = true, env = "KEYTURN_CONFIG")]
    config: Option<PathBuf>,

    /// Logging preset; `env` reads KEYTURN_LOG / RUST_LOG / KEYTURN_LOG_FORMAT
    #[arg(long, global = true, value_enum, default_value_t = LogPreset::Env)]
    log: LogPreset,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogPreset {
    Env,
    Development,
    Production,
}

impl LogPreset {
    fn config(self) -> keyturn_log::Config {
        match self {
            Self::Env => keyturn_log::Config::from_env(),
            Self::Development => keyturn_log::Config::development(),
            Self::Production => keyturn_log::Config::production(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run one rotation step for a secret
    #[command(group(ArgGroup::new("source").required(true).args(["event", "secret_id"])))]
    Rotate {
        /// Secret to rotate
        #[arg(long, requires_all = ["token", "step"])]
        secret_id: Option<String>,

        /// Client request token naming the pending version
        #[arg(long)]
        token: Option<String>,

        /// createSecret, setSecret, testSecret or finishSecret
        #[arg(long)]
        step: Option<String>,

        /// Host rotation event as JSON; `-` reads stdin
        #[arg(long, conflicts_with_all = ["secret_id", "token", "step"])]
        event: Option<PathBuf>,
    },

    /// Demote idle previous keys and delete inactive ones
    Reap {
        /// Reap one secret instead of every eligible secret
        #[arg(long)]
        secret_id: Option<String>,
    },

    /// Check that current credentials still authenticate
    Smoke {
        /// Check one secret instead of every eligible secret
        #[arg(long)]
        secret_id: Option<String>,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match keyturn_log::init_with(cli.log.config()) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {e}");
            None
        }
    };

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Command failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Rotate {
            secret_id,
            token,
            step,
            event,
        } => {
            let request = commands::rotate::request(secret_id, token, step, event.as_deref())?;
            commands::rotate::run(&settings, request).await
        }
        Commands::Reap { secret_id } => commands::reap::run(&settings, secret_id).await,
        Commands::Smoke { secret_id } => commands::smoke::run(&settings, secret_id).await,
        Commands::Config => {
            commands::print_json(&settings)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
