mod auth_commands;

use std::path::PathBuf;

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    prophet_config::{ConfigLoader, FileConfigLoader, ProphetConfig},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "prophet", about = "prophet: try trained prediction models from the browser")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (prophet.toml / .yaml / .json). Discovered when omitted.
    #[arg(long, global = true, env = "PROPHET_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server.
    Serve {
        /// Overrides `server.bind`.
        #[arg(long)]
        bind: Option<String>,
        /// Overrides `server.port`.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Inspect or clear the stored OAuth credential.
    Auth {
        #[command(subcommand)]
        action: auth_commands::AuthAction,
    },
    /// List the models in the catalog.
    Models,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn apply_overrides(config: &mut ProphetConfig, bind: Option<String>, port: Option<u16>) {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
}

fn list_models(config: &ProphetConfig) -> anyhow::Result<()> {
    let catalog = FileConfigLoader::from_config(config)
        .model_catalog()
        .context("failed to load model catalog")?;
    if catalog.is_empty() {
        println!("No models configured.");
        return Ok(());
    }
    for (name, model) in catalog.iter() {
        let marker = if name == config.prediction.default_model {
            " (default)"
        } else {
            ""
        };
        let labels: Vec<&str> = model.labels().collect();
        println!("{name}{marker} [{}]: {}", model.model_id, labels.join(", "));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "prophet starting");

    let mut config = prophet_config::discover_and_load(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Serve { bind, port } => {
            apply_overrides(&mut config, bind, port);
            prophet_gateway::start_gateway(&config).await
        },
        Commands::Auth { action } => auth_commands::handle_auth(action, &config).await,
        Commands::Models => list_models(&config),
    }
}
