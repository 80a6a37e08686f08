use std::{path::PathBuf, sync::Arc};

use {
    assistant_config::AssistantConfig,
    assistant_gateway::{GatewayState, chat::run_chat},
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "internal-assistant", about = "Internal assistant: document Q&A, Planner and To-Do")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file; discovered from the working and config directories when omitted.
    #[arg(long, global = true)]
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
    /// Start the HTTP API.
    Serve {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Index every document under a prefix.
    Index {
        #[arg(long, default_value = "sop/")]
        prefix: String,
    },
    /// Drop the vector collection and index everything again.
    Rebuild {
        #[arg(long, default_value = "sop/")]
        prefix: String,
    },
    /// List stored documents.
    Documents {
        #[arg(long, default_value = "sop/")]
        prefix: String,
    },
    /// Ask the assistant one question.
    Ask {
        #[arg(long, default_value = "cli_user")]
        user: String,
        #[arg(short, long)]
        message: String,
    },
    /// Print the resolved configuration without secrets.
    Config,
}

fn init_telemetry(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_thread_ids(false).with_ansi(true))
            .init();
    }
}

fn load(cli: &Cli) -> anyhow::Result<AssistantConfig> {
    match &cli.config {
        Some(path) => assistant_config::load_config(path),
        None => Ok(assistant_config::discover_and_load()),
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn documents(config: &AssistantConfig) -> anyhow::Result<Arc<GatewayState>> {
    let state = GatewayState::from_config(config).await?;
    if state.documents.is_none() {
        anyhow::bail!(
            "document management needs blob storage, Document Intelligence, embeddings and Qdrant to be configured"
        );
    }
    Ok(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "internal-assistant starting");
    let mut config = load(&cli)?;

    match cli.command {
        Commands::Serve { bind, port } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            assistant_gateway::start_gateway(&config).await
        },
        Commands::Index { prefix } => {
            let state = documents(&config).await?;
            let Some(manager) = &state.documents else { return Ok(()) };
            print_json(&manager.index_all(&prefix).await?)
        },
        Commands::Rebuild { prefix } => {
            let state = documents(&config).await?;
            let Some(manager) = &state.documents else { return Ok(()) };
            print_json(&manager.rebuild_index(&prefix).await)
        },
        Commands::Documents { prefix } => {
            let state = documents(&config).await?;
            let Some(manager) = &state.documents else { return Ok(()) };
            print_json(&manager.list_documents(&prefix).await?)
        },
        Commands::Ask { user, message } => {
            let state = GatewayState::from_config(&config).await?;
            let result = run_chat(&state, &user, &message).await?;
            for step in &result.steps {
                info!(tool = %step.tool, "tool used");
            }
            println!("{}", result.text);
            Ok(())
        },
        Commands::Config => print_json(&config.redacted()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands_with_defaults() {
        let cli = Cli::try_parse_from(["internal-assistant", "index"]).unwrap();
        assert!(matches!(cli.command, Commands::Index { prefix } if prefix == "sop/"));

        let cli = Cli::try_parse_from([
            "internal-assistant",
            "--json-logs",
            "ask",
            "--user",
            "alice",
            "-m",
            "Berapa hari cuti tahunan?",
        ])
        .unwrap();
        assert!(cli.json_logs);
        assert!(matches!(cli.command, Commands::Ask { user, .. } if user == "alice"));

        let cli = Cli::try_parse_from(["internal-assistant", "serve", "--port", "9000"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { bind: None, port: Some(9000) }));
    }

    #[test]
    fn ask_requires_a_message() {
        assert!(Cli::try_parse_from(["internal-assistant", "ask"]).is_err());
    }
}
