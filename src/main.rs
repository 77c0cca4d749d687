use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use medrag_core::bootstrap::{
    AppContext, build_ingestion_pipeline, check_embedder_dimensions, check_provider,
    completion_params, create_ingest_backends, create_provider, load_config,
};
use medrag_core::{Config, FALLBACK_ANSWER};
use medrag_gateway::GatewayServer;
use medrag_llm::CompletionProvider;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "medrag", version, about = "Medical question answering over indexed PDFs")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, env = "MEDRAG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load, chunk, embed and index every document in the data directory.
    Ingest {
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Serve the chat page and question endpoints.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Answer a single question on stdout.
    Ask {
        question: String,
        /// Also print the retrieved context and its sources.
        #[arg(long)]
        show_context: bool,
    },
    /// Send a short prompt to the configured provider.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    init_subscriber();
    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).await?;

    match cli.command {
        Command::Ingest { data_dir } => ingest(config, data_dir).await,
        Command::Serve { port } => serve(config, port).await,
        Command::Ask {
            question,
            show_context,
        } => ask(config, &question, show_context).await,
        Command::Check => check(&config).await,
    }
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

async fn ingest(mut config: Config, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
    if let Some(dir) = data_dir {
        config.ingest.data_dir = dir;
    }
    let (store, embedder) = create_ingest_backends(&config).await?;
    check_embedder_dimensions(&config, &embedder)?;

    let pipeline = build_ingestion_pipeline(&config, embedder, store)?;
    let report = pipeline
        .run(&config.ingest.data_dir)
        .await
        .with_context(|| format!("ingestion of {} failed", config.ingest.data_dir.display()))?;

    println!(
        "Indexed {} chunks from {} document pages into \"{}\"{}",
        report.chunks,
        report.documents,
        config.vector_store.index_name,
        if report.created_index {
            " (index created)"
        } else {
            ""
        }
    );
    Ok(())
}

async fn serve(mut config: Config, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    let host = config.server.host.clone();
    let port = config.server.port;
    let max_body_size = config.server.max_body_size;
    let ctx = AppContext::build(config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    GatewayServer::new(&host, port, Arc::clone(&ctx.query), shutdown_rx)
        .with_max_body_size(max_body_size)
        .serve()
        .await?;
    Ok(())
}

async fn ask(config: Config, question: &str, show_context: bool) -> anyhow::Result<()> {
    let ctx = AppContext::build(config).await?;
    if !show_context {
        println!("{}", ctx.query.answer(question).await);
        return Ok(());
    }

    match ctx.query.ask(question).await {
        Ok(answer) => {
            println!("--- context ---\n{}\n", answer.context);
            println!("--- sources ---");
            for source in &answer.sources {
                println!("{source}");
            }
            println!("\n--- answer ---\n{}", answer.text);
        }
        Err(e) => {
            tracing::error!("query failed: {e:#}");
            println!("{FALLBACK_ANSWER}");
        }
    }
    Ok(())
}

async fn check(config: &Config) -> anyhow::Result<()> {
    let provider = create_provider(config)?;
    let kind = config.llm.provider;
    if let Some(key) = config.provider_key() {
        println!("{}: {}", kind.credential_env(), key.masked());
    }
    println!("provider: {} ({})", provider.name(), provider.model());

    let reply = check_provider(&provider, &completion_params(config)).await?;
    println!("response: {reply}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_ask_with_context_flag() {
        let cli = Cli::try_parse_from(["medrag", "ask", "What is gout?", "--show-context"]).unwrap();
        match cli.command {
            Command::Ask {
                question,
                show_context,
            } => {
                assert_eq!(question, "What is gout?");
                assert!(show_context);
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn parses_global_config_after_subcommand() {
        let cli =
            Cli::try_parse_from(["medrag", "serve", "--port", "9000", "--config", "a.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("a.toml")));
        assert!(matches!(cli.command, Command::Serve { port: Some(9000) }));
    }

    #[test]
    fn ingest_data_dir_is_optional() {
        let cli = Cli::try_parse_from(["medrag", "ingest"]).unwrap();
        assert!(matches!(cli.command, Command::Ingest { data_dir: None }));
    }
}
