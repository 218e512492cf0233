use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use status_transformer::{
    config::{Config, SecretSourceKind},
    credentials::{ClusterSecrets, CredentialResolver},
    kubernetes::{self, KubeFunctionConfigs},
    server::Server,
    StatusTransformer,
};

/// Crossplane composition function that asks Claude whether the composed
/// resources are healthy.
#[derive(Parser, Debug)]
#[command(name = "status-transformer", version)]
struct Cli {
    /// Emit debug logs in addition to info logs.
    #[arg(short, long)]
    debug: bool,

    /// Address to listen on. Overrides SERVER_ADDR.
    #[arg(long)]
    address: Option<String>,

    /// Enable support for FunctionConfig APIs.
    #[arg(long)]
    enable_function_configs: bool,

    /// Maximum number of model calls per request. Overrides MAX_TURNS.
    #[arg(long)]
    max_turns: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    // Load configuration
    let mut config = Config::load()?;
    if let Some(address) = cli.address {
        config.server.addr = address;
    }
    if let Some(max_turns) = cli.max_turns {
        config.conversation.max_turns = max_turns;
    }
    config.credentials.enable_function_configs |= cli.enable_function_configs;
    config.validate()?;
    info!("Loaded configuration: {:?}", config);

    let mut resolver = CredentialResolver::new(config.model.clone());
    if config.credentials.enable_function_configs {
        let client = kubernetes::client()
            .await
            .context("failed to get the kubeconfig for the FunctionConfig controller")?;

        let configs = KubeFunctionConfigs::start(client.clone(), config.credentials.function_config_resync());
        resolver = resolver.with_function_configs(configs);

        if config.credentials.secret_source == SecretSourceKind::Cluster {
            let namespace = kubernetes::current_namespace();
            info!(namespace = %namespace, "Reading FunctionConfig Secrets from the API server");
            resolver = resolver.with_cluster_secrets(Arc::new(ClusterSecrets::new(client, namespace)));
        }
    }

    let transformer = StatusTransformer::new(Arc::new(resolver), &config.conversation)?;
    let server = Server::new(&config, Arc::new(transformer));

    info!("Starting server on {}", config.server.addr);
    server.start(&config.server.addr).await?;

    Ok(())
}
