use clap::Parser;
use llm_relay::config::config_search_paths;
use llm_relay::{build_provider, build_router, AppState, RelayConfig, SharedLogger};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "llm-relay",
    about = "Relay chat completions to OpenAI or Anthropic behind one response shape",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Provider name: openai or anthropic (overrides config and LLM_PROVIDER)
    #[arg(long)]
    provider: Option<String>,

    /// Log file path (overrides config)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env is normal in production.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "llm_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = RelayConfig::find_and_load(cli.config.as_deref())?;
    config.apply_env()?;

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(provider) = cli.provider {
        config.provider.name = provider;
    }
    if let Some(log_file) = cli.log_file {
        config.logging.file = log_file;
    }

    let logger = SharedLogger::new(&config.logging.file)?;

    let mut client_builder = reqwest::Client::builder();
    if let Some(secs) = config.provider.upstream_timeout_secs {
        client_builder = client_builder.timeout(std::time::Duration::from_secs(secs));
    }
    let client = client_builder.build()?;

    let provider = build_provider(&config, client, logger.clone());
    let base_url = config.effective_base_url();

    info!("llm-relay v{}", env!("CARGO_PKG_VERSION"));
    info!("  Provider:  {}", provider.kind());
    info!("  Base URL:  {}", base_url);
    info!("  Model:     {}", provider.model());
    info!("  Port:      {}", config.port);
    info!("  Static:    {}", config.static_files.root.display());
    info!("  Assets:    {}", config.static_files.assets.display());
    info!("  Log file:  {}", config.logging.file.display());

    logger.info(
        "startup",
        format!(
            "Starting llm-relay provider={} base_url={} model={} port={}",
            provider.kind(),
            base_url,
            provider.model(),
            config.port
        ),
    );

    let port = config.port;
    let state = Arc::new(AppState::new(config, provider, logger));

    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Server running on port {}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
