mod http;

use std::path::PathBuf;

use anyhow::{Context, Result};
use apphost_bootstrap::paths::resolve_under;
use apphost_bootstrap::{AppConfig, CliOverrides, cancel_on_shutdown_signal, init_logging};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use tenant_host::{TenantHostConfig, TenantHostModule};
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Config section holding the tenant host settings.
const TENANT_HOST_SECTION: &str = "tenant_host";

/// AppHost Server - many small tenant applications behind one surface
#[derive(Parser)]
#[command(name = "apphost-server")]
#[command(about = "AppHost Server - many small tenant applications behind one surface")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port override for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print effective configuration (JSON) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Validate configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config
        && !path.is_file()
    {
        anyhow::bail!("config file does not exist: {}", path.display());
    }

    // 1) defaults -> 2) YAML (if provided) -> 3) env (APP__*) -> 4) CLI overrides
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&CliOverrides {
        port: cli.port,
        verbose: cli.verbose,
    });

    if cli.print_config {
        println!("{}", config.to_pretty_json()?);
        return Ok(());
    }

    let _log_guard = init_logging(&config.logging, &config.home_dir())?;
    tracing::info!("AppHost Server starting");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check_config(&config),
    }
}

/// Tenant host settings with `data_root` resolved under the home dir.
fn tenant_host_config(config: &AppConfig) -> Result<(TenantHostConfig, PathBuf)> {
    let cfg: TenantHostConfig = config.module_config(TENANT_HOST_SECTION)?;
    let data_root = resolve_under(&config.home_dir(), &cfg.data_root.to_string_lossy())
        .context("invalid tenant_host.data_root")?;
    Ok((cfg, data_root))
}

fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");
    let (cfg, data_root) = tenant_host_config(config)?;
    let source = tenant_host::domain::registry::RegistrySource::from_config(
        &cfg.registry,
        cfg.upstream.discovery_host.clone(),
    );
    let tenants = tenant_host::domain::registry::Registry::load(source)?.list().len();
    println!("Configuration is valid");
    println!("data_root: {}", data_root.display());
    println!("tenants: {tenants}");
    println!("{}", config.to_pretty_json()?);
    Ok(())
}

async fn run_server(config: AppConfig) -> Result<()> {
    let (cfg, data_root) = tenant_host_config(&config)?;
    std::fs::create_dir_all(&data_root)
        .with_context(|| format!("cannot create data root {}", data_root.display()))?;

    let module = TenantHostModule::init(&cfg, data_root)?;
    let app = http::with_middleware(module.router());

    let addr = config.server.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "HTTP server listening");

    let cancel = CancellationToken::new();
    cancel_on_shutdown_signal(cancel.clone());

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await;

    module.shutdown().await;
    served.context("HTTP server failed")?;
    tracing::info!("AppHost Server stopped");
    Ok(())
}
