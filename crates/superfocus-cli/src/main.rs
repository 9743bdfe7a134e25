//! SuperFocus CLI
//!
//! Main entry point for running the SuperFocus API server.

use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use superfocus_server::{create_router, AppState, Config, Environment};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// SuperFocus - Tutoring API Server
///
/// Serves homework feedback, homework planning, test prep, speech and
/// child-safe video search for the SuperFocus app.
#[derive(Parser, Debug)]
#[command(name = "superfocus")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: superfocus.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Address to bind, overriding the config file
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Port to listen on, overriding the config file
    #[arg(short, long)]
    port: Option<u16>,

    /// Report which services are configured and exit
    #[arg(long)]
    check: bool,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::debug!(config = ?args.config, "Config file");

    let result = if args.check {
        run_check(&args)
    } else {
        run_server(args).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Loads config, applies CLI overrides and re-validates.
fn resolve_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(ref host) = args.host {
        config.host.clone_from(host);
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    config.validate().map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(config)
}

fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Prints the configuration state of every service.
fn run_check(args: &Args) -> anyhow::Result<()> {
    let config = resolve_config(args)?;
    let env = Environment::from_env();

    print_config(&config);
    println!();
    println!("Services:");
    for status in env.services() {
        let state = if status.configured { "ok" } else { "missing" };
        let kind = if status.required { "required" } else { "optional" };
        println!("  {:<10} {state:<8} ({kind}, {})", status.name, status.env);
    }

    let missing = env.missing_required();
    if !missing.is_empty() {
        anyhow::bail!(
            "Missing required environment variables: {}\n\nSuggestion: Set them in the environment before starting the server",
            missing.join(", ")
        );
    }
    Ok(())
}

/// Runs the HTTP server until Ctrl+C.
async fn run_server(args: Args) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;
    print_config(&config);

    let env = Environment::from_env();
    let missing = env.missing_required();
    if !missing.is_empty() {
        tracing::warn!(missing = ?missing, "Starting without required configuration");
    }

    let addr = config.bind_address();
    let state = AppState::from_environment(config, env).map_err(|e| anyhow::anyhow!("{e}"))?;
    let router = create_router(state);

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!();
    println!("SuperFocus API running on http://{addr}");
    println!("Press Ctrl+C to stop");
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    tracing::info!("Received Ctrl+C, shutting down");
}

fn print_config(config: &Config) {
    println!("Configuration:");
    println!("  Bind:          {}", config.bind_address());
    println!("  Chat model:    {}", config.chat_model);
    println!("  Speech model:  {}", config.tts_model);
    println!("  Timeout:       {}s", config.request_timeout_secs);
    if config.rate_limit.enabled {
        println!(
            "  Rate limit:    {} requests / {}s",
            config.rate_limit.max_requests, config.rate_limit.window_seconds
        );
    } else {
        println!("  Rate limit:    disabled");
    }
    let proxy = if config.trust_proxy_headers { "trusted" } else { "ignored" };
    println!("  Proxy headers: {proxy}");
}
