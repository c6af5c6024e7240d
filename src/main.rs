//! fallback-proxy: streaming mediator with mid-stream fallback
//!
//! Forwards a knowledge-base backend's event stream to the client and, when
//! that backend signals it cannot answer, continues the same response with an
//! OpenAI-compatible chat completion.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fallback_proxy::{backends::build_http_client, config::AppConfig, run_server};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Parser)]
#[command(name = "fallback-proxy")]
#[command(version = "0.1.0")]
#[command(about = "Streaming proxy with knowledge-base to chat-completion fallback")]
#[command(long_about = "
fallback-proxy sits in front of a knowledge-base chat backend and:
  - Streams its answers to the client unchanged
  - Switches to an OpenAI-compatible backend when the answer is \"I don't know\"
  - Ends every response with exactly one terminal frame

Settings come from the config file, then environment variables
(RAGFLOW_URL, OPENAI_API_KEY, OPENAI_BASE_URL, OPENAI_MODEL,
FALLBACK_PERSONA, FALLBACK_PHRASES, FALLBACK_SENTINEL_RETCODE),
then command-line flags.

Example usage:
  fallback-proxy run --config config.yaml
  OPENAI_API_KEY=sk-... fallback-proxy run --port 8000
  fallback-proxy check-config
")]
struct Cli {
    /// Path to config file (defaults are used when it does not exist)
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the proxy server
    Run {
        /// Override listen port
        #[arg(short, long)]
        port: Option<u16>,
        /// Override primary backend URL (e.g., "http://ragflow:9380")
        #[arg(long)]
        primary_url: Option<String>,
    },

    /// Validate configuration
    CheckConfig,

    /// Test connections to both backends
    TestBackend,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level_filter = if let Some(level) = cli.log_level {
        level.to_string()
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
            .to_string()
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&level_filter))
        .init();

    match cli.command {
        Commands::Run { port, primary_url } => {
            run_proxy(&cli.config, port, primary_url).await?;
        }
        Commands::CheckConfig => {
            check_config(&cli.config);
        }
        Commands::TestBackend => {
            test_backend(&cli.config).await?;
        }
    }

    Ok(())
}

/// Run the proxy server
async fn run_proxy(
    config_path: &Path,
    port_override: Option<u16>,
    primary_url_override: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config_or_exit(config_path);

    if let Some(port) = port_override {
        config.server.port = port;
    }
    if let Some(url) = primary_url_override {
        config.primary.url = url;
    }

    if let Err(e) = config.validate() {
        eprintln!("✗ {}", e);
        std::process::exit(1);
    }

    tracing::info!("Loaded configuration from {:?}", config_path);

    run_server(config).await
}

/// Validate configuration
fn check_config(config_path: &Path) {
    let config = load_config_or_exit(config_path);

    if let Err(e) = config.validate() {
        eprintln!("✗ {}", e);
        std::process::exit(1);
    }

    println!("✓ Configuration is valid\n");
    println!("Server:");
    println!("  Listen: {}:{}", config.server.host, config.server.port);
    println!("  Route: POST {}", config.server.route);
    println!("\nPrimary:");
    println!("  URL: {}", config.primary.completion_url());
    println!("  TLS: {}", if config.primary.is_tls() { "enabled" } else { "disabled" });
    println!("  Timeout: {}s", config.primary.timeout_seconds);
    println!("  On error: {:?}", config.primary.on_primary_error);
    if !config.primary.extra_fields.is_empty() {
        let mut keys: Vec<&String> = config.primary.extra_fields.keys().collect();
        keys.sort();
        println!("  Extra fields: {:?}", keys);
    }
    println!("\nSecondary:");
    println!("  URL: {}", config.secondary.completions_url());
    println!("  Model: {}", config.secondary.model);
    println!(
        "  Persona: {}",
        if config.secondary.persona.is_some() { "set" } else { "none" }
    );
    println!("\nFallback:");
    println!("  Sentinel retcode: {}", config.fallback.sentinel_retcode);
    for phrase in &config.fallback.phrases {
        println!("  Phrase: {:?}", phrase);
    }
    println!("\nStats:");
    println!("  Enabled: {}", config.stats.enabled);
    println!("  Format: {:?}", config.stats.format);
}

/// Test connections to both backends
async fn test_backend(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_or_exit(config_path);
    let mut failed = false;

    let primary = build_http_client(Duration::from_secs(5), config.primary.tls.as_ref())?;
    let primary_url = config.primary.base_url();
    println!("Testing connection to primary backend: {}", primary_url);

    match primary.get(primary_url).timeout(Duration::from_secs(5)).send().await {
        Ok(resp) => {
            println!("✓ Primary backend is reachable");
            println!("  Status: {}", resp.status());
        }
        Err(e) => {
            println!("✗ Failed to connect to primary backend: {}", e);
            failed = true;
        }
    }

    let secondary = build_http_client(Duration::from_secs(5), config.secondary.tls.as_ref())?;
    let models_url = format!("{}/models", config.secondary.base_url());
    println!("\nTesting secondary backend: {}", models_url);

    let mut request = secondary.get(&models_url).timeout(Duration::from_secs(5));
    if let Some(ref key) = config.secondary.api_key {
        request = request.bearer_auth(key);
    }

    match request.send().await {
        Ok(resp) if resp.status().is_success() => {
            println!("✓ Secondary backend is reachable");
            if let Ok(json) = resp.json::<serde_json::Value>().await {
                if let Some(data) = json.get("data").and_then(|d| d.as_array()) {
                    let configured = data
                        .iter()
                        .any(|m| m.get("id").and_then(|i| i.as_str()) == Some(config.secondary.model.as_str()));
                    println!("  Available models: {}", data.len());
                    println!(
                        "  Configured model {}: {}",
                        config.secondary.model,
                        if configured { "available" } else { "not listed" }
                    );
                }
            }
        }
        Ok(resp) => {
            println!("✗ Secondary backend returned error status: {}", resp.status());
            failed = true;
        }
        Err(e) => {
            println!("✗ Failed to connect to secondary backend: {}", e);
            failed = true;
        }
    }

    if failed {
        std::process::exit(1);
    }

    Ok(())
}

/// Load configuration (file, then environment) or exit with error
fn load_config_or_exit(config_path: &Path) -> AppConfig {
    match AppConfig::load_or_default(Some(config_path)).and_then(AppConfig::with_process_env) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            eprintln!("\nCheck {:?} and the environment variables it can be overridden by.", config_path);
            std::process::exit(1);
        }
    }
}
