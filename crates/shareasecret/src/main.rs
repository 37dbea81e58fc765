use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::{header, redirect, Client, StatusCode};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

// ── CLI definition ─────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "shareasecret",
    about = "Share a Secret: short-lived, client-encrypted notes",
    version
)]
struct Cli {
    /// Server URL used by `sweep`, `fetch` and `delete` ($SHAREASECRET_SERVER)
    #[arg(long, env = "SHAREASECRET_SERVER", default_value = "http://localhost:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (default: $SHAREASECRET_PORT or 8080)
        #[arg(long, env = "SHAREASECRET_PORT", default_value = "8080")]
        port: u16,
        /// Host to bind (default: $SHAREASECRET_HOST or 0.0.0.0)
        #[arg(long, env = "SHAREASECRET_HOST", default_value = "0.0.0.0")]
        host: String,
        /// Public origin used in generated links (default: http://localhost:<port>)
        #[arg(long, env = "SHAREASECRET_BASE_URL")]
        base_url: Option<String>,
        /// Directory holding shareasecret.db
        #[arg(long, env = "SHAREASECRET_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },
    /// Ask the running server to expire every secret whose TTL has elapsed
    Sweep,
    /// Print the encrypted envelope for a viewing id
    Fetch {
        /// Viewing id (the last path segment of a /secret/ link)
        viewing_id: String,
    },
    /// Delete a secret by management id
    Delete {
        /// Management id (from a /manage-secret/ link)
        management_id: String,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SHAREASECRET_LOG_LEVEL")
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Serve {
            port,
            host,
            base_url,
            data_dir,
        } => cmd_serve(host, port, base_url, data_dir).await,

        Commands::Sweep => cmd_sweep(&cli.server).await,

        Commands::Fetch { viewing_id } => cmd_fetch(&cli.server, &viewing_id).await,

        Commands::Delete { management_id } => cmd_delete(&cli.server, &management_id).await,
    }
}

// ── Command implementations ───────────────────────────────────────────────────

async fn cmd_serve(
    host: String,
    port: u16,
    base_url: Option<String>,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let defaults = shareasecret_server::ServerConfig::default();
    let cfg = shareasecret_server::ServerConfig {
        base_url: base_url.unwrap_or_else(|| format!("http://localhost:{port}")),
        host,
        port,
        data_dir: data_dir.or(defaults.data_dir.clone()),
        ..defaults
    };

    shareasecret_server::run(cfg).await
}

async fn cmd_sweep(server: &str) -> Result<()> {
    let resp = client()?
        .post(format!("{}/sweep", server.trim_end_matches('/')))
        .send()
        .await
        .context("HTTP request failed")?;

    if !resp.status().is_success() {
        anyhow::bail!("server returned {}", resp.status());
    }
    let json: Value = resp.json().await.context("parse response")?;
    println!("expired {} secret(s)", json["expired"].as_u64().unwrap_or(0));
    Ok(())
}

async fn cmd_fetch(server: &str, viewing_id: &str) -> Result<()> {
    let resp = client()?
        .get(format!("{}/secret/{}", server.trim_end_matches('/'), viewing_id))
        .send()
        .await
        .context("HTTP request failed")?;

    match resp.status() {
        StatusCode::OK => {
            let json: Value = resp.json().await.context("parse response")?;
            println!("{}", json["cipher_text"].as_str().unwrap_or(""));
            Ok(())
        }
        StatusCode::SEE_OTHER if redirect_target(&resp) == "/" => {
            anyhow::bail!("secret does not exist or has been deleted")
        }
        status => anyhow::bail!("server returned {status}"),
    }
}

async fn cmd_delete(server: &str, management_id: &str) -> Result<()> {
    let resp = client()?
        .post(format!(
            "{}/manage-secret/{}/delete",
            server.trim_end_matches('/'),
            management_id
        ))
        .send()
        .await
        .context("HTTP request failed")?;

    if resp.status() == StatusCode::SEE_OTHER && redirect_target(&resp) == "/" {
        println!("✓ deleted");
        Ok(())
    } else {
        anyhow::bail!("server returned {}", resp.status())
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// The server answers with redirects; inspect them instead of following.
fn client() -> Result<Client> {
    Client::builder()
        .redirect(redirect::Policy::none())
        .build()
        .context("build HTTP client")
}

fn redirect_target(resp: &reqwest::Response) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
