use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use directories::ProjectDirs;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    handlers::{
        create_secret, delete_secret, health, index, manage_secret, nojs, oops, sweep_secrets,
        view_secret,
    },
    lifecycle::Lifecycle,
    store::{SecretStore, Store},
    AppState,
};

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public origin used in viewing and delete links ($SHAREASECRET_BASE_URL).
    pub base_url: String,
    pub data_dir: Option<PathBuf>,
    /// Served under `/static` and `/robots.txt` when the directory exists.
    pub static_dir: PathBuf,
    /// Zero disables the in-process expiration sweep.
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let port = std::env::var("SHAREASECRET_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        Self {
            host: std::env::var("SHAREASECRET_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            base_url: std::env::var("SHAREASECRET_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{port}")),
            data_dir: std::env::var("SHAREASECRET_DATA_DIR").ok().map(PathBuf::from),
            static_dir: std::env::var("SHAREASECRET_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./static")),
            sweep_interval: Duration::from_secs(
                std::env::var("SHAREASECRET_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60),
            ),
        }
    }
}

/// Directory holding `shareasecret.db`, created if missing. Without an
/// explicit directory this is the platform data dir
/// (`~/.local/share/shareasecret/` on Linux).
pub fn resolve_data_dir(data_dir: Option<&PathBuf>) -> Result<PathBuf> {
    let path = match data_dir {
        Some(d) => d.clone(),
        None => ProjectDirs::from("", "", "shareasecret")
            .context("no platform data directory; set SHAREASECRET_DATA_DIR")?
            .data_dir()
            .to_owned(),
    };
    std::fs::create_dir_all(&path)
        .with_context(|| format!("create data dir: {}", path.display()))?;
    Ok(path)
}

/// Open the secret database inside `data_dir`.
pub fn open_store(data_dir: &Path) -> Result<Store> {
    let db_path = data_dir.join("shareasecret.db");
    Store::open(&db_path).with_context(|| format!("open store: {}", db_path.display()))
}

/// Build the application router. Generic over the store so tests can swap it.
pub fn router<S: SecretStore>(state: AppState<S>, static_dir: Option<&Path>) -> Router {
    let mut app = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/oops", get(oops))
        .route("/nojs", get(nojs))
        .route("/sweep", post(sweep_secrets::<S>))
        .route("/secret", post(create_secret::<S>))
        .route("/secret/{viewing_id}", get(view_secret::<S>))
        .route("/manage-secret/{management_id}", get(manage_secret::<S>))
        .route(
            "/manage-secret/{management_id}/delete",
            post(delete_secret::<S>),
        )
        .with_state(state);

    if let Some(dir) = static_dir.filter(|d| d.is_dir()) {
        app = app
            .nest_service("/static", ServeDir::new(dir))
            .route_service("/robots.txt", ServeFile::new(dir.join("robots.txt")));
    }

    app.layer(TraceLayer::new_for_http())
}

pub async fn run(cfg: ServerConfig) -> Result<()> {
    let data_dir = resolve_data_dir(cfg.data_dir.as_ref())?;
    info!(data_dir = %data_dir.display(), "using data directory");

    let store = open_store(&data_dir)?;
    let secrets = Lifecycle::new(store, &cfg.base_url);

    if cfg.sweep_interval.is_zero() {
        info!("in-process expiration sweep disabled");
    } else {
        secrets.clone().spawn_sweep(cfg.sweep_interval);
    }

    let app = router(AppState { secrets }, Some(cfg.static_dir.as_path()));

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid host/port")?;

    info!(%addr, base_url = %cfg.base_url, "shareasecret server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind listener")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
