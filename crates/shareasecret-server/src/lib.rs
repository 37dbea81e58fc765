pub mod flash;
pub mod handlers;
pub mod ids;
pub mod input;
pub mod lifecycle;
pub mod server;
pub mod store;

/// Shared application state threaded through axum handlers.
#[derive(Clone)]
pub struct AppState<S = store::Store> {
    pub secrets: lifecycle::Lifecycle<S>,
}

pub use lifecycle::{now_millis, Lifecycle, LifecycleError};
pub use server::{open_store, resolve_data_dir, router, run, ServerConfig};
