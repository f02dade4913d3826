pub mod error;
pub mod handlers;
pub mod session;

use crate::adapters::storage::LocalResultStore;
use crate::config::ServerConfig;
use crate::core::service::AnnotationService;
use crate::domain::ports::ResultStore;
use crate::utils::error::Result;
use axum::routing::{get, post};
use axum::{middleware, Router};
use session::SessionKeys;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// 所有 worker 共用的唯讀狀態
pub struct AppState {
    pub service: AnnotationService,
    pub store: Arc<dyn ResultStore>,
    pub sessions: SessionKeys,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(service: AnnotationService, store: Arc<dyn ResultStore>, sessions: SessionKeys) -> Self {
        Self {
            service,
            store,
            sessions,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        Ok(Self::new(
            AnnotationService::default(),
            Arc::new(LocalResultStore::new(config.results_dir.clone())),
            SessionKeys::new(&config.secret_key)?,
        ))
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/process", post(handlers::process))
        .route("/download/:filename", get(handlers::download))
        .route("/tonalities", get(handlers::tonalities))
        .route("/history", get(handlers::history))
        .route(
            "/history/:filename",
            get(handlers::history_file).delete(handlers::delete_history_file),
        )
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::session_layer,
        ))
        .with_state(state)
}

/// 在已綁定的 listener 上提供服務，直到 `shutdown` 完成
pub async fn serve<F>(listener: TcpListener, state: SharedState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Ctrl-C 或 SIGTERM (容器停止時送出)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("🛑 Received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("🛑 Received SIGTERM, shutting down"),
    }
}
