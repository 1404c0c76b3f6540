//! Process entry point: builds the router, wires the shared state, and
//! serves until shutdown (spec §6).

use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::routing::{any, get};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::backend::{BackendAuth, BackendClient};
use crate::cache::{MetaCache, SystemClock};
use crate::config::Config;
use crate::error::{ProxyError, ProxyResult};
use crate::provider::Provider;
use crate::webdav::auth;
use crate::webdav::handler;

pub struct AppState {
    pub config: Config,
    pub provider: Arc<Provider>,
}

impl AppState {
    pub fn new(config: Config) -> ProxyResult<Self> {
        let auth = BackendAuth {
            username: config.backend_username.clone(),
            password: config.backend_password.clone(),
        };
        let backend = BackendClient::new(&config.backend_url, auth, config.http_client_timeout_secs)?;
        let cache = MetaCache::new(
            config.metadata_cache_size,
            config.metadata_cache_ttl_secs,
            Arc::new(SystemClock::default()),
        );
        let provider = Arc::new(Provider {
            backend,
            cache,
            file_max_size: config.file_max_size,
            metadata_timeout: Duration::from_secs(10),
        });
        Ok(Self { config, provider })
    }
}

/// Builds the full router: a redirect at the root for a non-root mount,
/// and the WebDAV catch-all under the mount path, gated by Basic-Auth
/// (spec §6). `any()` is used because WebDAV's extra verbs (PROPFIND,
/// MKCOL, COPY, MOVE) have no `MethodFilter` of their own to route on, so
/// dispatch happens inside `handler::dispatch` instead.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mount_glob = format!("{}{{*rest}}", state.config.mount_path);
    let mount_root = state.config.mount_path.trim_end_matches('/').to_string();

    let mut dav = Router::new().route(&mount_glob, any(handler::dispatch));
    if !mount_root.is_empty() {
        dav = dav.route(&mount_root, any(handler::dispatch));
    }
    let dav = dav.route_layer(middleware::from_fn_with_state(state.clone(), auth::basic_auth));

    let mut router = Router::new().merge(dav);
    if !mount_root.is_empty() {
        router = router.route("/", get(auth::redirect_to_mount));
    }

    router
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builds the app from an already-loaded configuration and serves until the
/// process receives a shutdown signal. Returns `Ok(())` on clean shutdown;
/// any `Err` is turned into a non-zero exit code by `main` (spec §6).
pub async fn run(config: Config) -> ProxyResult<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config)?);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(ProxyError::Io)?;
    tracing::info!(%addr, "webdav proxy listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ProxyError::Io)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
