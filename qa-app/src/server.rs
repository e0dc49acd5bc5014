//! QA Suite HTTP server and one-shot CLI commands.

use crate::config::QaSuiteConfig;
use crate::routes;
use crate::session::SessionManager;
use anyhow::Result;
use axum::Extension;
use axum::http::HeaderMap;
use axum::http::Request;
use axum::http::StatusCode;
use axum::response::Response;
use qa_llm::{AiGateway, GatewayConfig, ProviderKind, ProviderSelector};
use qa_tools::{DocumentExtractor, FormatExtractor};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

pub struct QaState {
    /// Server-wide provider defaults; sessions overlay their own settings.
    pub gateway_config: GatewayConfig,
    pub gateway: AiGateway,
    pub sessions: Arc<SessionManager>,
    pub extractor: Arc<dyn DocumentExtractor>,
    pub started_at: Instant,
}

impl QaState {
    pub fn new(gateway_config: GatewayConfig, gateway: AiGateway, sessions: Arc<SessionManager>) -> Self {
        Self {
            gateway_config,
            gateway,
            sessions,
            extractor: Arc::new(FormatExtractor),
            started_at: Instant::now(),
        }
    }
}

pub async fn doctor(config_path: Option<PathBuf>) -> Result<()> {
    let (cfg, path) = QaSuiteConfig::load_with_path(config_path).await?;
    let gateway_config = cfg.gateway_config()?;
    let configured = gateway_config.eligible_providers();
    let addr = cfg.bind_addr()?;
    tracing::info!(
        config_path = %path.display(),
        provider = %gateway_config.selector,
        configured_providers = ?configured,
        bind_addr = %addr,
        "config ok"
    );
    if configured.is_empty() {
        tracing::warn!("no provider credentials found; generation requests will fail until keys are supplied");
    }
    if let ProviderSelector::Pinned(kind) = gateway_config.selector {
        if !gateway_config.is_configured(kind) {
            tracing::warn!(provider = %kind, env = kind.credential_env(), "pinned provider has no credential");
        }
    }
    Ok(())
}

/// Print each provider's status, in fallback order.
pub async fn providers(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = QaSuiteConfig::load(config_path).await?;
    let gateway_config = cfg.gateway_config()?;
    println!("selector: {}", gateway_config.selector);
    for kind in ProviderKind::FALLBACK_ORDER {
        let provider = gateway_config.provider(kind);
        println!(
            "{:<8} {:<12} model={} ({})",
            kind.as_str(),
            if provider.is_configured() { "configured" } else { "missing" },
            provider.model_id,
            kind.credential_env(),
        );
    }
    Ok(())
}

pub fn models() {
    for model in qa_llm::GITHUB_MODELS {
        println!("{model}");
    }
}

pub async fn generate_once(
    config_path: Option<PathBuf>,
    provider: Option<String>,
    prompt: &str,
) -> Result<()> {
    let cfg = QaSuiteConfig::load(config_path).await?;
    let gateway_config = cfg.gateway_config()?;
    let selector = provider
        .as_deref()
        .map(str::parse::<ProviderSelector>)
        .transpose()
        .map_err(|e| anyhow::anyhow!("--provider: {e}"))?;
    let gateway = AiGateway::http(Some(cfg.request_timeout()));
    let text = gateway.generate(&gateway_config, prompt, selector).await?;
    println!("{text}");
    Ok(())
}

pub fn app(state: Arc<QaState>, cfg: &QaSuiteConfig) -> axum::Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
                request_id = %request_id_from_headers(request.headers())
            )
        })
        .on_request(|request: &Request<_>, _span: &tracing::Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id_from_headers(request.headers()),
                "http request started"
            );
        })
        .on_response(
            |response: &Response, latency: Duration, _span: &tracing::Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis() as u64,
                    "http request completed"
                );
            },
        )
        .on_failure(
            |error: ServerErrorsFailureClass, latency: Duration, _span: &tracing::Span| {
                tracing::error!(
                    error_class = %error,
                    latency_ms = latency.as_millis() as u64,
                    "http request failed"
                );
            },
        );

    routes::router()
        .layer(Extension(state))
        .layer(GlobalConcurrencyLimitLayer::new(cfg.server.http_max_in_flight))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(cfg.server.http_timeout_seconds),
        ))
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

pub async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let (cfg, cfg_path) = QaSuiteConfig::load_with_path(config_path).await?;
    let addr = cfg.bind_addr()?;
    let gateway_config = cfg.gateway_config()?;
    tracing::info!(
        config_path = %cfg_path.display(),
        bind_addr = %addr,
        provider = %gateway_config.selector,
        configured_providers = ?gateway_config.eligible_providers(),
        github_model = ?gateway_config.github_model,
        llm_request_timeout_seconds = cfg.llm.request_timeout_seconds,
        http_timeout_seconds = cfg.server.http_timeout_seconds,
        http_max_in_flight = cfg.server.http_max_in_flight,
        session_idle_minutes = cfg.server.session_idle_minutes,
        "server configuration loaded"
    );
    let listener = preflight_bind_listener(addr).await?;

    let sessions = Arc::new(SessionManager::new(
        &cfg.general.module,
        Duration::from_secs(cfg.server.session_idle_minutes * 60),
    ));
    let gateway = AiGateway::http(Some(cfg.request_timeout()));
    let state = Arc::new(QaState::new(gateway_config, gateway, sessions.clone()));

    let shutdown = CancellationToken::new();
    let pruner = tokio::spawn(prune_sessions(sessions, shutdown.child_token()));

    let app = app(state, &cfg);
    tracing::info!(%addr, "qasuite serving");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;
    tracing::info!("http server shutdown completed");

    shutdown.cancel();
    match pruner.await {
        Ok(()) => tracing::info!("session pruner stopped"),
        Err(e) => tracing::error!(error = %e, "session pruner join failed during shutdown"),
    }
    Ok(())
}

async fn prune_sessions(sessions: Arc<SessionManager>, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => {
                sessions.prune_idle(chrono::Utc::now());
            }
        }
    }
}

async fn preflight_bind_listener(addr: SocketAddr) -> Result<tokio::net::TcpListener> {
    tracing::info!(%addr, "preflight bind check starting");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("preflight bind failed for {addr}: {e}"))?;
    tracing::info!(%addr, "preflight bind check passed");
    Ok(listener)
}

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "missing".to_string())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler; falling back to ctrl_c only");
                if let Err(ctrlc_err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %ctrlc_err, "failed to await ctrl-c signal");
                }
                shutdown.cancel();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("received ctrl-c; beginning graceful shutdown");
            }
            _ = terminate.recv() => {
                tracing::warn!("received SIGTERM; beginning graceful shutdown");
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to await ctrl-c signal");
        } else {
            tracing::warn!("received ctrl-c; beginning graceful shutdown");
        }
    }
    shutdown.cancel();
}
