use std::sync::Arc;

use {
    anyhow::Context,
    axum::{Router, http::header, response::IntoResponse, routing::get},
    prophet_config::{FileConfigLoader, ProphetConfig},
    tower_http::trace::TraceLayer,
    tracing::{info, warn},
};

use crate::{routes, state::AppState};

// ── Router ───────────────────────────────────────────────────────────────────

/// Build the router (shared between production startup and tests).
pub fn build_app(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/", get(routes::index).post(routes::index_form))
        .route("/auth_return", get(routes::auth_return))
        .route("/predict", get(routes::predict).post(routes::predict))
        .route("/health", get(routes::health))
        .route("/assets/style.css", get(css_handler))
        .route("/assets/predict.js", get(js_handler));

    let router = if state.allow_reset {
        router.route("/reset", get(routes::reset))
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Start the HTTP server and run until ctrl-c.
pub async fn start_gateway(config: &ProphetConfig) -> anyhow::Result<()> {
    let loader = FileConfigLoader::from_config(config);
    let state = AppState::from_config(config, &loader).await?;
    let credential = state.credentials.state().await?;
    if config.server.needs_public_url() {
        warn!(
            redirect_uri = %state.redirect_uri,
            "listening on all interfaces without server.public_url; the OAuth callback only works from this host"
        );
    }

    let app = build_app(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind((config.server.bind.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "failed to bind {}:{}",
                config.server.bind, config.server.port
            )
        })?;
    let addr = listener.local_addr()?;

    // Startup banner.
    let lines = [
        format!("prophet v{}, listening on {}", state.version, addr),
        format!(
            "{} models, default \"{}\"",
            state.catalog.len(),
            state.default_model
        ),
        format!("oauth callback: {}", state.redirect_uri),
        format!("credential: {credential}"),
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

// ── Static assets ────────────────────────────────────────────────────────────

async fn css_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        include_str!("assets/style.css"),
    )
}

async fn js_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        include_str!("assets/predict.js"),
    )
}
