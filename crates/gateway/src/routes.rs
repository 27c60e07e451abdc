//! Request handlers.

use std::{collections::HashMap, sync::Arc};

use {
    askama::Template,
    axum::{
        Form, Json,
        extract::{Query, State},
        http::{StatusCode, header},
        response::{Html, IntoResponse, Redirect, Response},
    },
    prophet_predict::PredictionRequest,
    serde::Deserialize,
    tracing::{info, warn},
};

use crate::{error::AppError, state::AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ModelQuery {
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthReturnQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

// ── Index ────────────────────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "index.html")]
struct IndexPage<'a> {
    version: &'a str,
    selected: &'a str,
    known: bool,
    models: Vec<ModelView<'a>>,
    fields: Vec<&'a str>,
    allow_reset: bool,
}

struct ModelView<'a> {
    name: &'a str,
    selected: bool,
}

pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ModelQuery>,
) -> Result<Response, AppError> {
    render_index(&state, query.model).await
}

/// The model dropdown resubmits the page as a form post.
pub async fn index_form(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ModelQuery>,
) -> Result<Response, AppError> {
    render_index(&state, form.model).await
}

async fn render_index(state: &AppState, model: Option<String>) -> Result<Response, AppError> {
    if state.credentials.current().await?.is_none() {
        let url = state
            .credentials
            .flow()
            .authorization_url(&state.redirect_uri)?;
        info!("no server credential yet, sending browser to consent page");
        return Ok(Redirect::to(url.as_str()).into_response());
    }

    let selected = model
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| state.default_model.clone());
    let descriptor = state.catalog.get(&selected);
    let page = IndexPage {
        version: &state.version,
        selected: &selected,
        known: descriptor.is_some(),
        models: state
            .catalog
            .names()
            .map(|name| ModelView {
                name,
                selected: name == selected,
            })
            .collect(),
        fields: descriptor.map(|d| d.labels().collect()).unwrap_or_default(),
        allow_reset: state.allow_reset,
    };

    Ok(match page.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            warn!(error = %e, "failed to render index page");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "the model page could not be rendered",
            )
                .into_response()
        },
    })
}

// ── OAuth callback ───────────────────────────────────────────────────────────

pub async fn auth_return(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuthReturnQuery>,
) -> Result<Redirect, AppError> {
    if let Some(error) = query.error {
        warn!(%error, "identity provider refused authorization");
        return Err(AppError::AuthDenied(error));
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::AuthDenied("no authorization code in callback".into()))?;

    state
        .credentials
        .exchange_and_store(&code, &state.redirect_uri)
        .await?;
    Ok(Redirect::to("/"))
}

// ── Prediction relay ─────────────────────────────────────────────────────────

/// Relay one prediction. Failures come back as status 200 with a tagged
/// body; the page script depends on that.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match run_prediction(&state, &params).await {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            warn!(error = %e, "prediction request failed");
            e.into_tagged()
        },
    }
}

async fn run_prediction(
    state: &AppState,
    params: &HashMap<String, String>,
) -> Result<String, AppError> {
    let tokens = state.credentials.access_token().await?;
    let model = params.get("model").map(String::as_str).unwrap_or_default();
    let request = PredictionRequest::from_form(&state.catalog, model, params)?;
    Ok(state.predictor.predict(&request, tokens.access()).await?)
}

// ── Admin ────────────────────────────────────────────────────────────────────

pub async fn reset(State(state): State<Arc<AppState>>) -> Result<Redirect, AppError> {
    state.credentials.reset().await?;
    Ok(Redirect::to("/"))
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let credential = match state.credentials.state().await {
        Ok(credential) => Some(credential),
        Err(e) => {
            warn!(error = %e, "credential store unavailable");
            None
        },
    };
    Json(serde_json::json!({
        "status": if credential.is_some() { "ok" } else { "degraded" },
        "version": state.version,
        "credential": credential,
    }))
}
