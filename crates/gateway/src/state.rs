use std::sync::Arc;

use {
    anyhow::Context,
    prophet_config::{ConfigLoader, ModelCatalog, ProphetConfig},
    prophet_oauth::{CredentialManager, OAuthFlow, open_store},
    prophet_predict::PredictionClient,
};

/// Everything a request handler needs. Built once at startup and shared
/// behind an `Arc`.
pub struct AppState {
    pub credentials: CredentialManager,
    pub predictor: PredictionClient,
    pub catalog: ModelCatalog,
    /// Callback URI sent in both the consent redirect and the code exchange.
    pub redirect_uri: String,
    pub default_model: String,
    pub allow_reset: bool,
    pub version: String,
}

impl AppState {
    /// Load the static documents through `loader` and wire up the
    /// credential store, OAuth flow and prediction client.
    pub async fn from_config(
        config: &ProphetConfig,
        loader: &dyn ConfigLoader,
    ) -> anyhow::Result<Arc<Self>> {
        let secret = loader
            .client_secret()
            .context("failed to load OAuth client secret")?;
        let catalog = loader
            .model_catalog()
            .context("failed to load model catalog")?;
        let flow = OAuthFlow::new(&config.oauth, secret)?;
        let store = open_store(&config.storage)
            .await
            .context("failed to open credential store")?;
        let predictor = PredictionClient::new(&config.prediction)?;

        Ok(Arc::new(Self {
            credentials: CredentialManager::new(store, flow),
            predictor,
            catalog,
            redirect_uri: config.server.redirect_uri(),
            default_model: config.prediction.default_model.clone(),
            allow_reset: config.server.allow_reset,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }))
    }
}
