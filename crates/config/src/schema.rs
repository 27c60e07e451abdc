//! Config schema types (server, oauth, prediction, storage).

use std::{net::IpAddr, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Google's consent page.
pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
/// Google's token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.google.com/o/oauth2/token";
/// Prediction API root; model paths are appended to it. v1.5 is the last
/// version whose `trainedmodels/{id}/predict` path has no project segment.
pub const DEFAULT_PREDICTION_URL: &str = "https://www.googleapis.com/prediction/v1.5";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProphetConfig {
    pub server: ServerConfig,
    pub oauth: OAuthSettings,
    pub prediction: PredictionSettings,
    pub storage: StorageConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Externally visible base URL, used to build the OAuth redirect URI.
    /// Must match the redirect URI registered with the identity provider.
    pub public_url: Option<String>,
    /// Expose `GET /reset`, which forgets the stored credential. Off by
    /// default: anyone who can reach the server could otherwise revoke it.
    pub allow_reset: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8080,
            public_url: None,
            allow_reset: false,
        }
    }
}

impl ServerConfig {
    /// Base URL the browser reaches us at.
    ///
    /// Without `public_url` it is derived from the listener. A wildcard bind
    /// maps to `localhost` and IPv6 literals are bracketed.
    pub fn base_url(&self) -> String {
        if let Some(url) = &self.public_url {
            return url.trim_end_matches('/').to_string();
        }
        let host = match self.bind.parse::<IpAddr>() {
            Ok(ip) if ip.is_unspecified() => "localhost".to_string(),
            Ok(IpAddr::V6(ip)) => format!("[{ip}]"),
            _ => self.bind.clone(),
        };
        format!("http://{host}:{}", self.port)
    }

    /// Listening on every interface with no `public_url`: the derived
    /// redirect URI only works from this machine.
    pub fn needs_public_url(&self) -> bool {
        self.public_url.is_none()
            && self
                .bind
                .parse::<IpAddr>()
                .is_ok_and(|ip| ip.is_unspecified())
    }

    /// The `/auth_return` callback registered with the identity provider.
    pub fn redirect_uri(&self) -> String {
        format!("{}/auth_return", self.base_url())
    }
}

/// Identity provider endpoints and scopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    pub auth_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    /// Path of the `client_secrets.json` document.
    pub secrets_file: PathBuf,
    /// Upper bound on a single token endpoint call.
    pub timeout_secs: u64,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.into(),
            token_url: DEFAULT_TOKEN_URL.into(),
            scopes: vec![
                "https://www.googleapis.com/auth/devstorage.read_write".into(),
                "https://www.googleapis.com/auth/prediction".into(),
            ],
            secrets_file: PathBuf::from("rc/client_secrets.json"),
            timeout_secs: 30,
        }
    }
}

impl OAuthSettings {
    /// Scopes joined the way the authorization endpoint expects them.
    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Remote prediction service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionSettings {
    pub base_url: String,
    /// Path of the `models.json` catalog.
    pub models_file: PathBuf,
    /// Model preselected on the index page when none is requested.
    pub default_model: String,
    pub timeout_secs: u64,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PREDICTION_URL.into(),
            models_file: PathBuf::from("rc/models.json"),
            default_model: "Language Detection".into(),
            timeout_secs: 30,
        }
    }
}

/// Which credential store backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Sqlite,
    Memory,
}

/// Credential persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// JSON file or SQLite database path. Defaults to the data directory.
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: None,
        }
    }
}

impl StorageConfig {
    /// Resolve the on-disk location for the configured backend.
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        let name = match self.backend {
            StorageBackend::Sqlite => "credentials.db",
            StorageBackend::File | StorageBackend::Memory => "credentials.json",
        };
        crate::loader::data_dir().join(name)
    }
}
