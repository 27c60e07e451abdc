//! The two static JSON documents the server needs: the OAuth client secret
//! downloaded from the provider console, and the model catalog.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use {
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::debug,
};

use crate::{error::ConfigError, schema::ProphetConfig};

/// OAuth client identity, loaded once at startup.
#[derive(Clone)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: Secret<String>,
}

impl std::fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecret")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Deserialize)]
struct SecretsDocument {
    installed: Option<SecretsEntry>,
    web: Option<SecretsEntry>,
}

#[derive(Deserialize)]
struct SecretsEntry {
    client_id: String,
    client_secret: String,
}

impl ClientSecret {
    /// Parse a `client_secrets.json` document. Both the `installed` and the
    /// `web` application layouts are accepted; `installed` wins if both exist.
    pub fn from_json(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let doc: SecretsDocument =
            serde_json::from_str(raw).map_err(|e| ConfigError::parse(path, e))?;
        let entry = doc
            .installed
            .or(doc.web)
            .ok_or_else(|| ConfigError::invalid(path, "missing \"installed\" section"))?;

        if entry.client_id.trim().is_empty() {
            return Err(ConfigError::invalid(path, "client_id is empty"));
        }
        if entry.client_secret.trim().is_empty() {
            return Err(ConfigError::invalid(path, "client_secret is empty"));
        }

        Ok(Self {
            client_id: entry.client_id,
            client_secret: Secret::new(entry.client_secret),
        })
    }

    pub fn secret(&self) -> &str {
        self.client_secret.expose_secret()
    }
}

/// One input field of a model, in feature-vector order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldDescriptor {
    pub label: String,
}

/// A trained model the user can query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelDescriptor {
    pub model_id: String,
    pub fields: Vec<FieldDescriptor>,
}

impl ModelDescriptor {
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.label.as_str())
    }
}

/// Model name -> descriptor, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelCatalog {
    models: BTreeMap<String, ModelDescriptor>,
}

impl ModelCatalog {
    pub fn from_json(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let models: BTreeMap<String, ModelDescriptor> =
            serde_json::from_str(raw).map_err(|e| ConfigError::parse(path, e))?;
        for (name, model) in &models {
            if model.model_id.trim().is_empty() {
                return Err(ConfigError::invalid(
                    path,
                    format!("model {name:?} has an empty model_id"),
                ));
            }
        }
        Ok(Self { models })
    }

    pub fn get(&self, name: &str) -> Option<&ModelDescriptor> {
        self.models.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelDescriptor)> {
        self.models.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl FromIterator<(String, ModelDescriptor)> for ModelCatalog {
    fn from_iter<I: IntoIterator<Item = (String, ModelDescriptor)>>(iter: I) -> Self {
        Self {
            models: iter.into_iter().collect(),
        }
    }
}

/// Source of the static configuration documents.
pub trait ConfigLoader: Send + Sync {
    fn client_secret(&self) -> Result<ClientSecret, ConfigError>;
    fn model_catalog(&self) -> Result<ModelCatalog, ConfigError>;
}

/// Reads both documents from disk on every call.
#[derive(Debug, Clone)]
pub struct FileConfigLoader {
    secrets_file: PathBuf,
    models_file: PathBuf,
}

impl FileConfigLoader {
    pub fn new(secrets_file: PathBuf, models_file: PathBuf) -> Self {
        Self {
            secrets_file,
            models_file,
        }
    }

    pub fn from_config(config: &ProphetConfig) -> Self {
        Self::new(
            config.oauth.secrets_file.clone(),
            config.prediction.models_file.clone(),
        )
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    debug!(path = %path.display(), "reading static config");
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

impl ConfigLoader for FileConfigLoader {
    fn client_secret(&self) -> Result<ClientSecret, ConfigError> {
        ClientSecret::from_json(&read(&self.secrets_file)?, &self.secrets_file)
    }

    fn model_catalog(&self) -> Result<ModelCatalog, ConfigError> {
        ModelCatalog::from_json(&read(&self.models_file)?, &self.models_file)
    }
}
