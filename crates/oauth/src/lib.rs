//! OAuth 2.0 authorization code grant, token refresh, and persistence of
//! the single server-wide credential.

pub mod error;
pub mod flow;
pub mod manager;
pub mod sqlite;
pub mod storage;
pub mod types;

pub use {
    error::{AuthExchangeError, CredentialError, StorageError},
    flow::{OAuthFlow, build_authorization_url},
    manager::CredentialManager,
    sqlite::SqliteCredentialStore,
    storage::{CredentialStore, FileCredentialStore, MemoryCredentialStore, open_store},
    types::{CREDENTIAL_KEY, CredentialState, TokenSet, now_secs, serialize_secret},
};
