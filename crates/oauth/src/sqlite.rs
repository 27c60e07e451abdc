use std::{path::Path, time::Duration};

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    sqlx::{
        SqlitePool,
        sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    },
    tracing::debug,
};

use crate::{
    error::StorageError,
    storage::CredentialStore,
    types::{CREDENTIAL_KEY, TokenSet},
};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS credentials (
    kind          TEXT    NOT NULL,
    name          TEXT    NOT NULL,
    access_token  TEXT    NOT NULL,
    refresh_token TEXT    NOT NULL,
    expires_in    INTEGER NOT NULL,
    issued_at     INTEGER NOT NULL,
    client_id     TEXT    NOT NULL,
    client_secret TEXT    NOT NULL,
    PRIMARY KEY (kind, name)
)";

type CredentialRow = (String, String, i64, i64, String, String);

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn to_u64(v: i64) -> u64 {
    u64::try_from(v).unwrap_or_default()
}

/// SQLite-backed store: one row in `credentials`, keyed by (kind, name).
#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    /// Open (creating if needed) the database at `path`.
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        debug!(path = %path.display(), "opened credential database");
        Self::with_pool(pool).await
    }

    /// A private in-memory database, useful for tests.
    pub async fn in_memory() -> Result<Self, StorageError> {
        // One connection that never idles out: each SQLite memory
        // connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn load(&self) -> Result<Option<TokenSet>, StorageError> {
        let row: Option<CredentialRow> = sqlx::query_as(
            "SELECT access_token, refresh_token, expires_in, issued_at, client_id, client_secret
             FROM credentials WHERE kind = ? AND name = ?",
        )
        .bind(CREDENTIAL_KEY.0)
        .bind(CREDENTIAL_KEY.1)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(access_token, refresh_token, expires_in, issued_at, client_id, client_secret)| {
                TokenSet {
                    access_token: Secret::new(access_token),
                    refresh_token: Secret::new(refresh_token),
                    expires_in: to_u64(expires_in),
                    issued_at: to_u64(issued_at),
                    client_id,
                    client_secret: Secret::new(client_secret),
                }
            },
        ))
    }

    async fn save(&self, tokens: &TokenSet) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO credentials
                (kind, name, access_token, refresh_token, expires_in, issued_at, client_id, client_secret)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(kind, name) DO UPDATE SET
                access_token  = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_in    = excluded.expires_in,
                issued_at     = excluded.issued_at,
                client_id     = excluded.client_id,
                client_secret = excluded.client_secret",
        )
        .bind(CREDENTIAL_KEY.0)
        .bind(CREDENTIAL_KEY.1)
        .bind(tokens.access())
        .bind(tokens.refresh())
        .bind(to_i64(tokens.expires_in))
        .bind(to_i64(tokens.issued_at))
        .bind(tokens.client_id.as_str())
        .bind(tokens.client_secret.expose_secret().as_str())
        .execute(&self.pool)
        .await?;
        debug!("saved credential");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM credentials WHERE kind = ? AND name = ?")
            .bind(CREDENTIAL_KEY.0)
            .bind(CREDENTIAL_KEY.1)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
