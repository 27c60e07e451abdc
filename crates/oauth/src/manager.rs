use std::sync::Arc;

use {
    tokio::sync::Mutex,
    tracing::{info, warn},
};

use crate::{
    error::{CredentialError, StorageError},
    flow::OAuthFlow,
    storage::CredentialStore,
    types::{CredentialState, TokenSet, now_secs},
};

/// Owns the shared credential's lifecycle: code exchange, lazy refresh and
/// reset, on top of a [`CredentialStore`].
///
/// The credential is service-wide, not per user: every request observes and
/// updates the same record.
pub struct CredentialManager {
    store: Arc<dyn CredentialStore>,
    flow: OAuthFlow,
    /// Serializes refreshes so concurrent requests don't each spend the
    /// refresh token.
    refresh_lock: Mutex<()>,
}

impl CredentialManager {
    pub fn new(store: Arc<dyn CredentialStore>, flow: OAuthFlow) -> Self {
        Self {
            store,
            flow,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn flow(&self) -> &OAuthFlow {
        &self.flow
    }

    pub async fn current(&self) -> Result<Option<TokenSet>, StorageError> {
        self.store.load().await
    }

    pub async fn state(&self) -> Result<CredentialState, StorageError> {
        let tokens = self.store.load().await?;
        Ok(CredentialState::of(tokens.as_ref(), now_secs()))
    }

    /// Complete the grant: exchange `code` and persist the result,
    /// replacing any previous credential.
    pub async fn exchange_and_store(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet, CredentialError> {
        let tokens = self.flow.exchange_code(code, redirect_uri).await?;
        self.store.save(&tokens).await?;
        info!("stored new server credential");
        Ok(tokens)
    }

    /// Tokens with a usable access token, refreshing and persisting first
    /// if the stored one has expired.
    ///
    /// A refresh the provider rejects (revoked grant) clears the record so
    /// the next index visit re-enters consent. Transport failures and
    /// provider outages leave it in place.
    pub async fn access_token(&self) -> Result<TokenSet, CredentialError> {
        let tokens = self
            .store
            .load()
            .await?
            .ok_or(CredentialError::NotAuthorized)?;
        if !tokens.is_expired(now_secs()) {
            return Ok(tokens);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another request may have refreshed while we waited.
        let tokens = self
            .store
            .load()
            .await?
            .ok_or(CredentialError::NotAuthorized)?;
        let (tokens, refreshed) = match self.flow.ensure_fresh(tokens, now_secs()).await {
            Ok(result) => result,
            Err(e) if e.is_grant_rejected() => {
                // The refresh token is dead; only a new consent can fix it.
                warn!(error = %e, "refresh token rejected, clearing credential");
                self.store.clear().await?;
                return Err(e.into());
            },
            Err(e) => {
                warn!(error = %e, "access token refresh failed");
                return Err(e.into());
            },
        };
        if refreshed {
            self.store.save(&tokens).await?;
            info!(expires_in = tokens.expires_in, "refreshed access token");
        }
        Ok(tokens)
    }

    /// Drop the stored credential; the next index visit restarts the grant.
    pub async fn reset(&self) -> Result<(), StorageError> {
        self.store.clear().await?;
        info!("cleared server credential");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{error::AuthExchangeError, storage::MemoryCredentialStore, types::sample_tokens},
        prophet_config::{ClientSecret, OAuthSettings},
        secrecy::Secret,
    };

    fn manager_for(server: &mockito::ServerGuard) -> (CredentialManager, Arc<MemoryCredentialStore>) {
        let settings = OAuthSettings {
            token_url: format!("{}/token", server.url()),
            timeout_secs: 5,
            ..Default::default()
        };
        let client = ClientSecret {
            client_id: "abc".into(),
            client_secret: Secret::new("xyz".into()),
        };
        let store = Arc::new(MemoryCredentialStore::new());
        let flow = OAuthFlow::new(&settings, client).unwrap();
        (CredentialManager::new(store.clone(), flow), store)
    }

    #[tokio::test]
    async fn access_token_without_credential_is_not_authorized() {
        let server = mockito::Server::new_async().await;
        let (manager, _) = manager_for(&server);
        assert!(matches!(
            manager.access_token().await.unwrap_err(),
            CredentialError::NotAuthorized
        ));
        assert_eq!(manager.state().await.unwrap(), CredentialState::Unauthorized);
    }

    #[tokio::test]
    async fn exchange_persists_tokens() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token":"AT1","expires_in":3600,"refresh_token":"RT1"}"#)
            .create_async()
            .await;

        let (manager, store) = manager_for(&server);
        let tokens = manager
            .exchange_and_store("CODE1", "http://localhost/auth_return")
            .await
            .unwrap();

        assert_eq!(store.load().await.unwrap(), Some(tokens));
        assert!(matches!(
            manager.state().await.unwrap(),
            CredentialState::Valid { .. }
        ));
    }

    #[tokio::test]
    async fn failed_exchange_stores_nothing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let (manager, store) = manager_for(&server);
        let err = manager
            .exchange_and_store("BAD", "http://localhost/auth_return")
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::Exchange(_)));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn valid_token_is_used_without_refresh() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/token").expect(0).create_async().await;

        let (manager, store) = manager_for(&server);
        store.save(&sample_tokens(now_secs(), 3600)).await.unwrap();

        let tokens = manager.access_token().await.unwrap();
        mock.assert_async().await;
        assert_eq!(tokens.access(), "AT1");
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_persisted() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token":"AT2","expires_in":3600}"#)
            .expect(1)
            .create_async()
            .await;

        let (manager, store) = manager_for(&server);
        store.save(&sample_tokens(0, 3600)).await.unwrap();

        let tokens = manager.access_token().await.unwrap();
        assert_eq!(tokens.access(), "AT2");
        assert_eq!(tokens.refresh(), "RT1");

        // The second call sees the persisted, still-valid token.
        let again = manager.access_token().await.unwrap();
        assert_eq!(again.access(), "AT2");
        mock.assert_async().await;
        assert_eq!(store.load().await.unwrap(), Some(tokens));
    }

    #[tokio::test]
    async fn rejected_refresh_clears_record() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let (manager, store) = manager_for(&server);
        store.save(&sample_tokens(0, 3600)).await.unwrap();

        let err = manager.access_token().await.unwrap_err();
        assert!(matches!(
            err,
            CredentialError::Exchange(AuthExchangeError::Status { status: 400, .. })
        ));
        assert!(store.load().await.unwrap().is_none());
        assert_eq!(manager.state().await.unwrap(), CredentialState::Unauthorized);
    }

    #[tokio::test]
    async fn provider_outage_keeps_old_record() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(503)
            .with_body("try later")
            .create_async()
            .await;

        let (manager, store) = manager_for(&server);
        let stale = sample_tokens(0, 3600);
        store.save(&stale).await.unwrap();

        let err = manager.access_token().await.unwrap_err();
        assert!(matches!(err, CredentialError::Exchange(_)));
        assert_eq!(store.load().await.unwrap(), Some(stale));
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token":"AT2","expires_in":3600}"#)
            .expect(1)
            .create_async()
            .await;

        let (manager, store) = manager_for(&server);
        store.save(&sample_tokens(0, 3600)).await.unwrap();

        let (a, b) = tokio::join!(manager.access_token(), manager.access_token());
        mock.assert_async().await;
        assert_eq!(a.unwrap().access(), "AT2");
        assert_eq!(b.unwrap().access(), "AT2");
    }

    #[tokio::test]
    async fn reset_clears_credential() {
        let server = mockito::Server::new_async().await;
        let (manager, store) = manager_for(&server);
        store.save(&sample_tokens(now_secs(), 3600)).await.unwrap();

        manager.reset().await.unwrap();
        assert!(manager.current().await.unwrap().is_none());
    }
}
