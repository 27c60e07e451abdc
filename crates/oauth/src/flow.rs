//! OAuth 2.0 authorization code grant against the identity provider, with
//! on-demand refresh of expired access tokens.

use std::time::Duration;

use {
    prophet_config::{ClientSecret, OAuthSettings},
    reqwest::StatusCode,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::{debug, info, warn},
    url::Url,
};

use crate::{
    error::AuthExchangeError,
    types::{TokenSet, now_secs},
};

/// Longest provider error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Build the consent URL the browser is sent to.
///
/// Requests offline access so a refresh token is issued, and forces the
/// approval prompt so the refresh token is reissued on repeat consent.
/// Pure: the same inputs always produce the same URL.
pub fn build_authorization_url(
    auth_url: &str,
    client_id: &str,
    redirect_uri: &str,
    scope: &str,
) -> Result<Url, AuthExchangeError> {
    for (name, value) in [
        ("authorization endpoint", auth_url),
        ("client_id", client_id),
        ("redirect_uri", redirect_uri),
        ("scope", scope),
    ] {
        if value.trim().is_empty() {
            return Err(AuthExchangeError::InvalidRequest(format!("{name} is empty")));
        }
    }

    Url::parse(redirect_uri).map_err(|e| {
        AuthExchangeError::InvalidRequest(format!("redirect_uri {redirect_uri:?}: {e}"))
    })?;
    let mut url = Url::parse(auth_url).map_err(|e| {
        AuthExchangeError::InvalidRequest(format!("authorization endpoint {auth_url:?}: {e}"))
    })?;

    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", scope)
        .append_pair("response_type", "code")
        .append_pair("access_type", "offline")
        .append_pair("approval_prompt", "force");

    Ok(url)
}

/// Token endpoint response. Every field is optional here so that a missing
/// field is reported as such instead of as a generic parse failure.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

fn required(value: Option<String>, field: &str) -> Result<String, AuthExchangeError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AuthExchangeError::Malformed(format!("missing {field}"))),
    }
}

fn required_lifetime(value: Option<u64>) -> Result<u64, AuthExchangeError> {
    match value {
        Some(secs) if secs > 0 => Ok(secs),
        Some(_) => Err(AuthExchangeError::Malformed("expires_in is zero".into())),
        None => Err(AuthExchangeError::Malformed("missing expires_in".into())),
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push_str("...");
    }
    body
}

/// Drives the grant for one OAuth client against one identity provider.
pub struct OAuthFlow {
    auth_url: String,
    token_url: String,
    scope: String,
    client_id: String,
    client_secret: Secret<String>,
    http: reqwest::Client,
}

impl OAuthFlow {
    pub fn new(settings: &OAuthSettings, client: ClientSecret) -> Result<Self, AuthExchangeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            auth_url: settings.auth_url.clone(),
            token_url: settings.token_url.clone(),
            scope: settings.scope(),
            client_id: client.client_id,
            client_secret: client.client_secret,
            http,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Consent URL for this client with the configured scopes.
    pub fn authorization_url(&self, redirect_uri: &str) -> Result<Url, AuthExchangeError> {
        build_authorization_url(&self.auth_url, &self.client_id, redirect_uri, &self.scope)
    }

    /// Trade an authorization code for an access/refresh token pair.
    ///
    /// The response must carry both tokens: without a refresh token the
    /// stored credential would be unusable once the access token expires.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet, AuthExchangeError> {
        if code.trim().is_empty() {
            return Err(AuthExchangeError::InvalidRequest(
                "authorization code is empty".into(),
            ));
        }

        let resp = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret().as_str()),
                ("redirect_uri", redirect_uri),
            ])
            .await?;

        let tokens = TokenSet {
            access_token: Secret::new(required(resp.access_token, "access_token")?),
            refresh_token: Secret::new(required(resp.refresh_token, "refresh_token")?),
            expires_in: required_lifetime(resp.expires_in)?,
            issued_at: now_secs(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        };
        info!(
            client_id = %tokens.client_id,
            expires_in = tokens.expires_in,
            "exchanged authorization code for tokens"
        );
        Ok(tokens)
    }

    /// Obtain a new access token with the stored refresh token.
    ///
    /// Uses the client identity recorded in `tokens`, not this flow's, so a
    /// credential keeps working after the secrets file is rotated. The
    /// refresh token is kept unless the provider issues a new one.
    pub async fn refresh(&self, tokens: &TokenSet) -> Result<TokenSet, AuthExchangeError> {
        debug!(client_id = %tokens.client_id, "refreshing access token");
        let resp = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", tokens.refresh()),
                ("client_id", tokens.client_id.as_str()),
                ("client_secret", tokens.client_secret.expose_secret().as_str()),
            ])
            .await?;

        let rotated = resp.refresh_token.filter(|t| !t.is_empty());
        if rotated.is_some() {
            info!("identity provider rotated the refresh token");
        }

        Ok(TokenSet {
            access_token: Secret::new(required(resp.access_token, "access_token")?),
            refresh_token: rotated.map_or_else(|| tokens.refresh_token.clone(), Secret::new),
            expires_in: required_lifetime(resp.expires_in)?,
            issued_at: now_secs(),
            client_id: tokens.client_id.clone(),
            client_secret: tokens.client_secret.clone(),
        })
    }

    /// Return `tokens` unchanged while they are still valid at `now`,
    /// otherwise refresh them. The flag reports whether a refresh happened
    /// (and the result therefore needs persisting).
    pub async fn ensure_fresh(
        &self,
        tokens: TokenSet,
        now: u64,
    ) -> Result<(TokenSet, bool), AuthExchangeError> {
        if !tokens.is_expired(now) {
            return Ok((tokens, false));
        }
        let refreshed = self.refresh(&tokens).await?;
        Ok((refreshed, true))
    }

    async fn request_token(
        &self,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, AuthExchangeError> {
        let resp = self.http.post(&self.token_url).form(form).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "token endpoint rejected request");
            return Err(AuthExchangeError::Status {
                status: status.as_u16(),
                body: truncate(body),
            });
        }

        serde_json::from_str(&body).map_err(|e| AuthExchangeError::Malformed(e.to_string()))
    }
}
