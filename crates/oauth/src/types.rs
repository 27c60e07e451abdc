use std::time::{SystemTime, UNIX_EPOCH};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize, Serializer},
};

/// Identity under which the single shared credential is stored
/// (kind, name). There is exactly one record for the whole service.
pub const CREDENTIAL_KEY: (&str, &str) = ("Credentials", "Credentials");

/// Serialize a `Secret<String>` by exposing it. Only used when persisting.
pub fn serialize_secret<S: Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Seconds since the Unix epoch.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Tokens obtained from the authorization code grant, plus the client
/// identity needed to refresh them.
///
/// `expires_in` counts from `issued_at`. Records written before `issued_at`
/// existed load with `issued_at = 0` and therefore read as expired.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSet {
    #[serde(serialize_with = "serialize_secret")]
    pub access_token: Secret<String>,
    #[serde(serialize_with = "serialize_secret")]
    pub refresh_token: Secret<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub issued_at: u64,
    pub client_id: String,
    #[serde(serialize_with = "serialize_secret")]
    pub client_secret: Secret<String>,
}

impl TokenSet {
    /// Absolute expiry in unix seconds.
    pub fn expires_at(&self) -> u64 {
        self.issued_at.saturating_add(self.expires_in)
    }

    /// Seconds of validity left at `now`; zero or negative once expired.
    pub fn remaining(&self, now: u64) -> i64 {
        let expires_at = i64::try_from(self.expires_at()).unwrap_or(i64::MAX);
        let now = i64::try_from(now).unwrap_or(i64::MAX);
        expires_at.saturating_sub(now)
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.remaining(now) <= 0
    }

    pub fn state(&self, now: u64) -> CredentialState {
        let remaining = self.remaining(now);
        if remaining <= 0 {
            CredentialState::Expired
        } else {
            CredentialState::Valid {
                remaining_secs: remaining.unsigned_abs(),
            }
        }
    }

    pub fn access(&self) -> &str {
        self.access_token.expose_secret()
    }

    pub fn refresh(&self) -> &str {
        self.refresh_token.expose_secret()
    }
}

impl PartialEq for TokenSet {
    fn eq(&self, other: &Self) -> bool {
        self.access() == other.access()
            && self.refresh() == other.refresh()
            && self.expires_in == other.expires_in
            && self.issued_at == other.issued_at
            && self.client_id == other.client_id
            && self.client_secret.expose_secret() == other.client_secret.expose_secret()
    }
}

impl Eq for TokenSet {}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("issued_at", &self.issued_at)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Where the shared credential stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum CredentialState {
    /// No code exchange has completed yet.
    Unauthorized,
    Valid { remaining_secs: u64 },
    /// Will be refreshed on the next protected call.
    Expired,
}

impl CredentialState {
    pub fn of(tokens: Option<&TokenSet>, now: u64) -> Self {
        tokens.map_or(Self::Unauthorized, |t| t.state(now))
    }
}

impl std::fmt::Display for CredentialState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized => f.write_str("unauthorized"),
            Self::Valid { remaining_secs } => {
                let hours = remaining_secs / 3600;
                let mins = (remaining_secs % 3600) / 60;
                write!(f, "valid ({hours}h {mins}m remaining)")
            },
            Self::Expired => f.write_str("expired"),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_tokens(issued_at: u64, expires_in: u64) -> TokenSet {
    TokenSet {
        access_token: Secret::new("AT1".into()),
        refresh_token: Secret::new("RT1".into()),
        expires_in,
        issued_at,
        client_id: "abc".into(),
        client_secret: Secret::new("xyz".into()),
    }
}
