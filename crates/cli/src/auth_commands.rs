use {
    anyhow::{Context, Result},
    clap::Subcommand,
    prophet_config::ProphetConfig,
    prophet_oauth::{CredentialState, CredentialStore, now_secs, open_store},
};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Show whether the server holds a usable credential.
    Status,
    /// Forget the stored credential; the next page visit re-runs consent.
    Reset,
}

pub async fn handle_auth(action: AuthAction, config: &ProphetConfig) -> Result<()> {
    match action {
        AuthAction::Status => status(config).await,
        AuthAction::Reset => reset(config).await,
    }
}

async fn status(config: &ProphetConfig) -> Result<()> {
    println!("{}", describe(config).await?);
    Ok(())
}

async fn describe(config: &ProphetConfig) -> Result<String> {
    let store = open_store(&config.storage)
        .await
        .context("failed to open credential store")?;
    let tokens = store.load().await.context("failed to read credential")?;
    let state = CredentialState::of(tokens.as_ref(), now_secs());
    let client = tokens
        .as_ref()
        .map(|t| format!(", client {}", t.client_id))
        .unwrap_or_default();
    Ok(format!(
        "{state} [{:?} store at {}{client}]",
        config.storage.backend,
        config.storage.resolved_path().display()
    ))
}

async fn reset(config: &ProphetConfig) -> Result<()> {
    let store = open_store(&config.storage)
        .await
        .context("failed to open credential store")?;
    store.clear().await.context("failed to clear credential")?;
    println!("Credential cleared. Visit the site to authorize again.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use {super::*, prophet_config::StorageBackend};

    fn file_config(dir: &tempfile::TempDir) -> ProphetConfig {
        let mut config = ProphetConfig::default();
        config.storage.backend = StorageBackend::File;
        config.storage.path = Some(dir.path().join("credentials.json"));
        config
    }

    #[tokio::test]
    async fn status_on_empty_store_is_unauthorized() {
        let dir = tempfile::tempdir().unwrap();
        let line = describe(&file_config(&dir)).await.unwrap();
        assert!(line.starts_with("unauthorized [File store at "));
    }

    #[tokio::test]
    async fn reset_removes_stored_record() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);
        std::fs::write(
            dir.path().join("credentials.json"),
            r#"{"Credentials/Credentials": {
                "accessToken": "AT1", "refreshToken": "RT1", "expiresIn": 3600,
                "issuedAt": 1, "clientId": "abc", "clientSecret": "xyz"
            }}"#,
        )
        .unwrap();

        assert!(describe(&config).await.unwrap().starts_with("expired"));
        reset(&config).await.unwrap();
        assert!(describe(&config).await.unwrap().starts_with("unauthorized"));
    }
}
