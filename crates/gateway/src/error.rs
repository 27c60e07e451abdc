use {
    askama::Template,
    axum::{
        http::{StatusCode, header},
        response::{Html, IntoResponse, Response},
    },
    prophet_oauth::{AuthExchangeError, CredentialError, StorageError},
    prophet_predict::PredictionError,
    tracing::warn,
};

/// Marks an error payload on `/predict` so the browser can tell it apart
/// from the relayed JSON.
pub const ERROR_TAG: &str = "<HttpError>";
pub const ERROR_END: &str = "</HttpError>";

/// Request failure, mapped onto an HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The provider sent the browser back with `error=...`, or without a
    /// code at all.
    #[error("authorization was not granted: {0}")]
    AuthDenied(String),

    #[error(transparent)]
    Exchange(#[from] AuthExchangeError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Prediction(#[from] PredictionError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::AuthDenied(_) => StatusCode::BAD_REQUEST,
            Self::Exchange(e) | Self::Credential(CredentialError::Exchange(e)) => match e {
                AuthExchangeError::Transport(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Credential(CredentialError::NotAuthorized) => StatusCode::UNAUTHORIZED,
            Self::Storage(_) | Self::Credential(CredentialError::Storage(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
            Self::Prediction(PredictionError::MissingModel | PredictionError::UnknownModel(_)) => {
                StatusCode::BAD_REQUEST
            },
            Self::Prediction(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Whether starting the grant over could fix this.
    fn needs_reauthorization(&self) -> bool {
        matches!(
            self,
            Self::AuthDenied(_)
                | Self::Exchange(_)
                | Self::Credential(CredentialError::NotAuthorized | CredentialError::Exchange(_))
        )
    }

    /// The `/predict` rendition: status 200 with the message wrapped in
    /// [`ERROR_TAG`].
    pub fn into_tagged(self) -> Response {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            tag_error(&self.to_string()),
        )
            .into_response()
    }
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorPage<'a> {
    message: &'a str,
    reauthorize: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        let page = ErrorPage {
            message: &message,
            reauthorize: self.needs_reauthorization(),
        };
        match page.render() {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                warn!(error = %e, "failed to render error page");
                (status, message).into_response()
            },
        }
    }
}

/// Wrap `message` in the error tag unless it already is.
pub fn tag_error(message: &str) -> String {
    if message.starts_with(ERROR_TAG) {
        message.to_string()
    } else {
        format!("{ERROR_TAG}{message}{ERROR_END}")
    }
}
