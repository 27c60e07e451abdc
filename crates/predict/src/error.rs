/// A prediction could not be produced. Relayed to the browser as-is.
#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("no model selected")]
    MissingModel,

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("prediction service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("prediction service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}
