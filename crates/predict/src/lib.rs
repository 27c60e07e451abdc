//! Feature-vector construction and the authenticated call to the remote
//! prediction service.

pub mod client;
pub mod error;
pub mod request;

pub use {
    client::PredictionClient,
    error::PredictionError,
    request::{PredictionRequest, build_feature_vector},
};
