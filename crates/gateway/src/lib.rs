//! Gateway: the browser-facing HTTP server.
//!
//! Lifecycle:
//! 1. Load config and the static documents (client secret, model catalog)
//! 2. Open the credential store and build the OAuth flow
//! 3. Serve the model page, the OAuth callback and the prediction relay
//!
//! The OAuth credential is shared by every visitor; see
//! [`prophet_oauth::CredentialManager`].

pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use {
    error::AppError,
    server::{build_app, start_gateway},
    state::AppState,
};
