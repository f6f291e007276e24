//! HTTP collaborators for the assistant backend.
//!
//! [`HttpApiClient`] implements both the send and the download collaborator of
//! `scenechat-session`, so one client instance serves a whole chat session.

mod client;
mod config;
mod error;
mod wire;

pub use client::HttpApiClient;
pub use config::{ApiConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use error::{ApiError, ApiResult};
