//! Calling out to the external services that back each vertex's forward
//! action and compensator, behind the [`ExternalCaller`] trait.
//!
//! Grounded in the original coordinator's `HTTPReq` dispatcher
//! (`examples/original_source/http.go`), which switches on the action's
//! HTTP method string (`LOCAL`/`GET`/`POST`) and always returns a flat
//! string-to-string response map.

pub mod http;
pub mod local;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

/// Errors an [`ExternalCaller`] can report. The executor folds every one of
/// these into the vertex's status rather than propagating them — see
/// `executor`.
#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("unsupported HTTP method: {0}")]
    InvalidHttpMethod(String),

    #[error("local test request missing a \"success\" field in its body")]
    InvalidLocalRequest,

    #[error("external call rejected: {0}")]
    Remote(String),

    #[error("external call timed out")]
    Timeout,
}

/// Dispatches one forward or compensating action to whatever backs it.
#[async_trait]
pub trait ExternalCaller: Send + Sync {
    async fn call(
        &self,
        url: &str,
        method: &str,
        request_id: &str,
        body: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>, ExternalError>;
}
