//! The `LOCAL` pseudo-method: a caller that never leaves the process.
//!
//! Grounded directly in `http.go`'s `LOCAL` case — it exists purely so
//! tests (and the spec's own end-to-end scenarios) can drive a vertex's
//! forward/compensating outcome deterministically via a `"success"` flag
//! in the action body, without standing up a real HTTP server.

use std::collections::HashMap;

use async_trait::async_trait;

use super::{ExternalCaller, ExternalError};

#[derive(Debug, Default)]
pub struct LocalCaller;

#[async_trait]
impl ExternalCaller for LocalCaller {
    async fn call(
        &self,
        _url: &str,
        method: &str,
        _request_id: &str,
        body: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>, ExternalError> {
        if !method.eq_ignore_ascii_case("local") {
            return Err(ExternalError::InvalidHttpMethod(method.to_string()));
        }

        match body.get("success") {
            None => Err(ExternalError::InvalidLocalRequest),
            Some(val) if val == "0" => Err(ExternalError::Remote("aborted local request".into())),
            Some(_) => {
                let mut response = HashMap::new();
                response.insert("success".to_string(), "1".to_string());
                Ok(response)
            }
        }
    }
}
