//! `reqwest`-backed [`ExternalCaller`] for `GET`/`POST` actions.
//!
//! Grounded in `http.go`'s `HTTPReq`: the body is JSON-encoded for `POST`,
//! the request id is forwarded as a `request-id` header for idempotency,
//! and the response is decoded as a flat string-to-string JSON map.

use std::collections::HashMap;

use async_trait::async_trait;

use super::{ExternalCaller, ExternalError};

pub struct HttpCaller {
    client: reqwest::Client,
}

impl HttpCaller {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpCaller {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExternalCaller for HttpCaller {
    async fn call(
        &self,
        url: &str,
        method: &str,
        request_id: &str,
        body: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>, ExternalError> {
        let response = match method.to_ascii_uppercase().as_str() {
            "GET" => self
                .client
                .get(url)
                .header("request-id", request_id)
                .send()
                .await
                .map_err(|e| ExternalError::Remote(e.to_string()))?,
            "POST" => self
                .client
                .post(url)
                .header("request-id", request_id)
                .header("content-type", "application/json")
                .json(body)
                .send()
                .await
                .map_err(|e| ExternalError::Remote(e.to_string()))?,
            other => return Err(ExternalError::InvalidHttpMethod(other.to_string())),
        };

        if !response.status().is_success() {
            return Err(ExternalError::Remote(format!(
                "remote returned status {}",
                response.status()
            )));
        }

        response
            .json::<HashMap<String, String>>()
            .await
            .map_err(|e| ExternalError::Remote(e.to_string()))
    }
}
