//! Transport abstraction.
//!
//! The engine never speaks a wire protocol itself. A [`Transport`] performs one
//! request and honours a cooperative [`CancellationToken`]; the engine decides
//! whether an outcome was a cancellation by inspecting the token, never by the
//! error the transport returns.


use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::Method;
use crate::Metadata;
use crate::QueryFailure;
use crate::QueryRequest;
use crate::TransportConfig;
use crate::TransportError;

/// One request as handed to the transport
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    /// `base_url` joined with the request path
    pub url: String,
    pub method: Method,
    /// Query string parameters, in key order
    pub params: Vec<(String, String)>,
    /// Default headers overlaid with per-request headers
    pub headers: Metadata,
    pub body: Option<Vec<u8>>,
}

impl TransportRequest {
    pub fn compose(
        config: &TransportConfig,
        request: &QueryRequest,
    ) -> Self {
        let mut headers = config.default_headers.clone();
        headers.extend(request.headers.clone());

        let url = match (config.base_url.trim_end_matches('/'), request.path.as_str()) {
            ("", path) => path.to_string(),
            (base, path) if path.starts_with('/') => format!("{base}{path}"),
            (base, path) => format!("{base}/{path}"),
        };

        Self {
            url,
            method: request.method,
            params: request.params.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            headers,
            body: request.body.as_ref().map(|b| b.to_string().into_bytes()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Metadata,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            headers: Metadata::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Failure describing a non-2xx response
    pub(crate) fn status_failure(&self) -> QueryFailure {
        let detail = String::from_utf8_lossy(&self.body);
        let message = if detail.trim().is_empty() {
            format!("request failed with status {}", self.status)
        } else {
            detail.trim().to_string()
        };
        QueryFailure::with_status(message, self.status)
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Performs one request.
    ///
    /// Implementations should stop work promptly once `cancel` fires. What they
    /// return afterwards is ignored: the engine classifies the outcome as a
    /// cancellation from the token state alone.
    ///
    /// # Errors
    /// Network level failures. Non-2xx statuses are returned as `Ok` responses
    /// and classified by the engine.
    async fn request(
        &self,
        request: TransportRequest,
        cancel: CancellationToken,
    ) -> std::result::Result<TransportResponse, TransportError>;
}

/// Turns a successful response into a typed payload.
///
/// This is where collaborators plug in schema validation: an `Err` is recorded
/// on the query exactly like a transport failure.
pub type Decoder<T> =
    Arc<dyn Fn(&TransportResponse) -> std::result::Result<T, String> + Send + Sync>;

/// Decodes the body as JSON
pub fn json_decoder<T: DeserializeOwned>() -> Decoder<T> {
    Arc::new(|response: &TransportResponse| {
        serde_json::from_slice(&response.body).map_err(|e| format!("invalid response payload: {e}"))
    })
}

/// Decodes the body as JSON, then runs `validate` on the decoded value
pub fn validated_json_decoder<T, F>(validate: F) -> Decoder<T>
where
    T: DeserializeOwned,
    F: Fn(&T) -> std::result::Result<(), String> + Send + Sync + 'static,
{
    Arc::new(move |response: &TransportResponse| {
        let value: T = serde_json::from_slice(&response.body)
            .map_err(|e| format!("invalid response payload: {e}"))?;
        validate(&value)?;
        Ok(value)
    })
}
