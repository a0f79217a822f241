//! HTTP inference backend.
//!
//! Posts `{"message", "model", "parameters"}` to a single prediction
//! endpoint. `parameters` is the model's parameter map encoded as a JSON
//! string; the endpoint answers `{"value": ...}`.

use std::time::Duration;

use async_trait::async_trait;
use docscore_core::config::InferenceSecrets;
use docscore_core::{Extraction, ModelProvider};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::response::{NOT_AVAILABLE, parse_response, raw_value};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}")]
    Server { status: u16, body: String },
    #[error("response body is not JSON: {source}")]
    Body {
        body: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid header `{0}`")]
    InvalidHeader(String),
}

impl InferenceError {
    /// Raw response text to keep alongside the failure.
    fn raw(&self) -> String {
        match self {
            Self::Server { body, .. } | Self::Body { body, .. } if !body.is_empty() => body.clone(),
            _ => NOT_AVAILABLE.to_string(),
        }
    }
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    message: &'a str,
    model: &'a str,
    parameters: &'a str,
}

/// One model served by the inference endpoint.
pub struct InferenceClient {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
    model: String,
    parameters: String,
}

impl InferenceClient {
    pub fn new(
        secrets: &InferenceSecrets,
        model: &str,
        parameters: &Map<String, Value>,
    ) -> Result<Self, InferenceError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &secrets.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| InferenceError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| InferenceError::InvalidHeader(name.to_string()))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: secrets.url.clone(),
            headers,
            model: model.to_string(),
            parameters: Value::Object(parameters.clone()).to_string(),
        })
    }

    async fn send(&self, text: &str) -> Result<Value, InferenceError> {
        let request = PredictRequest {
            message: text,
            model: &self.model,
            parameters: &self.parameters,
        };

        debug!(model = %self.model, chars = text.len(), "sending prediction request");
        let resp = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .json(&request)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(InferenceError::Server {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|source| InferenceError::Body { body, source })
    }
}

#[async_trait]
impl ModelProvider for InferenceClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn predict(&self, text: &str) -> Extraction {
        let body = match self.send(text).await {
            Ok(body) => body,
            Err(err) => {
                warn!(model = %self.model, error = %err, "inference request failed");
                return Extraction::failure(err.to_string(), err.raw());
            }
        };

        match parse_response(&body) {
            Ok(record) => record.into(),
            Err(err) => {
                warn!(model = %self.model, error = %err, "unusable model response");
                Extraction::failure(err.to_string(), raw_value(&body))
            }
        }
    }
}
