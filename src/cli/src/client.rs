//! HTTP client for communicating with the AccessGate API server.

use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Header the server reads the acting role from.
pub const ROLE_HEADER: &str = "x-role-id";

/// Success envelope returned by the server.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// A non-success answer from the server.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message} ({code}, HTTP {status})")]
    Rejected {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("HTTP {status}: {body}")]
    Unexpected { status: StatusCode, body: String },

    #[error("API returned success but no data")]
    MissingData,
}

/// HTTP client for the AccessGate API.
pub struct ApiClient {
    client: Client,
    base_url: String,
    role_id: Option<i64>,
}

impl ApiClient {
    /// Create a new API client pointing at the given base URL, acting as `role_id`.
    pub fn new(base_url: &str, role_id: Option<i64>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            role_id,
        })
    }

    /// Return the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn role_id(&self) -> Option<i64> {
        self.role_id
    }

    fn request(&self, method: Method, path: &str) -> (String, RequestBuilder) {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.request(method, &url);
        if let Some(role_id) = self.role_id {
            builder = builder.header(ROLE_HEADER, role_id.to_string());
        }
        (url, builder)
    }

    async fn send<T: DeserializeOwned>(&self, url: &str, builder: RequestBuilder) -> Result<ApiResponse<T>> {
        let resp = builder
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let err = match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => ApiError::Rejected {
                    status,
                    code: envelope.error.code,
                    message: envelope.error.message,
                },
                Err(_) => ApiError::Unexpected { status, body },
            };
            return Err(err.into());
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    fn into_data<T>(resp: ApiResponse<T>) -> Result<T> {
        if !resp.success {
            anyhow::bail!("API reported failure without an error body");
        }
        resp.data.ok_or_else(|| ApiError::MissingData.into())
    }

    /// Perform a GET request and deserialize the response data.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let (url, builder) = self.request(Method::GET, path);
        Self::into_data(self.send(&url, builder).await?)
    }

    /// Perform a POST request with a JSON body. Returns the data and the
    /// server's message, if any.
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(T, Option<String>)> {
        let (url, builder) = self.request(Method::POST, path);
        let resp = self.send(&url, builder.json(body)).await?;
        let message = resp.message.clone();
        Ok((Self::into_data(resp)?, message))
    }

    /// Perform a POST request without a body.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let (url, builder) = self.request(Method::POST, path);
        Self::into_data(self.send(&url, builder).await?)
    }

    /// Perform a DELETE request and deserialize the response.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let (url, builder) = self.request(Method::DELETE, path);
        Self::into_data(self.send(&url, builder).await?)
    }

    /// Perform a raw GET request and return the full JSON value (for health endpoint).
    pub async fn get_raw(&self, path: &str) -> Result<serde_json::Value> {
        let (url, builder) = self.request(Method::GET, path);
        let resp = builder
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Unexpected { status, body }.into());
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("http://localhost:8080/", Some(2)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.role_id(), Some(2));
    }

    #[test]
    fn test_error_envelope_parses_server_shape() {
        let body = r#"{"success":false,"error":{"code":"FORBIDDEN","numeric_code":4001,"message":"Access denied","timestamp":"2026-01-01T00:00:00Z"}}"#;
        let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.error.code, "FORBIDDEN");
        assert_eq!(envelope.error.message, "Access denied");
    }

    #[test]
    fn test_missing_data_is_an_error() {
        let resp: ApiResponse<u32> = ApiResponse {
            success: true,
            data: None,
            message: None,
        };
        assert!(ApiClient::into_data(resp).is_err());
    }
}
