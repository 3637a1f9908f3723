//! HTTP transport for the onboarding API.
//!
//! [`ApiClient`] owns the reqwest client, the tenant endpoint and the API
//! token. It adds authentication and request-correlation headers to every
//! call and turns non-success responses into structured [`ApiError`]s.

use crate::config::{ApiEndpoint, ConfigError};
use crate::error::{ApiError, ApiResult};
use onboarding_auth::ApiToken;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Authenticated client for the onboarding API.
#[derive(Clone)]
pub struct ApiClient {
    /// HTTP client instance.
    client: Client,

    /// Tenant endpoint.
    endpoint: ApiEndpoint,

    /// Bearer credential.
    token: ApiToken,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token)
            .finish()
    }
}

impl ApiClient {
    /// Create a new API client.
    pub fn new(
        endpoint: ApiEndpoint,
        token: ApiToken,
        timeout: Duration,
        verify_tls: bool,
    ) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            token,
        })
    }

    /// The endpoint this client talks to.
    pub fn endpoint(&self) -> &ApiEndpoint {
        &self.endpoint
    }

    /// GET a JSON resource.
    pub async fn get<T>(&self, path: &str) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self.request(Method::GET, path).send().await?;
        handle_response(response).await
    }

    /// GET a JSON resource with query parameters.
    pub async fn get_query<T, Q>(&self, path: &str, query: &Q) -> ApiResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let response = self.request(Method::GET, path).query(query).send().await?;
        handle_response(response).await
    }

    /// POST a JSON body and parse the JSON answer.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.request(Method::POST, path).json(body).send().await?;
        handle_response(response).await
    }

    /// POST a JSON body, ignoring any answer body.
    pub async fn post_empty<B>(&self, path: &str, body: &B) -> ApiResult<()>
    where
        B: Serialize + ?Sized,
    {
        let response = self.request(Method::POST, path).json(body).send().await?;
        handle_empty_response(response).await
    }

    /// DELETE a resource.
    pub async fn delete(&self, path: &str) -> ApiResult<()> {
        let response = self.request(Method::DELETE, path).send().await?;
        handle_empty_response(response).await
    }

    /// DELETE with a JSON body.
    pub async fn delete_with_body<B>(&self, path: &str, body: &B) -> ApiResult<()>
    where
        B: Serialize + ?Sized,
    {
        let response = self.request(Method::DELETE, path).json(body).send().await?;
        handle_empty_response(response).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.endpoint.url(path);
        let request_id = Uuid::now_v7().to_string();
        debug!(%method, %url, request_id = %request_id, "Sending onboarding API request");

        self.client
            .request(method, &url)
            .header("Authorization", self.token.authorization_header())
            .header(REQUEST_ID_HEADER, request_id)
    }
}

/// Handle API response and parse JSON.
async fn handle_response<T>(response: Response) -> ApiResult<T>
where
    T: DeserializeOwned,
{
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;

    serde_json::from_slice(&bytes).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}

async fn handle_empty_response(response: Response) -> ApiResult<()> {
    check_status(response).await.map(|_| ())
}

async fn check_status(response: Response) -> ApiResult<Response> {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED {
        error!("Onboarding API authentication failed");
        return Err(ApiError::Unauthorized);
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let (code, message) = parse_error_body(status, &body);
        warn!(
            status = status.as_u16(),
            code = code.as_deref().unwrap_or(""),
            "Onboarding API error: {}",
            message
        );
        return Err(ApiError::Api {
            status: status.as_u16(),
            code,
            message,
        });
    }

    Ok(response)
}

/// Extract the application code and message from an error body.
///
/// Accepts `{"code", "message"}` at the top level or nested under `error`.
/// Non-JSON bodies become the message verbatim; empty bodies fall back to the
/// status reason.
pub(crate) fn parse_error_body(status: StatusCode, body: &str) -> (Option<String>, String) {
    let fallback = || {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        } else {
            trimmed.to_string()
        }
    };

    let Ok(Value::Object(root)) = serde_json::from_str::<Value>(body) else {
        return (None, fallback());
    };

    let fields = match root.get("error") {
        Some(Value::Object(nested)) => nested,
        _ => &root,
    };

    let code = match fields.get("code").or_else(|| fields.get("errorCode")) {
        Some(Value::String(code)) => Some(code.clone()),
        Some(Value::Number(code)) => Some(code.to_string()),
        _ => None,
    };

    let message = fields
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| root.get("error").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(fallback);

    (code, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_error_body() {
        let (code, message) = parse_error_body(
            StatusCode::CONFLICT,
            r#"{"code": "SCAN_IN_PROGRESS", "message": "a scan is already running"}"#,
        );
        assert_eq!(code.as_deref(), Some("SCAN_IN_PROGRESS"));
        assert_eq!(message, "a scan is already running");
    }

    #[test]
    fn test_parse_nested_error_body() {
        let (code, message) = parse_error_body(
            StatusCode::BAD_REQUEST,
            r#"{"error": {"code": 4007, "message": "must keep at least one service"}}"#,
        );
        assert_eq!(code.as_deref(), Some("4007"));
        assert_eq!(message, "must keep at least one service");
    }

    #[test]
    fn test_parse_string_error_body() {
        let (code, message) =
            parse_error_body(StatusCode::NOT_FOUND, r#"{"error": "account not found"}"#);
        assert_eq!(code, None);
        assert_eq!(message, "account not found");
    }

    #[test]
    fn test_parse_plain_and_empty_bodies() {
        let (code, message) = parse_error_body(StatusCode::BAD_GATEWAY, "upstream down\n");
        assert_eq!(code, None);
        assert_eq!(message, "upstream down");

        let (_, message) = parse_error_body(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(message, "Service Unavailable");
    }

    #[test]
    fn test_client_creation() {
        let token = ApiToken::parse("svc_test").unwrap();
        let client = ApiClient::new(
            ApiEndpoint::new("http://localhost:8080"),
            token,
            Duration::from_secs(30),
            true,
        )
        .unwrap();
        assert_eq!(client.endpoint().base_url, "http://localhost:8080");
        assert!(!format!("{:?}", client).contains("svc_test"));
    }
}
