//! HTTP client for the workflow service

use super::types::{
    ApiError, ExecuteResponse, PlanResponse, TemplateBundle, TemplateResponse, TemplatesResponse,
    ToolSchemaResponse, ToolsResponse, WorkflowApi, unwrap_envelope,
};
use crate::config::ApiConfig;
use crate::plan::{Plan, TemplateSummary, ToolSchema, ToolSummary};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

/// `WorkflowApi` over the service's JSON endpoints
#[derive(Debug, Clone)]
pub struct HttpWorkflowApi {
    /// Base URL for the API
    base_url: reqwest::Url,

    /// Bearer token (if required)
    api_key: Option<String>,

    /// Request timeout
    timeout: Duration,

    /// HTTP client
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct PlanRequest<'a> {
    goal: &'a str,
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    plan: &'a Plan,
}

impl HttpWorkflowApi {
    /// Create a client from config
    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut api = Self::new(config.base_url(), Duration::from_secs(config.timeout()))?;
        api.api_key = config.resolved_api_key();
        Ok(api)
    }

    /// Create a client with explicit parameters
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = reqwest::Url::parse(base_url)
            .map_err(|e| ApiError::config(format!("invalid base URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::config(format!("base URL '{}' cannot take a path", base_url)));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            api_key: None,
            timeout,
            client,
        })
    }

    /// Endpoint URL, each segment percent-encoded
    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::config(format!("base URL '{}' cannot take a path", self.base_url)))?
            .pop_if_empty()
            .push("workflow")
            .extend(segments);
        Ok(url)
    }

    /// Map HTTP status to ApiError
    fn map_http_error(&self, status: reqwest::StatusCode, body: &str) -> ApiError {
        let message = error_message(body).unwrap_or_else(|| body.to_string());
        match status.as_u16() {
            401 | 403 => ApiError::auth(format!("HTTP {}: {}", status, message)),
            408 | 504 => ApiError::timeout(self.timeout),
            400..=499 => ApiError::rejected(format!("HTTP {}: {}", status, message)),
            500..=599 => ApiError::network(format!("HTTP {}: {}", status, message)),
            _ => ApiError::network(format!("unexpected HTTP {}: {}", status, message)),
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let request = match self.api_key {
            Some(ref key) => request.bearer_auth(key),
            None => request,
        };

        let start = Instant::now();
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::timeout(start.elapsed())
            } else if e.is_connect() {
                ApiError::network(format!("connection failed: {}", e))
            } else {
                ApiError::network(format!("request failed: {}", e))
            }
        })?;

        let status = response.status();
        tracing::debug!(
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Workflow service responded"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.map_http_error(status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::parse(format!("failed to parse response: {}", e)))
    }

    async fn get<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T, ApiError> {
        self.send(self.client.get(self.url(path)?)).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &[&str],
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(self.client.post(self.url(path)?).json(body)).await
    }
}

/// Pull `error` or `message` out of a JSON error body
fn error_message(body: &str) -> Option<String> {
    let json = serde_json::from_str::<serde_json::Value>(body).ok()?;
    json.get("error")
        .or_else(|| json.get("message"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[async_trait]
impl WorkflowApi for HttpWorkflowApi {
    async fn plan(&self, goal: &str) -> Result<Plan, ApiError> {
        let response: PlanResponse = self.post(&["plan"], &PlanRequest { goal }).await?;
        unwrap_envelope(response.success, response.plan, response.error, "planning")
    }

    async fn load_template(&self, template_id: &str) -> Result<TemplateBundle, ApiError> {
        let response: TemplateResponse = self
            .post(&["templates", template_id], &serde_json::json!({}))
            .await?;
        TemplateBundle::try_from(response)
    }

    async fn execute(&self, plan: &Plan) -> Result<ExecuteResponse, ApiError> {
        self.post(&["execute"], &ExecuteRequest { plan }).await
    }

    async fn list_tools(&self) -> Result<Vec<ToolSummary>, ApiError> {
        let response: ToolsResponse = self.get(&["tools"]).await?;
        unwrap_envelope(response.success, response.tools, response.error, "tool catalog")
    }

    async fn tool_schema(&self, tool_id: &str) -> Result<ToolSchema, ApiError> {
        let response: ToolSchemaResponse = self.get(&["tools", tool_id]).await?;
        unwrap_envelope(response.success, response.tool, response.error, "tool schema")
    }

    async fn list_templates(&self) -> Result<Vec<TemplateSummary>, ApiError> {
        let response: TemplatesResponse = self.get(&["templates"]).await?;
        unwrap_envelope(
            response.success,
            response.templates,
            response.error,
            "template list",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> HttpWorkflowApi {
        HttpWorkflowApi::new("https://studio.example.com/api", Duration::from_secs(30)).unwrap()
    }

    #[test]
    fn test_url() {
        assert_eq!(
            api().url(&["plan"]).unwrap().as_str(),
            "https://studio.example.com/api/workflow/plan"
        );

        // With trailing slash
        let api = HttpWorkflowApi::new("https://studio.example.com/api/", Duration::from_secs(5))
            .unwrap();
        assert_eq!(
            api.url(&["tools", "image.generate"]).unwrap().as_str(),
            "https://studio.example.com/api/workflow/tools/image.generate"
        );
    }

    #[test]
    fn test_url_encodes_ids() {
        assert_eq!(
            api().url(&["templates", "a/b?c#d"]).unwrap().as_str(),
            "https://studio.example.com/api/workflow/templates/a%2Fb%3Fc%23d"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpWorkflowApi::new("not a url", Duration::from_secs(5)),
            Err(ApiError::Config { .. })
        ));
    }

    #[test]
    fn test_map_http_error() {
        let api = api();

        let err = api.map_http_error(reqwest::StatusCode::UNAUTHORIZED, "bad token");
        assert!(matches!(err, ApiError::Auth { .. }));

        let err = api.map_http_error(
            reqwest::StatusCode::PAYMENT_REQUIRED,
            r#"{"error": "insufficient credits"}"#,
        );
        assert!(matches!(err, ApiError::Rejected { .. }));
        assert!(err.to_string().contains("insufficient credits"));

        let err = api.map_http_error(reqwest::StatusCode::GATEWAY_TIMEOUT, "");
        assert!(matches!(err, ApiError::Timeout { .. }));

        let err = api.map_http_error(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "error");
        assert!(matches!(err, ApiError::Network { .. }));
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"success": false, "error": "bad goal"}"#),
            Some("bad goal".into())
        );
        assert_eq!(error_message(r#"{"message": "nope"}"#), Some("nope".into()));
        assert_eq!(error_message("plain text"), None);
    }

    #[test]
    fn test_from_config() {
        let config = ApiConfig {
            base_url: Some("https://studio.example.com/api".into()),
            api_key: Some("sk-test".into()),
            timeout: Some(45),
            ..Default::default()
        };

        let api = HttpWorkflowApi::from_config(&config).unwrap();
        assert_eq!(api.base_url.as_str(), "https://studio.example.com/api");
        assert_eq!(api.api_key, Some("sk-test".into()));
        assert_eq!(api.timeout, Duration::from_secs(45));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let api = HttpWorkflowApi::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = api.plan("generate a sunset image").await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Network { .. } | ApiError::Timeout { .. }
        ));
    }
}
