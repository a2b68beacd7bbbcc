//! Backend client
//!
//! Thin wrapper over `reqwest`: one method per endpoint, JSON in and out,
//! non-success statuses mapped to [`ClientError`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use sitedesk_core::{
    Credentials, Dashboard, Project, PurgeNotifier, SessionToken, SignUpRequest, Task, TaskDraft,
    TaskUpdate, UserIdentity,
};
use uuid::Uuid;
use tracing::{debug, info};

use crate::error::{ClientError, Result};
use crate::query::TaskQuery;

/// Backend connection settings
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL, e.g. `http://localhost:8001`
    pub base_url: String,
    /// Per-request timeout (default: 30 seconds)
    pub timeout: Duration,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Deserialize)]
struct CategoriesResponse {
    categories: Vec<String>,
}

#[derive(Deserialize)]
struct TradesResponse {
    trades: Vec<String>,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

/// Client for the Sitedesk REST API
#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    http: HttpClient,
    token: Option<SessionToken>,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidUrl(config.base_url));
        }

        let http = HttpClient::builder().timeout(config.timeout).build()?;

        Ok(Self {
            base_url,
            http,
            token: None,
        })
    }

    /// Copy of this client that authenticates as `identity`
    pub fn authenticated(&self, identity: &UserIdentity) -> Self {
        let mut client = self.clone();
        client.token = (!identity.token.is_empty()).then(|| identity.token.clone());
        client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_auth(&self, request: RequestBuilder, token: Option<&SessionToken>) -> RequestBuilder {
        match token.or(self.token.as_ref()) {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        }
    }

    /// Authenticated request to `path`
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!("{} {}", method, path);
        self.with_auth(self.http.request(method, self.url(path)), None)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let request = self.request(Method::GET, path).query(query);
        let response = check(request.send().await?, false).await?;
        decode(response).await
    }

    /// Exchange credentials for an identity
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<UserIdentity> {
        debug!("POST /api/auth/signin for {}", credentials.email);
        let response = self
            .http
            .post(self.url("/api/auth/signin"))
            .json(credentials)
            .send()
            .await?;
        let identity: UserIdentity = decode(check(response, true).await?).await?;
        info!("Signed in as {}", identity.email);
        Ok(identity)
    }

    /// Create an account and receive its identity
    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<UserIdentity> {
        debug!("POST /api/auth/signup for {}", request.email);
        let response = self
            .http
            .post(self.url("/api/auth/signup"))
            .json(request)
            .send()
            .await?;
        let identity: UserIdentity = decode(check(response, true).await?).await?;
        info!("Signed up as {}", identity.email);
        Ok(identity)
    }

    /// Ask the backend to drop server-side session data. The body is ignored.
    pub async fn purge_session(&self, identity: &UserIdentity) -> Result<()> {
        debug!("POST /api/session/purge for {}", identity.user_id);
        let token = (!identity.token.is_empty()).then_some(&identity.token);
        let request = self.with_auth(
            self.http
                .post(self.url("/api/session/purge"))
                .json(&json!({ "user_id": identity.user_id })),
            token,
        );
        check(request.send().await?, false).await?;
        Ok(())
    }

    pub async fn health(&self) -> Result<String> {
        let health: HealthResponse = self.get_json("/api/health", &[]).await?;
        Ok(health.status)
    }

    pub async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>> {
        self.get_json("/api/tasks", &query.to_pairs()).await
    }

    pub async fn create_task(&self, draft: &TaskDraft) -> Result<Task> {
        let request = self.request(Method::POST, "/api/tasks").json(draft);
        let task: Task = decode(check(request.send().await?, false).await?).await?;
        info!("Created task {}", task.id);
        Ok(task)
    }

    /// Change the fields set in `update`; returns the stored task
    pub async fn update_task(&self, id: Uuid, update: &TaskUpdate) -> Result<Task> {
        let path = format!("/api/tasks/{}", id);
        let request = self.request(Method::PUT, &path).json(update);
        let task = decode(check(request.send().await?, false).await?).await?;
        info!("Updated task {}", id);
        Ok(task)
    }

    pub async fn delete_task(&self, id: Uuid) -> Result<()> {
        let path = format!("/api/tasks/{}", id);
        check(self.request(Method::DELETE, &path).send().await?, false).await?;
        info!("Deleted task {}", id);
        Ok(())
    }

    /// Flip between completed and to-do; returns the stored task
    pub async fn toggle_complete(&self, id: Uuid) -> Result<Task> {
        let path = format!("/api/tasks/{}/complete", id);
        let request = self.request(Method::PATCH, &path);
        let task: Task = decode(check(request.send().await?, false).await?).await?;
        info!("Task {} is now {}", id, task.status);
        Ok(task)
    }

    pub async fn dashboard(&self) -> Result<Dashboard> {
        self.get_json("/api/dashboard", &[]).await
    }

    pub async fn categories(&self) -> Result<Vec<String>> {
        let response: CategoriesResponse = self.get_json("/api/categories", &[]).await?;
        Ok(response.categories)
    }

    pub async fn trades(&self) -> Result<Vec<String>> {
        let response: TradesResponse = self.get_json("/api/trades", &[]).await?;
        Ok(response.trades)
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.get_json("/api/projects", &[]).await
    }
}

#[async_trait]
impl PurgeNotifier for BackendClient {
    async fn notify_purge(&self, identity: &UserIdentity) -> sitedesk_core::Result<()> {
        self.purge_session(identity)
            .await
            .map_err(|e| sitedesk_core::Error::Notify(e.to_string()))
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Map non-success statuses to errors. With `auth`, client errors are
/// credential rejections.
async fn check(response: Response, auth: bool) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_detail(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });

    if auth && is_rejection_status(status) {
        return Err(ClientError::Rejected(message));
    }

    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

fn is_rejection_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST
            | StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::CONFLICT
            | StatusCode::UNPROCESSABLE_ENTITY
    )
}

/// Pull a readable reason out of an error body
fn error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let value: serde_json::Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(_) => return Some(trimmed.to_string()),
    };

    let detail = value.get("detail").or_else(|| value.get("message"))?;
    match detail {
        serde_json::Value::String(s) => Some(s.clone()),
        // validation errors: a list of {loc, msg, ...}
        serde_json::Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_url() {
        assert!(matches!(
            BackendClient::new(BackendConfig::new("localhost:8001")),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = BackendClient::new(BackendConfig::new("http://localhost:8001/")).unwrap();
        assert_eq!(client.url("/api/tasks"), "http://localhost:8001/api/tasks");
    }

    #[test]
    fn test_error_detail_forms() {
        assert_eq!(
            error_detail(r#"{"detail": "Invalid email or password"}"#).as_deref(),
            Some("Invalid email or password")
        );
        assert_eq!(
            error_detail(r#"{"detail": [{"loc": ["body", "email"], "msg": "field required"}]}"#)
                .as_deref(),
            Some("field required")
        );
        assert_eq!(error_detail("upstream down").as_deref(), Some("upstream down"));
        assert_eq!(error_detail("   "), None);
        assert_eq!(error_detail(r#"{"other": 1}"#), None);
    }
}
