//! HTTP client for a running taskr server, plus the on-disk session
//! store that stands in for the browser storage a web frontend would
//! use.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::db::{
    AuthResponse, CreateTodoRequest, SigninRequest, SignupRequest, Todo, UpdateProfileRequest,
    UpdateTodoRequest, UserResponse,
};

/// Response envelope every endpoint wraps its payload in
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    #[allow(dead_code)]
    status_code: u16,
    message: String,
    data: T,
}

/// Bearer session persisted between invocations.
///
/// Stored under the platform config directory rather than the server's
/// data dir; the client may run on a different machine entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub expires_at: String,
}

impl StoredSession {
    fn path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("Could not determine the user config directory")?;
        Ok(dir.join("taskr").join("session.toml"))
    }

    pub fn load() -> Result<Option<Self>> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read session file: {}", path.display()))?;
        let session = toml::from_str(&content).context("Failed to parse session file")?;
        Ok(Some(session))
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string(self).context("Failed to serialize session")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write session file: {}", path.display()))?;
        Ok(())
    }

    pub fn clear() -> Result<()> {
        let path = Self::path()?;
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove session file: {}", path.display()))?;
        }
        Ok(())
    }

    /// A session only counts as signed-in while unexpired; the mere
    /// presence of a token is not enough.
    pub fn is_valid(&self) -> bool {
        match chrono::DateTime::parse_from_rfc3339(&self.expires_at) {
            Ok(expires) => expires.with_timezone(&chrono::Utc) > chrono::Utc::now(),
            Err(_) => false,
        }
    }
}

/// Typed client for the taskr REST API
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = token {
            headers.insert(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", token)
                    .parse()
                    .context("Invalid token format")?,
            );
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Unwrap the envelope, turning error responses into readable errors
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<Envelope<serde_json::Value>>()
                .await
                .map(|envelope| envelope.message)
                .unwrap_or_else(|_| format!("Server returned error {}", status));
            bail!("{}", message);
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .context("Failed to parse server response")?;
        Ok(envelope.data)
    }

    pub async fn signup(&self, req: &SignupRequest) -> Result<AuthResponse> {
        let url = format!("{}/api/v1/auth/signup", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(req)
            .send()
            .await
            .context("Failed to connect to server. Is taskr running?")?;
        Self::decode(response).await
    }

    pub async fn signin(&self, req: &SigninRequest) -> Result<AuthResponse> {
        let url = format!("{}/api/v1/auth/signin", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(req)
            .send()
            .await
            .context("Failed to connect to server. Is taskr running?")?;
        Self::decode(response).await
    }

    pub async fn list_todos(&self) -> Result<Vec<Todo>> {
        let url = format!("{}/api/v1/todos", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to connect to server. Is taskr running?")?;
        Self::decode(response).await
    }

    pub async fn create_todo(&self, req: &CreateTodoRequest) -> Result<Todo> {
        let url = format!("{}/api/v1/todos", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(req)
            .send()
            .await
            .context("Failed to connect to server. Is taskr running?")?;
        Self::decode(response).await
    }

    pub async fn update_todo(&self, id: &str, req: &UpdateTodoRequest) -> Result<Todo> {
        let url = format!("{}/api/v1/todos/{}", self.base_url, id);
        let response = self
            .http
            .patch(&url)
            .json(req)
            .send()
            .await
            .context("Failed to connect to server. Is taskr running?")?;
        Self::decode(response).await
    }

    pub async fn delete_todo(&self, id: &str) -> Result<()> {
        let url = format!("{}/api/v1/todos/{}", self.base_url, id);
        let response = self
            .http
            .delete(&url)
            .send()
            .await
            .context("Failed to connect to server. Is taskr running?")?;
        let _: serde_json::Value = Self::decode(response).await?;
        Ok(())
    }

    pub async fn update_profile(&self, req: &UpdateProfileRequest) -> Result<UserResponse> {
        let url = format!("{}/api/v1/profile", self.base_url);
        let response = self
            .http
            .patch(&url)
            .json(req)
            .send()
            .await
            .context("Failed to connect to server. Is taskr running?")?;
        Self::decode(response).await
    }
}
