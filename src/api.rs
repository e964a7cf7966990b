use crate::config::AppConfig;
use crate::error::ApiError;
use crate::utils::find_char_boundary;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const CHAT_PATH: &str = "/api/chat";
pub const UPDATE_DATA_PATH: &str = "/api/update-data";
pub const VIEW_DATA_PATH: &str = "/api/data/view";

/// Environment variable carrying the host page's login cookie.
pub const SESSION_COOKIE_ENV: &str = "AGRO_SESSION_COOKIE";

// ── Request / Response types ────────────────────────────────────────────

/// Body of a `POST /api/chat` request.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatRequest {
    pub message: String,
}

/// One agricultural statistic as served by the backend.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AgriRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub crop: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    pub year: i32,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl AgriRecord {
    /// Production rows are measured in tonnes.
    pub fn is_production(&self) -> bool {
        self.unit
            .as_deref()
            .is_some_and(|u| u.eq_ignore_ascii_case("tonnes"))
    }

    /// Market price rows carry a `KES` unit (`KES`, `KES_per_kg`, `KES/kg`, ...).
    pub fn is_price(&self) -> bool {
        self.unit
            .as_deref()
            .and_then(|u| u.get(..3))
            .is_some_and(|p| p.eq_ignore_ascii_case("KES"))
    }

    /// Crop and value, when the row has both.
    pub fn crop_value(&self) -> Option<(&str, f64)> {
        Some((self.crop.as_deref()?, self.value?))
    }
}

/// `GET /api/update-data` payload.
#[derive(Deserialize, Clone, Debug)]
pub struct UpdateResponse {
    pub success: bool,
    #[serde(default)]
    pub records_updated: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub latest_data: Vec<AgriRecord>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub pages: u32,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub has_prev: bool,
}

/// `GET /api/data/view` payload.
#[derive(Deserialize, Clone, Debug)]
pub struct DataPage {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<AgriRecord>,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub message: Option<String>,
}

// ── Backend seams ───────────────────────────────────────────────────────

/// Generates chatbot replies.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send_chat(&self, request: &ChatRequest) -> Result<String, ApiError>;
}

/// Serves agricultural statistics to the dashboard.
#[async_trait]
pub trait DataBackend: Send + Sync {
    async fn update_data(&self) -> Result<UpdateResponse, ApiError>;
    async fn view_data(&self, page: u32) -> Result<DataPage, ApiError>;
}

// ── HTTP client ─────────────────────────────────────────────────────────

/// Thin reqwest wrapper bound to one backend origin.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client from config. The session cookie, if any, is read from
    /// `AGRO_SESSION_COOKIE`.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let cookie = std::env::var(SESSION_COOKIE_ENV).ok().filter(|c| !c.is_empty());
        Self::with_cookie(&config.base_url, cookie.as_deref(), config.request_timeout_secs)
    }

    pub fn with_cookie(base_url: &str, cookie: Option<&str>, timeout_secs: Option<u64>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(cookie) = cookie {
            headers.insert(
                COOKIE,
                HeaderValue::from_str(cookie).context("Invalid session cookie format")?,
            );
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Read a response body as JSON. Non-2xx statuses become `Status`, with the
    /// server's `error`/`message` field when the body carries one.
    async fn read_json(&self, url: &str, resp: reqwest::Response) -> Result<Value, ApiError> {
        let status = resp.status();
        let text = resp.text().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: server_message(&text),
            });
        }

        serde_json::from_str(&text).map_err(|e| ApiError::Malformed {
            detail: format!(
                "{} ({}); body: {}",
                e,
                status_label(status),
                &text[..find_char_boundary(&text, 200)]
            ),
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let url = self.url(path);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;
        self.read_json(&url, resp).await
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn send_chat(&self, request: &ChatRequest) -> Result<String, ApiError> {
        let url = self.url(CHAT_PATH);
        let resp = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        let body = self.read_json(&url, resp).await?;
        body.get("response")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ApiError::Malformed {
                detail: "missing `response` field".to_string(),
            })
    }
}

#[async_trait]
impl DataBackend for ApiClient {
    async fn update_data(&self) -> Result<UpdateResponse, ApiError> {
        let body = self.get_json(UPDATE_DATA_PATH, &[]).await?;
        let parsed: UpdateResponse = decode(body)?;
        if !parsed.success {
            return Err(ApiError::Rejected {
                message: parsed.message,
            });
        }
        Ok(parsed)
    }

    async fn view_data(&self, page: u32) -> Result<DataPage, ApiError> {
        let body = self
            .get_json(VIEW_DATA_PATH, &[("page", page.to_string())])
            .await?;
        let parsed: DataPage = decode(body)?;
        if !parsed.success {
            return Err(ApiError::Rejected {
                message: parsed.message,
            });
        }
        Ok(parsed)
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::Malformed {
        detail: e.to_string(),
    })
}

/// Pull a human-readable message out of an error body, if it is JSON.
fn server_message(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn status_label(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(|r| format!("{} {}", status.as_u16(), r))
        .unwrap_or_else(|| status.as_u16().to_string())
}
