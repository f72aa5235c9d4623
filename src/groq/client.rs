use crate::config::Config;
use crate::gateway::common::dispatch::ChatBackend;
use crate::groq::types::{ChatRequest, ChatResponse};
use crate::logging::{self, LogLevel};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use std::time::{Duration, Instant};
use thiserror::Error;

const CLIENT_USER_AGENT: &str = concat!("quillrelay/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("上游 API 错误 {status}: {message}")]
    Http {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("上游请求失败: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("上游响应解析失败: {0}")]
    Json(#[from] sonic_rs::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 错误体中的 `error.code`（例如 `rate_limit_exceeded`）。
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Http { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroqClient {
    http: reqwest::Client,
    api_url: String,
    log_level: LogLevel,
}

impl GroqClient {
    pub fn new(cfg: &Config) -> Result<Self, anyhow::Error> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90));

        if cfg.timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(cfg.timeout_ms));
        }

        if !cfg.proxy.trim().is_empty() {
            builder = builder.proxy(reqwest::Proxy::all(cfg.proxy.trim())?);
        }

        Ok(Self {
            http: builder.build()?,
            api_url: cfg.api_url.clone(),
            log_level: cfg.log_level(),
        })
    }

    pub fn build_headers(&self, api_key: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        h.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .unwrap_or(HeaderValue::from_static("")),
        );
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        h
    }

    /// 单次 chat completion 调用，不做任何重试；重试与 key 轮换由调度器负责。
    pub async fn create_chat_completion(
        &self,
        api_key: &str,
        req: &ChatRequest,
    ) -> Result<ChatResponse, ApiError> {
        let body = sonic_rs::to_vec(req)?;
        let headers = self.build_headers(api_key);
        logging::backend_request(self.log_level, "POST", &self.api_url, &headers, &body);

        let start = Instant::now();
        let resp = self
            .http
            .post(&self.api_url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = resp.status();

        if !status.is_success() {
            // 状态行已到达：错误体读取失败（超时/断开）时仍按状态码归类，429 不能被当作传输错误。
            let bytes = match resp.bytes().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(status = status.as_u16(), "读取上游错误体失败: {e}");
                    Default::default()
                }
            };
            logging::backend_response(self.log_level, status.as_u16(), start.elapsed(), &bytes);
            return Err(extract_error_details(status.as_u16(), &bytes));
        }

        let bytes = resp.bytes().await?;
        logging::backend_response(self.log_level, status.as_u16(), start.elapsed(), &bytes);
        Ok(sonic_rs::from_slice::<ChatResponse>(&bytes)?)
    }
}

impl ChatBackend for GroqClient {
    async fn chat_completion(
        &self,
        api_key: &str,
        req: &ChatRequest,
    ) -> Result<ChatResponse, ApiError> {
        self.create_chat_completion(api_key, req).await
    }
}

/// 把 OpenAI 风格的错误体 `{"error":{"message","type","code"}}` 归一化为 ApiError::Http。
/// 错误体无法解析时，以原始文本作为 message。
fn extract_error_details(status: u16, body: &[u8]) -> ApiError {
    #[derive(Debug, serde::Deserialize)]
    struct ErrResp {
        error: ErrInner,
    }

    #[derive(Debug, serde::Deserialize)]
    struct ErrInner {
        #[serde(default)]
        message: String,
        #[serde(default)]
        code: Option<sonic_rs::Value>,
    }

    let mut message = String::new();
    let mut code = None;

    if let Ok(err_resp) = sonic_rs::from_slice::<ErrResp>(body) {
        message = err_resp.error.message;
        code = err_resp.error.code.and_then(|c| {
            use sonic_rs::JsonValueTrait;
            if let Some(s) = c.as_str() {
                Some(s.trim().to_string())
            } else {
                c.as_i64().map(|i| i.to_string())
            }
        });
    }

    if message.trim().is_empty() {
        let text = String::from_utf8_lossy(body);
        let text = text.trim();
        message = if text.is_empty() {
            "Unknown error".to_string()
        } else {
            text.chars().take(512).collect()
        };
    }

    ApiError::Http {
        status,
        code: code.filter(|c| !c.is_empty()),
        message,
    }
}
