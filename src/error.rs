use crate::gateway::common::dispatch::DispatchError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

// 面向前端的提示文案（前端为西班牙语界面）。
pub const MSG_NO_CREDENTIALS: &str = "La API Key de Groq no está configurada en el servidor.";
pub const MSG_EXHAUSTED: &str =
    "Todas las API Keys de Groq han alcanzado su límite de uso. Inténtalo de nuevo más tarde.";
pub const MSG_UPSTREAM_PREFIX: &str = "Error en la API de Groq";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("参数错误: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Dispatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回给客户端的文案：不暴露使用了哪个 key、轮换了几次。
    pub fn client_message(&self) -> String {
        match self {
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Dispatch(DispatchError::NoCredentials) => MSG_NO_CREDENTIALS.to_string(),
            AppError::Dispatch(DispatchError::Exhausted { .. }) => MSG_EXHAUSTED.to_string(),
            AppError::Dispatch(DispatchError::Upstream(e)) => match e.status() {
                Some(status) => format!("{MSG_UPSTREAM_PREFIX}: {status} - {}", upstream_detail(e)),
                None => format!("{MSG_UPSTREAM_PREFIX}: {e}"),
            },
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            message: self.client_message(),
        }
    }
}

fn upstream_detail(e: &crate::groq::client::ApiError) -> String {
    match e {
        crate::groq::client::ApiError::Http { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
