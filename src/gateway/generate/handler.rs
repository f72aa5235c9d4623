use super::prompt;
use super::response;
use super::types::{GenerateRequest, Task};
use crate::error::AppError;
use crate::gateway::AppState;
use crate::logging::{self, LogLevel};
use crate::util::id;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{OriginalUri, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

const MSG_INVALID_JSON: &str = "El cuerpo de la solicitud no es un JSON válido.";
const MSG_MISSING_FIELDS: &str = "Faltan los campos 'task' o 'payload'.";

pub async fn handle_generate(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let log_level = state.cfg.log_level();
    logging::client_request(log_level, method.as_str(), uri.0.path(), &headers, &body);

    let span = tracing::info_span!("generate", request_id = %id::request_id());
    let result = generate(&state, &body).instrument(span).await;

    match result {
        Ok(out) => respond(log_level, start, StatusCode::OK, out),
        Err(e) => {
            match &e {
                AppError::BadRequest(_) => tracing::debug!("拒绝请求: {e}"),
                _ => tracing::error!("生成失败: {e}"),
            }
            let status = e.status();
            let body = serde_json::to_value(e.body()).unwrap_or_default();
            respond(log_level, start, status, body)
        }
    }
}

async fn generate(state: &AppState, body: &[u8]) -> Result<serde_json::Value, AppError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|_| AppError::bad_request(MSG_INVALID_JSON))?;
    // 合法 JSON 但字段类型不对（如 task 为数字）按字段缺失处理。
    let req: GenerateRequest = serde_json::from_value(value).unwrap_or_default();

    let task = req.task.filter(|t| !t.trim().is_empty());
    let payload = req.payload.filter(|p| !p.is_null());
    let (Some(task), Some(payload)) = (task, payload) else {
        return Err(AppError::bad_request(MSG_MISSING_FIELDS));
    };

    let task = Task::parse(&task);
    if let Task::Other(name) = &task {
        tracing::warn!(task = %name, "未知任务，按原始 JSON 转发");
    }

    let chat = prompt::build(&task, &payload).into_request(&state.cfg.model_id, &task);
    let text = state.dispatcher.dispatch(&chat).await?;

    tracing::info!(task = task.as_str(), chars = text.chars().count(), "生成完成");
    Ok(response::shape(&task, &text))
}

pub(crate) fn respond(
    log_level: LogLevel,
    start: Instant,
    status: StatusCode,
    body: serde_json::Value,
) -> Response {
    if log_level.client_enabled()
        && let Ok(bytes) = serde_json::to_vec(&body)
    {
        logging::client_response(log_level, status.as_u16(), start.elapsed(), &bytes);
    }
    (status, Json(body)).into_response()
}
