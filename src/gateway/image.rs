//! `POST /api/image`：只拼装第三方图片生成地址，不调用上游，也不参与 key 轮换。

use crate::error::AppError;
use crate::gateway::AppState;
use crate::gateway::generate::respond;
use crate::logging;
use crate::util::id;
use axum::body::Bytes;
use axum::extract::{OriginalUri, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

const MSG_MISSING_PROMPT: &str = "Falta el campo 'prompt'.";

#[derive(Debug, Default, Deserialize)]
struct ImageRequest {
    #[serde(default)]
    prompt: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    image_url: String,
}

pub async fn handle_image(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let log_level = state.cfg.log_level();
    logging::client_request(log_level, method.as_str(), uri.0.path(), &headers, &body);

    let prompt = serde_json::from_slice::<ImageRequest>(&body)
        .ok()
        .and_then(|r| r.prompt)
        .filter(|p| !p.trim().is_empty());

    let Some(prompt) = prompt else {
        let err = AppError::bad_request(MSG_MISSING_PROMPT);
        let body = serde_json::to_value(err.body()).unwrap_or_default();
        return respond(log_level, start, err.status(), body);
    };

    let out = ImageResponse {
        image_url: build_image_url(&state.cfg.image_endpoint, prompt.trim(), id::image_seed()),
    };
    let body = serde_json::to_value(out).unwrap_or_default();
    respond(log_level, start, StatusCode::OK, body)
}

fn build_image_url(endpoint: &str, prompt: &str, seed: u64) -> String {
    format!(
        "{endpoint}{}?seed={seed}&nologo=true",
        urlencoding::encode(prompt)
    )
}
