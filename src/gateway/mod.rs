pub mod common;
pub mod generate;
pub mod image;

use crate::config::Config;
use crate::groq::client::GroqClient;
use axum::Router;
use axum::routing::{get, post};
use common::dispatch::Dispatcher;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// 路由共享状态：调度器内持有进程级 key 池。
#[derive(Debug)]
pub struct AppState {
    pub cfg: Config,
    pub dispatcher: Dispatcher<GroqClient>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/generate", post(generate::handle_generate))
        .route("/api/image", post(image::handle_image))
        // 前端与本服务不同源
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn handle_health() -> &'static str {
    "ok"
}
