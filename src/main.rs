pub mod config;
pub mod credential;
pub mod error;
pub mod gateway;
pub mod groq;
pub mod logging;
pub mod util;

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::Config::load();

    init_tracing(&cfg);
    for warning in &cfg.warnings {
        tracing::warn!("{warning}");
    }

    // key 池在启动时解析一次，之后只有轮换游标会变化。
    let pool = Arc::new(credential::KeyPool::from_raw(&cfg.api_keys));
    if pool.is_empty() {
        tracing::warn!("未配置 GROQ_API_KEY：所有生成请求都将返回配置错误");
    } else {
        tracing::info!("已加载 {} 个 API key", pool.len());
    }

    let client = groq::client::GroqClient::new(&cfg).context("初始化 GroqClient 失败")?;

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], cfg.port)));

    tracing::info!(model = %cfg.model_id, upstream = %cfg.api_url, "上游配置");

    let state = Arc::new(gateway::AppState {
        cfg,
        dispatcher: gateway::common::dispatch::Dispatcher::new(pool, client),
    });
    let app = gateway::router(state);

    tracing::info!("Server listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("绑定监听端口失败")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务异常退出")?;

    Ok(())
}

fn init_tracing(cfg: &config::Config) {
    // 依赖库默认只输出 warn；本项目自身日志至少为 info，避免 RUST_LOG=warn 把调度日志过滤掉。
    let env = std::env::var("RUST_LOG").unwrap_or_default();
    let env = env.trim();
    let filter = if env.is_empty() {
        EnvFilter::new("warn,quillrelay=info")
    } else if env.contains("quillrelay") {
        EnvFilter::new(env)
    } else {
        EnvFilter::new(format!("{env},quillrelay=info"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    let _ = if cfg.log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("收到退出信号，准备关闭服务...");
}
