//! 带 key 轮换的上游调度器。
//!
//! 每个逻辑请求最多对池中每个 key 尝试一次：
//! - 成功：返回首个 choice 的文本
//! - 限流（429 / rate_limit_exceeded）：轮换 key 后用同一请求重试
//! - 其他错误：立即返回，不轮换

use crate::credential::KeyPool;
use crate::gateway::common::retry::{FailureKind, classify_error};
use crate::groq::client::ApiError;
use crate::groq::types::{ChatRequest, ChatResponse};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// 上游 "create chat completion" 调用的抽象边界。
pub trait ChatBackend: Send + Sync {
    fn chat_completion(
        &self,
        api_key: &str,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<ChatResponse, ApiError>> + Send;
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("服务器未配置任何上游 API key")]
    NoCredentials,

    #[error("所有 API key 均已达到配额上限（本次共尝试 {attempts} 个）")]
    Exhausted { attempts: usize },

    #[error(transparent)]
    Upstream(#[from] ApiError),
}

#[derive(Debug)]
pub struct Dispatcher<B> {
    pool: Arc<KeyPool>,
    backend: B,
}

impl<B: ChatBackend> Dispatcher<B> {
    pub fn new(pool: Arc<KeyPool>, backend: B) -> Self {
        Self { pool, backend }
    }

    pub fn pool(&self) -> &KeyPool {
        &self.pool
    }

    pub async fn dispatch(&self, req: &ChatRequest) -> Result<String, DispatchError> {
        self.dispatch_from(req, 0).await
    }

    /// `retry_count` 为该逻辑请求已经完成的轮换重试次数；`retry_count >= 池大小` 时直接判定耗尽。
    pub async fn dispatch_from(
        &self,
        req: &ChatRequest,
        retry_count: usize,
    ) -> Result<String, DispatchError> {
        let pool_size = self.pool.len();
        if pool_size == 0 {
            tracing::error!("未配置任何 API key，拒绝调度");
            return Err(DispatchError::NoCredentials);
        }

        for attempt in retry_count..pool_size {
            let Some((key_index, api_key)) = self.pool.current() else {
                return Err(DispatchError::NoCredentials);
            };
            let masked = self.pool.masked(key_index);

            match self.backend.chat_completion(api_key, req).await {
                Ok(resp) => {
                    tracing::info!(
                        attempt = attempt + 1,
                        key_index,
                        key = %masked,
                        outcome = "success",
                        "上游调用成功"
                    );
                    return Ok(resp.first_content());
                }
                Err(err) => {
                    let kind = classify_error(&err);
                    match kind {
                        FailureKind::QuotaExceeded => {
                            let next_index = self.pool.rotate();
                            tracing::warn!(
                                attempt = attempt + 1,
                                key_index,
                                key = %masked,
                                next_index,
                                outcome = kind.as_str(),
                                error = %err,
                                "API key 已限流，轮换到下一个 key"
                            );
                        }
                        FailureKind::Terminal => {
                            tracing::warn!(
                                attempt = attempt + 1,
                                key_index,
                                key = %masked,
                                outcome = kind.as_str(),
                                error = %err,
                                "上游调用失败，不重试"
                            );
                            return Err(DispatchError::Upstream(err));
                        }
                    }
                }
            }
        }

        let attempts = pool_size.saturating_sub(retry_count);
        tracing::warn!(pool_size, attempts, "所有 API key 均已限流");
        Err(DispatchError::Exhausted { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groq::types::ChatMessage;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    enum Reply {
        Content(&'static str),
        NoContent,
        Quota,
        QuotaCode,
        ServerError,
        NetworkFault,
    }

    /// 按 key 预设应答，并记录每次调用使用的 key。
    #[derive(Default)]
    struct ScriptedBackend {
        replies: HashMap<String, Reply>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(replies: &[(&str, Reply)]) -> Self {
            Self {
                replies: replies
                    .iter()
                    .map(|(k, r)| (k.to_string(), r.clone()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ChatBackend for ScriptedBackend {
        async fn chat_completion(
            &self,
            api_key: &str,
            _req: &ChatRequest,
        ) -> Result<ChatResponse, ApiError> {
            self.calls.lock().unwrap().push(api_key.to_string());
            let reply = self.replies.get(api_key).cloned().unwrap_or(Reply::Quota);
            match reply {
                Reply::Content(text) => Ok(sonic_rs::from_str(&format!(
                    r#"{{"choices":[{{"message":{{"content":"{text}"}}}}]}}"#
                ))?),
                Reply::NoContent => Ok(sonic_rs::from_str(r#"{"choices":[]}"#)?),
                Reply::Quota => Err(ApiError::Http {
                    status: 429,
                    code: None,
                    message: "Too Many Requests".to_string(),
                }),
                Reply::QuotaCode => Err(ApiError::Http {
                    status: 400,
                    code: Some("rate_limit_exceeded".to_string()),
                    message: "Rate limit reached".to_string(),
                }),
                Reply::ServerError => Err(ApiError::Http {
                    status: 500,
                    code: None,
                    message: "internal".to_string(),
                }),
                Reply::NetworkFault => {
                    let err = reqwest::Client::new()
                        .get("not a url")
                        .build()
                        .unwrap_err();
                    Err(ApiError::Transport(err))
                }
            }
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "llama3-8b-8192".to_string(),
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            response_format: None,
        }
    }

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("key-{i}")).collect()
    }

    fn dispatcher(pool: Vec<String>, backend: ScriptedBackend) -> Dispatcher<ScriptedBackend> {
        Dispatcher::new(Arc::new(KeyPool::new(pool)), backend)
    }

    #[tokio::test]
    async fn always_quota_makes_one_attempt_per_key() {
        for n in 1..=6 {
            let d = dispatcher(keys(n), ScriptedBackend::default());
            let err = d.dispatch(&request()).await.unwrap_err();
            assert!(matches!(err, DispatchError::Exhausted { attempts } if attempts == n));
            assert_eq!(d.backend.calls(), keys(n));
            // 每次限流都会轮换，N 次后回到起点。
            assert_eq!(d.pool().current_index(), 0);
        }
    }

    #[tokio::test]
    async fn success_on_attempt_k_rotates_k_minus_one_times() {
        for n in 1..=5usize {
            for k in 1..=n {
                let winner = format!("key-{}", k - 1);
                let backend = ScriptedBackend::new(&[(winner.as_str(), Reply::Content("texto"))]);
                let d = dispatcher(keys(n), backend);

                let out = d.dispatch(&request()).await.unwrap();
                assert_eq!(out, "texto");
                assert_eq!(d.backend.calls().len(), k);
                assert_eq!(d.pool().current_index(), k - 1);
            }
        }
    }

    #[tokio::test]
    async fn terminal_error_on_first_attempt_never_rotates() {
        for n in 1..=4 {
            for reply in [Reply::ServerError, Reply::NetworkFault] {
                let backend = ScriptedBackend::new(&[("key-0", reply)]);
                let d = dispatcher(keys(n), backend);

                let err = d.dispatch(&request()).await.unwrap_err();
                assert!(matches!(err, DispatchError::Upstream(_)));
                assert_eq!(d.backend.calls(), vec!["key-0".to_string()]);
                assert_eq!(d.pool().current_index(), 0);
            }
        }
    }

    #[tokio::test]
    async fn empty_pool_fails_fast_without_attempts() {
        let d = dispatcher(Vec::new(), ScriptedBackend::default());
        let err = d.dispatch(&request()).await.unwrap_err();
        assert!(matches!(err, DispatchError::NoCredentials));
        assert!(d.backend.calls().is_empty());
        assert_eq!(d.pool().current_index(), 0);
    }

    #[tokio::test]
    async fn scenario_two_quota_then_success() {
        let backend = ScriptedBackend::new(&[
            ("A", Reply::Quota),
            ("B", Reply::QuotaCode),
            ("C", Reply::Content("respuesta de C")),
        ]);
        let d = dispatcher(vec!["A".into(), "B".into(), "C".into()], backend);

        let out = d.dispatch(&request()).await.unwrap();
        assert_eq!(out, "respuesta de C");
        assert_eq!(d.backend.calls(), vec!["A", "B", "C"]);
        assert_eq!(d.pool().current(), Some((2, "C")));
    }

    #[tokio::test]
    async fn scenario_single_key_quota_is_exhausted() {
        let d = dispatcher(vec!["A".into()], ScriptedBackend::default());
        let err = d.dispatch(&request()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Exhausted { attempts: 1 }));
        assert_eq!(d.backend.calls(), vec!["A"]);
        assert_eq!(d.pool().current(), Some((0, "A")));
    }

    #[tokio::test]
    async fn scenario_network_fault_keeps_current_key() {
        let backend = ScriptedBackend::new(&[("A", Reply::NetworkFault), ("B", Reply::Content("b"))]);
        let d = dispatcher(vec!["A".into(), "B".into()], backend);

        let err = d.dispatch(&request()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Upstream(ApiError::Transport(_))));
        assert_eq!(d.pool().current(), Some((0, "A")));
    }

    #[tokio::test]
    async fn empty_completion_is_a_valid_result() {
        let backend = ScriptedBackend::new(&[("A", Reply::NoContent)]);
        let d = dispatcher(vec!["A".into()], backend);
        assert_eq!(d.dispatch(&request()).await.unwrap(), "");
    }

    #[tokio::test]
    async fn dispatch_from_at_or_past_bound_is_exhausted_immediately() {
        let d = dispatcher(keys(3), ScriptedBackend::default());
        let err = d.dispatch_from(&request(), 3).await.unwrap_err();
        assert!(matches!(err, DispatchError::Exhausted { attempts: 0 }));
        assert!(d.backend.calls().is_empty());

        // 已完成 1 次重试：剩余 2 次尝试。
        let err = d.dispatch_from(&request(), 1).await.unwrap_err();
        assert!(matches!(err, DispatchError::Exhausted { attempts: 2 }));
        assert_eq!(d.backend.calls().len(), 2);
    }

    #[tokio::test]
    async fn rotation_is_visible_to_later_requests() {
        let backend = ScriptedBackend::new(&[("A", Reply::Quota), ("B", Reply::Content("b"))]);
        let d = dispatcher(vec!["A".into(), "B".into()], backend);

        assert_eq!(d.dispatch(&request()).await.unwrap(), "b");
        assert_eq!(d.dispatch(&request()).await.unwrap(), "b");
        // 第二个请求直接从 B 开始，不再尝试已限流的 A。
        assert_eq!(d.backend.calls(), vec!["A", "B", "B"]);
    }
}
