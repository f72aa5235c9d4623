use crate::groq::client::ApiError;

/// 上游在错误体 `error.code` 中标记“配额/限流耗尽”的取值。
pub const RATE_LIMIT_CODES: [&str; 2] = ["rate_limit_exceeded", "insufficient_quota"];

/// 一次失败调用的分类结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 当前 key 被限流：轮换到下一个 key 后重试。
    QuotaExceeded,
    /// 其他任何失败：立即返回，不轮换、不重试。
    Terminal,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::QuotaExceeded => "quota_exceeded",
            Self::Terminal => "terminal",
        }
    }
}

/// 对归一化后的错误（状态码 + 可选错误码）分类。
pub fn classify(status: Option<u16>, code: Option<&str>) -> FailureKind {
    if status == Some(429) {
        return FailureKind::QuotaExceeded;
    }
    match code.map(str::trim) {
        Some(c) if RATE_LIMIT_CODES.iter().any(|m| c.eq_ignore_ascii_case(m)) => {
            FailureKind::QuotaExceeded
        }
        _ => FailureKind::Terminal,
    }
}

pub fn classify_error(err: &ApiError) -> FailureKind {
    classify(err.status(), err.code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_is_quota_regardless_of_code() {
        assert_eq!(classify(Some(429), None), FailureKind::QuotaExceeded);
        assert_eq!(
            classify(Some(429), Some("something_else")),
            FailureKind::QuotaExceeded
        );
    }

    #[test]
    fn rate_limit_code_is_quota_on_any_status() {
        assert_eq!(
            classify(Some(400), Some("rate_limit_exceeded")),
            FailureKind::QuotaExceeded
        );
        assert_eq!(
            classify(None, Some(" RATE_LIMIT_EXCEEDED ")),
            FailureKind::QuotaExceeded
        );
        assert_eq!(
            classify(Some(403), Some("insufficient_quota")),
            FailureKind::QuotaExceeded
        );
    }

    #[test]
    fn everything_else_is_terminal() {
        assert_eq!(classify(None, None), FailureKind::Terminal);
        assert_eq!(classify(Some(500), None), FailureKind::Terminal);
        assert_eq!(classify(Some(401), Some("invalid_api_key")), FailureKind::Terminal);
        assert_eq!(classify(Some(503), Some("")), FailureKind::Terminal);
    }

    #[test]
    fn classify_error_uses_status_and_code() {
        let err = ApiError::Http {
            status: 400,
            code: Some("rate_limit_exceeded".to_string()),
            message: "x".to_string(),
        };
        assert_eq!(classify_error(&err), FailureKind::QuotaExceeded);

        let err = ApiError::Http {
            status: 500,
            code: None,
            message: "x".to_string(),
        };
        assert_eq!(classify_error(&err), FailureKind::Terminal);

        let err = ApiError::Json(sonic_rs::from_str::<sonic_rs::Value>("{").unwrap_err());
        assert_eq!(classify_error(&err), FailureKind::Terminal);
    }
}
