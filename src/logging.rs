use axum::http::HeaderMap;
use sonic_rs::prelude::*;
use std::time::Duration;

/// 详细日志等级（DEBUG 环境变量）：
/// - off：不输出请求/响应详情
/// - low：输出客户端请求/响应（格式化/脱敏）
/// - medium：输出客户端 + 上游请求/响应（格式化/脱敏）
/// - high：输出客户端 + 上游请求/响应（原始报文，仅 Authorization 脱敏）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl LogLevel {
    pub fn parse(debug: &str) -> Self {
        match debug.trim().to_lowercase().as_str() {
            "low" | "client" => Self::Low,
            "medium" | "backend" => Self::Medium,
            "high" | "all" | "raw" => Self::High,
            _ => Self::Off,
        }
    }

    pub fn client_enabled(self) -> bool {
        self >= Self::Low
    }

    pub fn backend_enabled(self) -> bool {
        self >= Self::Medium
    }

    pub fn raw_enabled(self) -> bool {
        self >= Self::High
    }
}

pub fn format_duration_ms(d: Duration) -> i64 {
    d.as_millis().min(i64::MAX as u128) as i64
}

pub fn client_request(level: LogLevel, method: &str, path: &str, headers: &HeaderMap, body: &[u8]) {
    if !level.client_enabled() {
        return;
    }
    if level.raw_enabled() {
        tracing::info!(
            "\n================== 客户端请求（RAW） ==================\n[客户端请求] {method} {path}\n[客户端请求头]\n{}\n[客户端请求体]\n{}\n=========================================================",
            format_headers_raw(headers),
            String::from_utf8_lossy(body),
        );
    } else {
        tracing::info!(
            "\n===================== 客户端请求 ======================\n[客户端请求] {method} {path}\n[客户端请求头]\n{}\n{}\n=========================================================",
            format_headers(headers),
            format_body_bytes(body)
        );
    }
}

pub fn client_response(level: LogLevel, status: u16, duration: Duration, body: &[u8]) {
    if !level.client_enabled() {
        return;
    }
    let body = if level.raw_enabled() {
        String::from_utf8_lossy(body).into_owned()
    } else {
        format_body_bytes(body)
    };
    tracing::info!(
        "\n===================== 客户端响应 ======================\n[客户端响应] {} {}ms\n{}\n==========================================================",
        status,
        format_duration_ms(duration),
        body
    );
}

pub fn backend_request(level: LogLevel, method: &str, url: &str, headers: &HeaderMap, body: &[u8]) {
    if !level.backend_enabled() {
        return;
    }
    let (headers, body) = if level.raw_enabled() {
        (
            format_headers_raw(headers),
            String::from_utf8_lossy(body).into_owned(),
        )
    } else {
        (format_headers(headers), format_body_bytes(body))
    };
    tracing::info!(
        "\n====================== 上游请求 ========================\n[上游请求] {method} {url}\n[上游请求头]\n{}\n{}\n==========================================================",
        headers,
        body
    );
}

pub fn backend_response(level: LogLevel, status: u16, duration: Duration, body: &[u8]) {
    if !level.backend_enabled() {
        return;
    }
    let body = if level.raw_enabled() {
        String::from_utf8_lossy(body).into_owned()
    } else {
        format_body_bytes(body)
    };
    tracing::info!(
        "\n====================== 上游响应 ========================\n[上游响应] {} {}ms\n{}\n==========================================================",
        status,
        format_duration_ms(duration),
        body
    );
}

fn is_secret_header(name: &str) -> bool {
    let name = name.to_lowercase();
    name == "authorization" || name == "proxy-authorization" || name == "cookie"
}

fn format_headers(headers: &HeaderMap) -> String {
    let mut obj = sonic_rs::Object::new();

    for (name, value) in headers.iter() {
        let key = name.as_str();
        let v = if is_secret_header(key) {
            sonic_rs::Value::from("Bearer ***")
        } else {
            match value.to_str() {
                Ok(s) => sonic_rs::Value::from(s),
                Err(_) => sonic_rs::Value::from("<binary>"),
            }
        };

        // HeaderMap 可能存在同名多值，统一用数组输出。
        if let Some(existing) = obj.get(&key).and_then(|v| v.as_array()) {
            let mut arr = existing.to_vec();
            arr.push(v);
            obj.insert(key, arr);
        } else {
            obj.insert(key, vec![v]);
        }
    }

    sonic_rs::to_string_pretty(&obj.into_value()).unwrap_or_default()
}

fn format_headers_raw(headers: &HeaderMap) -> String {
    let mut out = String::new();
    for (name, value) in headers.iter() {
        let key = name.as_str();
        out.push_str(key);
        out.push_str(": ");
        if is_secret_header(key) {
            out.push_str("***");
        } else {
            out.push_str(value.to_str().unwrap_or("<non-utf8>"));
        }
        out.push('\n');
    }
    out
}

fn format_body_bytes(bytes: &[u8]) -> String {
    // 超大报文不做 JSON 解析，只输出首尾片段。
    const MAX_PARSE_BYTES: usize = 256 * 1024;
    const HEAD_TAIL: usize = 8 * 1024;

    if bytes.is_empty() {
        return String::new();
    }

    if bytes.len() > MAX_PARSE_BYTES {
        let head = &bytes[..HEAD_TAIL];
        let tail = &bytes[bytes.len() - HEAD_TAIL..];
        return format!(
            "(报文过大: {} 字节，仅显示首尾)\n--- head ---\n{}\n--- tail ---\n{}",
            bytes.len(),
            truncate_text_for_log(&String::from_utf8_lossy(head)),
            truncate_text_for_log(&String::from_utf8_lossy(tail))
        );
    }

    match sonic_rs::from_slice::<sonic_rs::Value>(bytes) {
        Ok(v) => {
            let v = truncate_json_strings(&v);
            sonic_rs::to_string_pretty(&v).unwrap_or_else(|_| v.to_string())
        }
        Err(_) => truncate_text_for_log(&String::from_utf8_lossy(bytes)),
    }
}

/// 章节正文可能很长：递归截断 JSON 中的长字符串，避免刷屏。
fn truncate_json_strings(v: &sonic_rs::Value) -> sonic_rs::Value {
    if let Some(obj) = v.as_object() {
        let mut out = sonic_rs::Object::new();
        for (key, child) in obj.iter() {
            out.insert(key, truncate_json_strings(child));
        }
        return out.into_value();
    }

    if let Some(arr) = v.as_array() {
        let out: Vec<sonic_rs::Value> = arr.iter().map(truncate_json_strings).collect();
        return sonic_rs::Value::from(out);
    }

    if let Some(s) = v.as_str() {
        return sonic_rs::Value::from(truncate_text_for_log(s).as_str());
    }

    v.to_owned()
}

fn truncate_text_for_log(s: &str) -> String {
    const MAX_CHARS: usize = 4 * 1024;
    if s.chars().count() <= MAX_CHARS {
        return s.to_string();
    }
    let mut out: String = s.chars().take(MAX_CHARS).collect();
    out.push_str("...[TRUNCATED]");
    out
}
