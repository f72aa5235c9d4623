use figment::Figment;
use figment::providers::Env;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 10000;
const DEFAULT_TIMEOUT_MS: u64 = 60_000;

pub const DEFAULT_GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL_ID: &str = "llama3-8b-8192";
pub const DEFAULT_IMAGE_ENDPOINT: &str = "https://image.pollinations.ai/prompt/";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,

    /// 原始的逗号分隔 key 列表，由 KeyPool::from_raw 解析。
    pub api_keys: String,
    pub api_url: String,
    pub model_id: String,
    pub timeout_ms: u64,
    pub proxy: String,

    pub image_endpoint: String,

    pub debug: String,
    /// LOG_FORMAT=json 时输出结构化 JSON 日志。
    pub log_json: bool,

    /// 加载阶段发现的问题；tracing 尚未初始化，由 main 在初始化后输出。
    pub warnings: Vec<String>,
}

/// 环境变量的原始值；每个字段单独提取，单个字段格式错误不影响其余字段。
#[derive(Debug, Default)]
struct RawEnv {
    host: Option<String>,
    port: Option<u16>,

    groq_api_key: Option<String>,
    groq_api_keys: Option<String>,
    groq_api_url: Option<String>,
    model_id: Option<String>,
    timeout: Option<u64>,
    proxy: Option<String>,

    image_endpoint: Option<String>,

    debug: Option<String>,
    log_format: Option<String>,
}

impl RawEnv {
    /// Env::raw() 的 key 已转为小写。
    fn extract(figment: &Figment, warnings: &mut Vec<String>) -> Self {
        Self {
            host: lenient(figment, "host", warnings),
            port: lenient(figment, "port", warnings),
            groq_api_key: lenient(figment, "groq_api_key", warnings),
            groq_api_keys: lenient(figment, "groq_api_keys", warnings),
            groq_api_url: lenient(figment, "groq_api_url", warnings),
            model_id: lenient(figment, "model_id", warnings),
            timeout: lenient(figment, "timeout", warnings),
            proxy: lenient(figment, "proxy", warnings),
            image_endpoint: lenient(figment, "image_endpoint", warnings),
            debug: lenient(figment, "debug", warnings),
            log_format: lenient(figment, "log_format", warnings),
        }
    }
}

/// 缺失返回 None；格式错误记录一条告警后同样返回 None（使用默认值）。
fn lenient<T: DeserializeOwned>(
    figment: &Figment,
    key: &str,
    warnings: &mut Vec<String>,
) -> Option<T> {
    match figment.extract_inner::<T>(key) {
        Ok(v) => Some(v),
        Err(e) if e.missing() => None,
        Err(e) => {
            warnings.push(format!("环境变量 {} 无法解析，已忽略: {e}", key.to_uppercase()));
            None
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            api_keys: String::new(),
            api_url: DEFAULT_GROQ_API_URL.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            proxy: String::new(),
            image_endpoint: DEFAULT_IMAGE_ENDPOINT.to_string(),
            debug: "off".to_string(),
            log_json: false,
            warnings: Vec::new(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        load_dotenv();

        let mut warnings = Vec::new();
        let raw = RawEnv::extract(&Figment::from(Env::raw()), &mut warnings);

        let mut cfg = Self::from_raw(raw);
        cfg.warnings = warnings;

        // 命令行覆盖：-debug <level>
        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            if arg == "-debug"
                && let Some(v) = args.next()
            {
                cfg.debug = v;
            }
        }

        cfg
    }

    fn from_raw(raw: RawEnv) -> Self {
        let defaults = Self::default();

        // GROQ_API_KEY 优先；GROQ_API_KEYS 仅作为别名兜底。
        let api_keys = raw
            .groq_api_key
            .filter(|v| !v.trim().is_empty())
            .or(raw.groq_api_keys)
            .unwrap_or_default();

        Self {
            host: non_empty_or(raw.host, defaults.host),
            port: raw.port.unwrap_or(defaults.port),
            api_keys,
            api_url: non_empty_or(raw.groq_api_url, defaults.api_url),
            model_id: non_empty_or(raw.model_id, defaults.model_id),
            timeout_ms: raw.timeout.unwrap_or(defaults.timeout_ms),
            proxy: raw.proxy.unwrap_or_default(),
            image_endpoint: non_empty_or(raw.image_endpoint, defaults.image_endpoint),
            debug: raw.debug.unwrap_or(defaults.debug),
            log_json: raw
                .log_format
                .is_some_and(|f| f.trim().eq_ignore_ascii_case("json")),
            warnings: Vec::new(),
        }
    }

    pub fn log_level(&self) -> crate::logging::LogLevel {
        crate::logging::LogLevel::parse(&self.debug)
    }
}

fn non_empty_or(value: Option<String>, default: String) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default,
    }
}

fn load_dotenv() {
    let Some(dotenv_path) = find_dotenv_path() else {
        return;
    };

    let Ok(file) = std::fs::File::open(&dotenv_path) else {
        return;
    };

    let reader = std::io::BufReader::new(file);
    for line in std::io::BufRead::lines(reader).map_while(Result::ok) {
        let Some((key, value)) = parse_dotenv_line(&line) else {
            continue;
        };
        // 已由真实环境变量提供的值优先，不被 .env 覆盖。
        if std::env::var_os(&key).is_some() {
            continue;
        }
        // Rust 2024：set_var 为 unsafe。此处在启动阶段、尚未启动任何线程时调用。
        unsafe {
            std::env::set_var(key, value);
        }
    }
}

fn find_dotenv_path() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    let mut dir: &Path = cwd.as_path();

    loop {
        let candidate = dir.join(".env");
        if candidate.is_file() {
            return Some(candidate);
        }

        // 不跨越仓库根目录：发现 Cargo.toml 或 .git 即停止向上寻找。
        if dir.join("Cargo.toml").is_file() || dir.join(".git").is_dir() {
            return None;
        }

        let parent = dir.parent()?;
        if parent == dir {
            break;
        }
        dir = parent;
    }

    None
}

/// 只支持 `KEY=value` 与整行 `#` 注释；值两侧成对的引号会被去掉。
fn parse_dotenv_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }

    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let value = value.trim();
    let value = ['"', '\'']
        .into_iter()
        .find_map(|q| value.strip_prefix(q)?.strip_suffix(q))
        .unwrap_or(value);
    Some((key.to_string(), value.to_string()))
}
