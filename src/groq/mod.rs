//! OpenAI 兼容的 chat completions 上游（默认 Groq）。

pub mod client;
pub mod types;
