use serde::Deserialize;

/// `POST /api/generate` 请求体。字段缺失在 handler 中统一返回 400。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    TranslateChapter,
    TranslateTitle,
    GenerateAnexo,
    SuggestTitle,
    /// 未识别的任务：以原始 JSON 形式进入 prompt，而不是报错。
    Other(String),
}

impl Task {
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "translate_chapter" => Self::TranslateChapter,
            "translate_title" => Self::TranslateTitle,
            "generate_anexo" => Self::GenerateAnexo,
            "suggest_title" => Self::SuggestTitle,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::TranslateChapter => "translate_chapter",
            Self::TranslateTitle => "translate_title",
            Self::GenerateAnexo => "generate_anexo",
            Self::SuggestTitle => "suggest_title",
            Self::Other(name) => name,
        }
    }

    /// generate_anexo 要求上游以 JSON 对象输出。
    pub fn wants_json_object(&self) -> bool {
        matches!(self, Self::GenerateAnexo)
    }
}
