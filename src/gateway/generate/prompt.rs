use super::types::Task;
use crate::groq::types::{ChatMessage, ChatRequest, ResponseFormat};
use serde_json::Value;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant for a novelist.";

const TRANSLATE_SYSTEM_PROMPT: &str = "You are a professional translator. Translate the user's text to the target language, maintaining the original tone and genre. Only output the translated text.";

const ANEXO_SYSTEM_PROMPT: &str = "You are a creative writer. Describe a character or location for a novel based on the user's request. Provide a description for 'appearance' and 'motivation' in a JSON object format like {\"appearance\": \"...\", \"motivation\": \"...\"}.";

const SUGGEST_TITLE_SYSTEM_PROMPT: &str = "You are an expert book editor. Suggest one single, creative, and fitting chapter title based on the context provided. Only output the title itself, without any quotation marks or extra text.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn into_request(self, model: &str, task: &Task) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            messages: vec![ChatMessage::system(self.system), ChatMessage::user(self.user)],
            response_format: task
                .wants_json_object()
                .then(ResponseFormat::json_object),
        }
    }
}

pub fn build(task: &Task, payload: &Value) -> Prompt {
    match task {
        Task::TranslateChapter | Task::TranslateTitle => {
            let text_key = if *task == Task::TranslateTitle {
                "title"
            } else {
                "content"
            };
            Prompt {
                system: TRANSLATE_SYSTEM_PROMPT.to_string(),
                user: format!(
                    "Translate the following text to {}.\nGenre: {}.\nText: \"{}\"",
                    field(payload, "targetLanguage"),
                    field(payload, "genre"),
                    field(payload, text_key),
                ),
            }
        }
        Task::GenerateAnexo => Prompt {
            system: ANEXO_SYSTEM_PROMPT.to_string(),
            user: format!(
                "Novel Genre: {}.\nName: \"{}\".\nType: {}.",
                field(payload, "novelGenre"),
                field(payload, "name"),
                field(payload, "type"),
            ),
        },
        Task::SuggestTitle => Prompt {
            system: SUGGEST_TITLE_SYSTEM_PROMPT.to_string(),
            user: format!(
                "Novel Title: \"{}\".\nNovel Genre: {}.\nPrevious Chapter Content: \"{}\"",
                field(payload, "novelTitle"),
                field(payload, "novelGenre"),
                field(payload, "previousChapterContent"),
            ),
        },
        Task::Other(name) => Prompt {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            user: format!(
                "Task: {name}\nInput (JSON): {}",
                serde_json::to_string(payload).unwrap_or_default()
            ),
        },
    }
}

/// 取 payload 中的字段：字符串原样使用，其他标量转为文本，缺失/null 为空串。
fn field(payload: &Value, key: &str) -> String {
    match payload.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
