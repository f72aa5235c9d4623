use super::types::Task;
use serde_json::{Value, json};

/// 模型未按 JSON 对象输出时，`motivation` 的兜底文案。
pub const ANEXO_MOTIVATION_FALLBACK: &str = "No se pudo generar una motivación separada.";

/// 把模型输出整理为前端约定的字段。
pub fn shape(task: &Task, text: &str) -> Value {
    match task {
        Task::TranslateChapter => json!({ "translatedContent": text.trim() }),
        Task::TranslateTitle => json!({ "translatedTitle": clean_text(text) }),
        Task::SuggestTitle => json!({ "suggestedTitle": clean_text(text) }),
        Task::GenerateAnexo => match serde_json::from_str::<Value>(text) {
            Ok(v @ Value::Object(_)) => v,
            _ => json!({
                "appearance": text,
                "motivation": ANEXO_MOTIVATION_FALLBACK,
            }),
        },
        Task::Other(_) => json!({ "generatedText": text.trim() }),
    }
}

/// 去掉首尾各一个双引号并 trim（模型常把标题包在引号里）。
fn clean_text(text: &str) -> String {
    let t = text.trim();
    let t = t.strip_prefix('"').unwrap_or(t);
    let t = t.strip_suffix('"').unwrap_or(t);
    t.trim().to_string()
}
