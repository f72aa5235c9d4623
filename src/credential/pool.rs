use std::sync::atomic::{AtomicUsize, Ordering};

/// 进程级 key 池：成员在初始化后不可变，只有轮换游标会变化。
///
/// 游标为所有并发请求共享：某个 key 被限流后轮换，其他在途请求随即看到新的 key。
/// 并发轮换可能“丢失”一次推进（两个请求同时从 2 轮换，最终停在 3 而非 4），
/// 这只影响后续请求先尝试哪个 key，不影响结果正确性；但游标本身的读改写必须是原子的。
#[derive(Debug)]
pub struct KeyPool {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl KeyPool {
    /// 解析逗号分隔的 key 列表：逐项 trim，丢弃空项。
    pub fn from_raw(raw: &str) -> Self {
        let keys = raw
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(keys)
    }

    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// 当前 key 及其下标；池为空时返回 None。
    pub fn current(&self) -> Option<(usize, &str)> {
        if self.keys.is_empty() {
            return None;
        }
        let idx = self.current_index() % self.keys.len();
        Some((idx, self.keys[idx].as_str()))
    }

    /// 游标前进一位（循环），返回新的下标。空池为 no-op。
    pub fn rotate(&self) -> usize {
        let len = self.keys.len();
        if len == 0 {
            return 0;
        }
        let prev = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i + 1) % len))
            .unwrap_or_else(|i| i);
        (prev + 1) % len
    }

    /// 日志用的脱敏形式，例如 `gsk_…wxyz`。
    pub fn masked(&self, idx: usize) -> String {
        self.keys.get(idx).map(|k| mask_key(k)).unwrap_or_default()
    }
}

pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}
