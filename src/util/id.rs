use uuid::Uuid;

pub fn request_id() -> String {
    format!("req-{}", Uuid::new_v4().simple())
}

/// 图片生成 URL 的随机种子，范围 [0, 1e9)。
pub fn image_seed() -> u64 {
    random_u64() % 1_000_000_000
}

fn random_u64() -> u64 {
    // 复用 UUID v4 的随机源，避免额外引入 rand 依赖。
    let b = *Uuid::new_v4().as_bytes();
    u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_seed_is_bounded() {
        for _ in 0..100 {
            assert!(image_seed() < 1_000_000_000);
        }
    }

    #[test]
    fn request_id_is_prefixed_and_unique() {
        let a = request_id();
        let b = request_id();
        assert!(a.starts_with("req-"));
        assert_ne!(a, b);
    }
}
