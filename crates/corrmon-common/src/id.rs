use snowflake::SnowflakeIdBucket;
use std::sync::Mutex;

static ID_GENERATOR: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

/// 初始化 Snowflake ID 生成器（machine_id / node_id 各占 0-31）。
///
/// 未显式初始化时，`next_id` 会退回 (1, 1) 的默认生成器。
pub fn init(machine_id: i32, node_id: i32) {
    let mut gen = ID_GENERATOR.lock().unwrap();
    *gen = Some(SnowflakeIdBucket::new(machine_id, node_id));
}

/// 生成一个字符串形式的 Snowflake ID。
pub fn next_id() -> String {
    let mut gen = ID_GENERATOR.lock().unwrap();
    let bucket = gen.get_or_insert_with(|| SnowflakeIdBucket::new(1, 1));
    bucket.get_id().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_and_numeric() {
        init(2, 3);
        let mut seen = HashSet::new();
        for _ in 0..500 {
            let id = next_id();
            assert!(id.parse::<i64>().is_ok(), "ID should be numeric: {}", id);
            assert!(seen.insert(id), "Duplicate ID generated");
        }
    }

    #[test]
    fn works_without_explicit_init() {
        let id = next_id();
        assert!(!id.is_empty());
    }
}
