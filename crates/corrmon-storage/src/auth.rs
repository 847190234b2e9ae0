use crate::error::{Result, StorageError};
use base64::{engine::general_purpose, Engine as _};
use rand::Rng;

/// 生成一个 32 字节的加密安全随机 token（base64 编码）
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    general_purpose::STANDARD.encode(token_bytes)
}

/// 使用 bcrypt 对密码进行哈希
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| StorageError::Other(format!("bcrypt hash failed: {e}")))
}

/// 验证密码是否匹配哈希值
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash)
        .map_err(|e| StorageError::Other(format!("bcrypt verify failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_differ() {
        let token1 = generate_token();
        let token2 = generate_token();
        assert_ne!(token1, token2);
        assert!(token1.len() > 40); // Base64 encoded 32 bytes
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("changeme").unwrap();
        assert!(verify_password("changeme", &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }
}
