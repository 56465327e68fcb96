//! 密码哈希（bcrypt，放到阻塞线程池执行）

use crate::error::{Result, TicketingError};

/// 对明文密码做 bcrypt 哈希
pub async fn hash_password(password: &str, cost: u32) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| TicketingError::internal_with_source("password hashing task failed", e))?
        .map_err(Into::into)
}

/// 校验明文密码，哈希格式损坏时视为不匹配
pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .map_err(|e| TicketingError::internal_with_source("password verification task failed", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashes_and_verifies() {
        let hash = hash_password("pw", 4).await.unwrap();
        assert_ne!(hash, "pw");
        assert!(verify_password("pw", &hash).await.unwrap());
        assert!(!verify_password("other", &hash).await.unwrap());
        assert!(!verify_password("pw", "not-a-hash").await.unwrap());
    }
}
