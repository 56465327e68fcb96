//! # 令牌黑名单
//!
//! 两种实现共享同一个契约：
//! - 内存：`RwLock<HashMap>` 加一个 1 Hz 的清理任务，过期条目在被清理前仍视为拉黑
//! - Redis：键为 `idm:blacklist:{sha256}`，依靠 `SET EX` 自动过期

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TicketingError};
use crate::{ldebug, linfo, logging::{LogComponent, LogStage}};

/// 拉黑原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlacklistReason {
    Revoked,
    Corrupted,
    Expired,
}

impl BlacklistReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Revoked => "token was revoked",
            Self::Corrupted => "token was previously rejected as corrupted",
            Self::Expired => "token has expired",
        }
    }
}

/// 黑名单条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub reason: BlacklistReason,
    pub added_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl BlacklistEntry {
    fn new(reason: BlacklistReason, ttl: Duration) -> Self {
        let added_at = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(3650));
        Self {
            reason,
            added_at,
            expires_at: added_at.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

/// 黑名单存储
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// 加入黑名单，已存在时覆盖
    async fn add(&self, token: &str, reason: BlacklistReason, ttl: Duration) -> Result<()>;

    async fn lookup(&self, token: &str) -> Result<Option<BlacklistEntry>>;

    async fn contains(&self, token: &str) -> Result<bool> {
        Ok(self.lookup(token).await?.is_some())
    }
}

/// 内存黑名单
#[derive(Debug, Default)]
pub struct MemoryBlacklist {
    entries: RwLock<HashMap<String, BlacklistEntry>>,
}

impl MemoryBlacklist {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 删除 `now` 之前过期的条目，返回删除数量
    pub async fn reap(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// 启动每秒一次的清理任务，`shutdown` 取消时退出
    pub fn spawn_reaper(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let blacklist = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = blacklist.reap(Utc::now()).await;
                        if removed > 0 {
                            ldebug!(
                                "system",
                                LogStage::BackgroundTask,
                                LogComponent::Blacklist,
                                "reap",
                                &format!("清理过期黑名单条目 {removed} 个")
                            );
                        }
                    }
                }
            }
            linfo!(
                "system",
                LogStage::Shutdown,
                LogComponent::Blacklist,
                "reaper_stop",
                "黑名单清理任务已停止"
            );
        })
    }
}

#[async_trait]
impl TokenBlacklist for MemoryBlacklist {
    async fn add(&self, token: &str, reason: BlacklistReason, ttl: Duration) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(token.to_string(), BlacklistEntry::new(reason, ttl));
        Ok(())
    }

    async fn lookup(&self, token: &str) -> Result<Option<BlacklistEntry>> {
        Ok(self.entries.read().await.get(token).cloned())
    }
}

/// Redis 黑名单
#[derive(Clone)]
pub struct RedisBlacklist {
    connection: ConnectionManager,
}

impl RedisBlacklist {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| TicketingError::cache_with_source("failed to create redis client", e))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| TicketingError::cache_with_source("failed to connect to redis", e))?;
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Blacklist,
            "redis_connected",
            "Redis 黑名单连接建立成功"
        );
        Ok(Self { connection })
    }

    /// 令牌本身不落盘，只存摘要
    #[must_use]
    pub fn key_for(token: &str) -> String {
        format!("idm:blacklist:{}", hex::encode(Sha256::digest(token.as_bytes())))
    }
}

#[async_trait]
impl TokenBlacklist for RedisBlacklist {
    async fn add(&self, token: &str, reason: BlacklistReason, ttl: Duration) -> Result<()> {
        let entry = BlacklistEntry::new(reason, ttl);
        let value = serde_json::to_string(&entry)?;
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(Self::key_for(token), value, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn lookup(&self, token: &str) -> Result<Option<BlacklistEntry>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(Self::key_for(token)).await?;
        value
            .map(|raw| serde_json::from_str(&raw).map_err(Into::into))
            .transpose()
    }
}

/// 配置了 `REDIS_URL` 时使用 Redis，否则使用内存实现并启动清理任务
pub async fn build_blacklist(
    redis_url: Option<&str>,
    shutdown: CancellationToken,
) -> Result<Arc<dyn TokenBlacklist>> {
    if let Some(url) = redis_url {
        return Ok(Arc::new(RedisBlacklist::connect(url).await?));
    }
    let memory = Arc::new(MemoryBlacklist::new());
    memory.spawn_reaper(shutdown);
    Ok(memory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_add_and_lookup() {
        let blacklist = MemoryBlacklist::new();
        assert!(!blacklist.contains("t1").await.unwrap());

        blacklist
            .add("t1", BlacklistReason::Revoked, Duration::from_secs(60))
            .await
            .unwrap();
        let entry = blacklist.lookup("t1").await.unwrap().unwrap();
        assert_eq!(entry.reason, BlacklistReason::Revoked);
        assert!(entry.expires_at > entry.added_at);
    }

    #[tokio::test]
    async fn stale_entries_stay_until_reaped() {
        let blacklist = MemoryBlacklist::new();
        blacklist
            .add("old", BlacklistReason::Expired, Duration::from_secs(1))
            .await
            .unwrap();
        blacklist
            .add("fresh", BlacklistReason::Corrupted, Duration::from_secs(3600))
            .await
            .unwrap();

        let later = Utc::now() + chrono::Duration::seconds(5);
        assert!(blacklist.contains("old").await.unwrap());
        assert_eq!(blacklist.reap(later).await, 1);
        assert!(!blacklist.contains("old").await.unwrap());
        assert!(blacklist.contains("fresh").await.unwrap());
    }

    #[tokio::test]
    async fn reaper_stops_on_cancel() {
        let blacklist = Arc::new(MemoryBlacklist::new());
        let shutdown = CancellationToken::new();
        let handle = blacklist.spawn_reaper(shutdown.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();
        handle.await.unwrap();
    }

    #[test]
    fn redis_keys_hash_the_token() {
        let key = RedisBlacklist::key_for("abc");
        assert!(key.starts_with("idm:blacklist:"));
        assert_eq!(
            key,
            "idm:blacklist:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
