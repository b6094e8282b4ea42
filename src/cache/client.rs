//! # Redis 缓存客户端
//!
//! 基于 `ConnectionManager` 的 Redis 实现，多步原子操作通过 Lua 脚本完成

use async_trait::async_trait;
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use super::abstract_cache::{CacheProvider, HashCheck};
use crate::config::RedisConfig;
use crate::error::{AppError, Result};
use crate::{ldebug, linfo, logging::{LogComponent, LogStage}};

/// 键不存在时写入哈希并设置过期时间
static HASH_SET_NX: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
redis.call('HSET', KEYS[1], unpack(ARGV, 2))
redis.call('EXPIRE', KEYS[1], ARGV[1])
return 1
",
    )
});

/// 仅对存在的键执行 HINCRBY
static HASH_INCR_EXISTING: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return false
end
return redis.call('HINCRBY', KEYS[1], ARGV[1], ARGV[2])
",
    )
});

/// 核对哈希字段：-1 键不存在，-2 已锁定，0 相等并已删除，正数为自增后的计数
static HASH_CHECK_AND_TAKE: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return -1
end
local count = tonumber(redis.call('HGET', KEYS[1], ARGV[2]))
if count == nil or count >= tonumber(ARGV[4]) then
    return -2
end
if redis.call('HGET', KEYS[1], ARGV[1]) == ARGV[3] then
    redis.call('DEL', KEYS[1])
    return 0
end
return redis.call('HINCRBY', KEYS[1], ARGV[2], 1)
",
    )
});

/// 值相等时删除
static COMPARE_AND_DELETE: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
",
    )
});

/// Redis 过期时间以秒为单位，至少 1 秒
fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// Redis 缓存
pub struct RedisCache {
    /// Redis 连接管理器
    connection_manager: ConnectionManager,
}

impl RedisCache {
    /// 建立连接
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        linfo!(
            "system",
            LogStage::Cache,
            LogComponent::Cache,
            "connect_to_redis",
            "正在连接 Redis 服务器"
        );

        let client = Client::open(config.url.as_str())
            .map_err(|e| AppError::cache_with_source("创建 Redis 客户端失败", e))?;

        let connection_manager = tokio::time::timeout(
            Duration::from_secs(config.connection_timeout),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| AppError::cache(format!("连接 Redis 超时（{}s）", config.connection_timeout)))?
        .map_err(|e| AppError::cache_with_source("建立 Redis 连接失败", e))?;

        linfo!(
            "system",
            LogStage::Cache,
            LogComponent::Cache,
            "redis_connected",
            "Redis 连接建立成功"
        );

        Ok(Self { connection_manager })
    }

    fn connection(&self) -> ConnectionManager {
        self.connection_manager.clone()
    }
}

#[async_trait]
impl CacheProvider for RedisCache {
    async fn set<T>(&self, key: &str, value: T, ttl: Option<Duration>) -> Result<()>
    where
        T: Serialize + Send,
    {
        let serialized = serde_json::to_string(&value)
            .map_err(|e| AppError::cache_with_source("序列化缓存值失败", e))?;
        let mut conn = self.connection();

        match ttl {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(key, serialized, ttl_seconds(ttl))
                .await
                .map_err(|e| AppError::cache_with_source(format!("设置缓存失败: {key}"), e))?,
            None => conn
                .set::<_, _, ()>(key, serialized)
                .await
                .map_err(|e| AppError::cache_with_source(format!("设置缓存失败: {key}"), e))?,
        }

        ldebug!(
            "system",
            LogStage::Cache,
            LogComponent::Cache,
            "set_cache_ok",
            &format!("缓存设置成功: {key}")
        );
        Ok(())
    }

    async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let mut conn = self.connection();
        let result: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| AppError::cache_with_source(format!("获取缓存失败: {key}"), e))?;

        result
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| AppError::cache_with_source("反序列化缓存值失败", e))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection();
        let removed: i64 = conn
            .del(key)
            .await
            .map_err(|e| AppError::cache_with_source(format!("删除缓存失败: {key}"), e))?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection();
        conn.exists(key)
            .await
            .map_err(|e| AppError::cache_with_source("Redis EXISTS失败", e))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.connection();
        let seconds = i64::try_from(ttl_seconds(ttl)).unwrap_or(i64::MAX);
        conn.expire(key, seconds)
            .await
            .map_err(|e| AppError::cache_with_source("Redis EXPIRE失败", e))
    }

    async fn hash_set_nx(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl: Duration,
    ) -> Result<bool> {
        if fields.is_empty() {
            return Err(AppError::cache("哈希字段不能为空"));
        }

        let mut conn = self.connection();
        let mut invocation = HASH_SET_NX.key(key);
        invocation.arg(ttl_seconds(ttl));
        for (field, value) in fields {
            invocation.arg(*field).arg(value.as_str());
        }

        let created: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AppError::cache_with_source(format!("创建哈希失败: {key}"), e))?;
        Ok(created == 1)
    }

    async fn hash_get_all(&self, key: &str) -> Result<Option<HashMap<String, String>>> {
        let mut conn = self.connection();
        let map: HashMap<String, String> = conn
            .hgetall(key)
            .await
            .map_err(|e| AppError::cache_with_source(format!("读取哈希失败: {key}"), e))?;
        Ok((!map.is_empty()).then_some(map))
    }

    async fn hash_incr_existing(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> Result<Option<i64>> {
        let mut conn = self.connection();
        HASH_INCR_EXISTING
            .key(key)
            .arg(field)
            .arg(delta)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AppError::cache_with_source(format!("哈希字段自增失败: {key}"), e))
    }

    async fn hash_check_and_take(
        &self,
        key: &str,
        field: &str,
        expected: &str,
        counter: &str,
        limit: i64,
    ) -> Result<HashCheck> {
        let mut conn = self.connection();
        let outcome: i64 = HASH_CHECK_AND_TAKE
            .key(key)
            .arg(field)
            .arg(counter)
            .arg(expected)
            .arg(limit)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AppError::cache_with_source(format!("哈希字段核对失败: {key}"), e))?;

        Ok(match outcome {
            -1 => HashCheck::Missing,
            0 => HashCheck::Matched,
            count if count > 0 => HashCheck::Mismatch(count),
            _ => HashCheck::Locked,
        })
    }

    async fn compare_and_delete<T>(&self, key: &str, expected: &T) -> Result<bool>
    where
        T: Serialize + Sync + ?Sized,
    {
        let expected = serde_json::to_string(expected)
            .map_err(|e| AppError::cache_with_source("序列化缓存值失败", e))?;

        let mut conn = self.connection();
        let removed: i64 = COMPARE_AND_DELETE
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AppError::cache_with_source(format!("比较删除失败: {key}"), e))?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::cache_with_source("Redis PING失败", e))?;
        Ok(())
    }
}
