//! # 缓存抽象层
//!
//! 提供统一的缓存接口，支持内存缓存和Redis缓存。
//! 除普通键值外还提供认证核心依赖的原子原语：
//! 不存在才创建的哈希、只对存活键生效的字段自增、比较后删除。

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::client::RedisCache;
use crate::config::{CacheConfig, CacheType, RedisConfig};
use crate::error::{AppError, Result};
use crate::{linfo, lwarn, logging::{LogComponent, LogStage}};

/// 缓存抽象trait
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// 设置缓存值（JSON 序列化）
    async fn set<T>(&self, key: &str, value: T, ttl: Option<Duration>) -> Result<()>
    where
        T: Serialize + Send;

    /// 获取缓存值
    async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send;

    /// 删除缓存值，返回是否删除了存活的键
    async fn delete(&self, key: &str) -> Result<bool>;

    /// 检查键是否存在
    async fn exists(&self, key: &str) -> Result<bool>;

    /// 设置过期时间，键不存在时返回 false
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// 键不存在时原子地创建哈希并设置过期时间；已存在返回 false
    async fn hash_set_nx(&self, key: &str, fields: &[(&str, String)], ttl: Duration)
    -> Result<bool>;

    /// 读取整个哈希
    async fn hash_get_all(&self, key: &str) -> Result<Option<HashMap<String, String>>>;

    /// 原子自增哈希字段；键已过期或不存在时返回 None 且不会重新创建键
    async fn hash_incr_existing(&self, key: &str, field: &str, delta: i64)
    -> Result<Option<i64>>;

    /// 原子地核对哈希字段：相等时删除整个键；不等时计数字段加一；
    /// 计数达到 `limit` 后不再比较
    async fn hash_check_and_take(
        &self,
        key: &str,
        field: &str,
        expected: &str,
        counter: &str,
        limit: i64,
    ) -> Result<HashCheck>;

    /// 仅当存储值等于 `expected` 时原子删除
    async fn compare_and_delete<T>(&self, key: &str, expected: &T) -> Result<bool>
    where
        T: Serialize + Sync + ?Sized;

    /// 连通性检查
    async fn ping(&self) -> Result<()>;
}

/// `hash_check_and_take` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashCheck {
    /// 键不存在或已过期
    Missing,
    /// 计数已达上限，未做比较
    Locked,
    /// 字段不等，附带自增后的计数
    Mismatch(i64),
    /// 字段相等，键已删除
    Matched,
}

/// 内存中保存的值
#[derive(Debug, Clone)]
enum StoredValue {
    Plain(String),
    Hash(HashMap<String, String>),
}

/// 缓存项
#[derive(Debug, Clone)]
struct CacheEntry {
    value: StoredValue,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: StoredValue, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|t| Instant::now() + t),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }
}

fn type_mismatch(key: &str) -> AppError {
    AppError::cache(format!("缓存键类型不匹配: {key}"))
}

/// 内存缓存实现
///
/// 每个键的读改写都在 `DashMap` 分片锁内完成，单进程内具备与 Redis 脚本相同的原子性。
pub struct MemoryCache {
    data: DashMap<String, CacheEntry>,
    max_entries: usize,
}

impl MemoryCache {
    /// 创建内存缓存
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            data: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// 当前条目数（含尚未清理的过期项）
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否为空
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 写入新键前清理过期项；仍然写满时拒绝写入，存活条目不会被淘汰
    fn ensure_capacity(&self, key: &str) -> Result<()> {
        if self.data.len() < self.max_entries || self.data.contains_key(key) {
            return Ok(());
        }

        self.data.retain(|_, entry| !entry.is_expired());
        if self.data.len() < self.max_entries {
            return Ok(());
        }

        lwarn!(
            "system",
            LogStage::Cache,
            LogComponent::Cache,
            "memory_cache_full",
            &format!("内存缓存已满（{} 条），拒绝写入键: {key}", self.max_entries)
        );
        Err(AppError::cache(format!(
            "内存缓存已满（{} 条）",
            self.max_entries
        )))
    }

    fn purge_if_expired(&self, key: &str) {
        self.data.remove_if(key, |_, entry| entry.is_expired());
    }
}

#[async_trait]
impl CacheProvider for MemoryCache {
    async fn set<T>(&self, key: &str, value: T, ttl: Option<Duration>) -> Result<()>
    where
        T: Serialize + Send,
    {
        let serialized = serde_json::to_string(&value)
            .map_err(|e| AppError::cache_with_source("序列化缓存值失败", e))?;

        self.ensure_capacity(key)?;
        self.data.insert(
            key.to_string(),
            CacheEntry::new(StoredValue::Plain(serialized), ttl),
        );
        Ok(())
    }

    async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let raw = match self.data.get(key) {
            Some(entry) if !entry.is_expired() => match &entry.value {
                StoredValue::Plain(raw) => Some(raw.clone()),
                StoredValue::Hash(_) => return Err(type_mismatch(key)),
            },
            _ => None,
        };

        match raw {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| AppError::cache_with_source("反序列化缓存值失败", e)),
            None => {
                self.purge_if_expired(key);
                Ok(None)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self
            .data
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired()))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.data.get(key).is_some_and(|entry| !entry.is_expired()))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        match self.data.get_mut(key) {
            Some(mut entry) if !entry.is_expired() => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn hash_set_nx(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl: Duration,
    ) -> Result<bool> {
        let map: HashMap<String, String> = fields
            .iter()
            .map(|(field, value)| ((*field).to_string(), value.clone()))
            .collect();
        let entry = CacheEntry::new(StoredValue::Hash(map), Some(ttl));

        self.ensure_capacity(key)?;
        match self.data.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(entry);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                Ok(true)
            }
        }
    }

    async fn hash_get_all(&self, key: &str) -> Result<Option<HashMap<String, String>>> {
        let found = self.data.get(key).and_then(|entry| {
            if entry.is_expired() {
                return None;
            }
            match &entry.value {
                StoredValue::Hash(map) => Some(Ok(map.clone())),
                StoredValue::Plain(_) => Some(Err(type_mismatch(key))),
            }
        });

        if found.is_none() {
            self.purge_if_expired(key);
        }
        found.transpose()
    }

    async fn hash_incr_existing(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> Result<Option<i64>> {
        let Some(mut entry) = self.data.get_mut(key) else {
            return Ok(None);
        };
        if entry.is_expired() {
            return Ok(None);
        }

        match &mut entry.value {
            StoredValue::Hash(map) => {
                let current = match map.get(field) {
                    Some(raw) => raw.parse::<i64>().map_err(|e| {
                        AppError::cache_with_source(format!("哈希字段不是整数: {field}"), e)
                    })?,
                    None => 0,
                };
                let next = current + delta;
                map.insert(field.to_string(), next.to_string());
                Ok(Some(next))
            }
            StoredValue::Plain(_) => Err(type_mismatch(key)),
        }
    }

    async fn hash_check_and_take(
        &self,
        key: &str,
        field: &str,
        expected: &str,
        counter: &str,
        limit: i64,
    ) -> Result<HashCheck> {
        let Entry::Occupied(mut occupied) = self.data.entry(key.to_string()) else {
            return Ok(HashCheck::Missing);
        };
        if occupied.get().is_expired() {
            occupied.remove();
            return Ok(HashCheck::Missing);
        }

        let StoredValue::Hash(map) = &mut occupied.get_mut().value else {
            return Err(type_mismatch(key));
        };
        // 计数缺失或无法解析按锁定处理
        let count = match map.get(counter).map(|raw| raw.parse::<i64>()) {
            Some(Ok(count)) if count < limit => count,
            _ => return Ok(HashCheck::Locked),
        };

        if map.get(field).is_some_and(|value| value == expected) {
            occupied.remove();
            return Ok(HashCheck::Matched);
        }

        let next = count + 1;
        map.insert(counter.to_string(), next.to_string());
        Ok(HashCheck::Mismatch(next))
    }

    async fn compare_and_delete<T>(&self, key: &str, expected: &T) -> Result<bool>
    where
        T: Serialize + Sync + ?Sized,
    {
        let expected = serde_json::to_string(expected)
            .map_err(|e| AppError::cache_with_source("序列化缓存值失败", e))?;

        let removed = self.data.remove_if(key, |_, entry| {
            !entry.is_expired()
                && matches!(&entry.value, StoredValue::Plain(raw) if *raw == expected)
        });
        Ok(removed.is_some())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// 缓存后端 - 枚举分发，避免泛型方法的 trait object 限制
pub enum CacheBackend {
    /// 进程内缓存
    Memory(MemoryCache),
    /// Redis 缓存
    Redis(RedisCache),
}

impl CacheBackend {
    /// 创建内存缓存后端
    #[must_use]
    pub fn memory(max_entries: usize) -> Self {
        Self::Memory(MemoryCache::new(max_entries))
    }

    /// 根据配置创建缓存后端
    pub async fn from_config(config: &CacheConfig) -> Result<Self> {
        match config.cache_type {
            CacheType::Memory => {
                linfo!(
                    "system",
                    LogStage::Startup,
                    LogComponent::Cache,
                    "cache_memory",
                    &format!("使用内存缓存，最大条目数: {}", config.memory_max_entries)
                );
                Ok(Self::memory(config.memory_max_entries))
            }
            CacheType::Redis => {
                let redis_config = config.redis.clone().unwrap_or_else(RedisConfig::default);
                Ok(Self::Redis(RedisCache::connect(&redis_config).await?))
            }
        }
    }

    /// 后端名称
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Redis(_) => "redis",
        }
    }

    /// 设置缓存值
    pub async fn set<T>(&self, key: &str, value: T, ttl: Option<Duration>) -> Result<()>
    where
        T: Serialize + Send,
    {
        match self {
            Self::Memory(cache) => cache.set(key, value, ttl).await,
            Self::Redis(cache) => cache.set(key, value, ttl).await,
        }
    }

    /// 获取缓存值
    pub async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self {
            Self::Memory(cache) => cache.get(key).await,
            Self::Redis(cache) => cache.get(key).await,
        }
    }

    /// 删除缓存值
    pub async fn delete(&self, key: &str) -> Result<bool> {
        match self {
            Self::Memory(cache) => cache.delete(key).await,
            Self::Redis(cache) => cache.delete(key).await,
        }
    }

    /// 检查键是否存在
    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self {
            Self::Memory(cache) => cache.exists(key).await,
            Self::Redis(cache) => cache.exists(key).await,
        }
    }

    /// 设置过期时间
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        match self {
            Self::Memory(cache) => cache.expire(key, ttl).await,
            Self::Redis(cache) => cache.expire(key, ttl).await,
        }
    }

    /// 不存在才创建哈希
    pub async fn hash_set_nx(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl: Duration,
    ) -> Result<bool> {
        match self {
            Self::Memory(cache) => cache.hash_set_nx(key, fields, ttl).await,
            Self::Redis(cache) => cache.hash_set_nx(key, fields, ttl).await,
        }
    }

    /// 读取哈希
    pub async fn hash_get_all(&self, key: &str) -> Result<Option<HashMap<String, String>>> {
        match self {
            Self::Memory(cache) => cache.hash_get_all(key).await,
            Self::Redis(cache) => cache.hash_get_all(key).await,
        }
    }

    /// 存活键上的字段自增
    pub async fn hash_incr_existing(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> Result<Option<i64>> {
        match self {
            Self::Memory(cache) => cache.hash_incr_existing(key, field, delta).await,
            Self::Redis(cache) => cache.hash_incr_existing(key, field, delta).await,
        }
    }

    /// 核对哈希字段，相等时取走，不等时计数
    pub async fn hash_check_and_take(
        &self,
        key: &str,
        field: &str,
        expected: &str,
        counter: &str,
        limit: i64,
    ) -> Result<HashCheck> {
        match self {
            Self::Memory(cache) => {
                cache
                    .hash_check_and_take(key, field, expected, counter, limit)
                    .await
            }
            Self::Redis(cache) => {
                cache
                    .hash_check_and_take(key, field, expected, counter, limit)
                    .await
            }
        }
    }

    /// 比较后删除
    pub async fn compare_and_delete<T>(&self, key: &str, expected: &T) -> Result<bool>
    where
        T: Serialize + Sync + ?Sized,
    {
        match self {
            Self::Memory(cache) => cache.compare_and_delete(key, expected).await,
            Self::Redis(cache) => cache.compare_and_delete(key, expected).await,
        }
    }

    /// 连通性检查
    pub async fn ping(&self) -> Result<()> {
        match self {
            Self::Memory(cache) => cache.ping().await,
            Self::Redis(cache) => cache.ping().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn fields(code: &str) -> Vec<(&'static str, String)> {
        vec![("code", code.to_string()), ("retry", "0".to_string())]
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = CacheBackend::memory(16);
        cache
            .set("k", "1+admin", Some(Duration::from_secs(60)))
            .await
            .unwrap();

        assert_eq!(cache.get::<String>("k").await.unwrap().as_deref(), Some("1+admin"));
        assert!(cache.exists("k").await.unwrap());
        assert!(cache.delete("k").await.unwrap());
        assert!(!cache.delete("k").await.unwrap());
        assert_eq!(cache.get::<String>("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = MemoryCache::new(16);
        cache
            .set("short", 1_i64, Some(Duration::from_millis(20)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(!cache.exists("short").await.unwrap());
        assert_eq!(cache.get::<i64>("short").await.unwrap(), None);
        assert!(!cache.expire("short", Duration::from_secs(5)).await.unwrap());
    }

    #[tokio::test]
    async fn test_hash_set_nx_only_once() {
        let cache = MemoryCache::new(16);
        let ttl = Duration::from_secs(60);

        assert!(cache.hash_set_nx("otp", &fields("12345"), ttl).await.unwrap());
        assert!(!cache.hash_set_nx("otp", &fields("99999"), ttl).await.unwrap());

        let stored = cache.hash_get_all("otp").await.unwrap().unwrap();
        assert_eq!(stored["code"], "12345");
        assert_eq!(stored["retry"], "0");
    }

    #[tokio::test]
    async fn test_hash_set_nx_replaces_expired_record() {
        let cache = MemoryCache::new(16);
        assert!(cache
            .hash_set_nx("otp", &fields("11111"), Duration::from_millis(10))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(cache
            .hash_set_nx("otp", &fields("22222"), Duration::from_secs(60))
            .await
            .unwrap());
        let stored = cache.hash_get_all("otp").await.unwrap().unwrap();
        assert_eq!(stored["code"], "22222");
    }

    #[tokio::test]
    async fn test_hash_incr_never_resurrects_missing_key() {
        let cache = MemoryCache::new(16);
        assert_eq!(cache.hash_incr_existing("ghost", "retry", 1).await.unwrap(), None);
        assert!(!cache.exists("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_hash_incr_counts_every_attempt() {
        let cache = Arc::new(MemoryCache::new(16));
        cache
            .hash_set_nx("otp", &fields("12345"), Duration::from_secs(60))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache.hash_incr_existing("otp", "retry", 1).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stored = cache.hash_get_all("otp").await.unwrap().unwrap();
        assert_eq!(stored["retry"], "32");
    }

    #[tokio::test]
    async fn test_compare_and_delete() {
        let cache = MemoryCache::new(16);
        cache.set("rt", "7+customer", None).await.unwrap();

        assert!(!cache.compare_and_delete("rt", "8+customer").await.unwrap());
        assert!(cache.exists("rt").await.unwrap());
        assert!(cache.compare_and_delete("rt", "7+customer").await.unwrap());
        assert!(!cache.compare_and_delete("rt", "7+customer").await.unwrap());
    }

    #[tokio::test]
    async fn test_type_mismatch_is_error() {
        let cache = MemoryCache::new(16);
        cache.set("plain", "value", None).await.unwrap();
        assert!(cache.hash_get_all("plain").await.is_err());
        assert!(cache.hash_incr_existing("plain", "retry", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_full_cache_rejects_new_keys_without_evicting() {
        let cache = MemoryCache::new(2);
        let ttl = Duration::from_secs(60);
        cache.set("auth:refresh:a", "1+customer", Some(ttl)).await.unwrap();
        cache
            .hash_set_nx("auth:otp:b", &fields("12345"), ttl)
            .await
            .unwrap();

        let err = cache.set("auth:refresh:c", "2+customer", Some(ttl)).await;
        assert!(matches!(err, Err(AppError::Cache { .. })));
        assert!(cache.hash_set_nx("auth:otp:d", &fields("1"), ttl).await.is_err());

        assert_eq!(cache.len(), 2);
        assert!(cache.exists("auth:refresh:a").await.unwrap());
        assert!(cache.exists("auth:otp:b").await.unwrap());
        // 已存在的键仍可覆盖
        cache.set("auth:refresh:a", "1+admin", Some(ttl)).await.unwrap();
    }

    #[tokio::test]
    async fn test_full_cache_reclaims_expired_entries() {
        let cache = MemoryCache::new(2);
        cache
            .set("short", 1_i64, Some(Duration::from_millis(10)))
            .await
            .unwrap();
        cache.set("long", 2_i64, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        cache.set("next", 3_i64, None).await.unwrap();
        assert!(cache.exists("long").await.unwrap());
        assert!(cache.exists("next").await.unwrap());
    }

    #[tokio::test]
    async fn test_hash_check_and_take() {
        let cache = MemoryCache::new(16);
        let ttl = Duration::from_secs(60);
        assert_eq!(
            cache.hash_check_and_take("otp", "code", "12345", "retry", 3).await.unwrap(),
            HashCheck::Missing
        );

        cache.hash_set_nx("otp", &fields("12345"), ttl).await.unwrap();
        assert_eq!(
            cache.hash_check_and_take("otp", "code", "00000", "retry", 3).await.unwrap(),
            HashCheck::Mismatch(1)
        );
        assert_eq!(
            cache.hash_check_and_take("otp", "code", "12345", "retry", 3).await.unwrap(),
            HashCheck::Matched
        );
        assert!(!cache.exists("otp").await.unwrap());
    }

    #[tokio::test]
    async fn test_hash_check_and_take_locks_at_limit() {
        let cache = MemoryCache::new(16);
        cache
            .hash_set_nx("otp", &fields("12345"), Duration::from_secs(60))
            .await
            .unwrap();

        for attempt in 1..=3 {
            assert_eq!(
                cache.hash_check_and_take("otp", "code", "0", "retry", 3).await.unwrap(),
                HashCheck::Mismatch(attempt)
            );
        }
        assert_eq!(
            cache.hash_check_and_take("otp", "code", "12345", "retry", 3).await.unwrap(),
            HashCheck::Locked
        );
        assert!(cache.exists("otp").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_wrong_guesses_never_exceed_limit() {
        let cache = Arc::new(MemoryCache::new(16));
        cache
            .hash_set_nx("otp", &fields("12345"), Duration::from_secs(60))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..64 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache
                    .hash_check_and_take("otp", "code", "99999", "retry", 10)
                    .await
                    .unwrap()
            }));
        }
        let mut compared = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), HashCheck::Mismatch(_)) {
                compared += 1;
            }
        }

        assert_eq!(compared, 10);
        let stored = cache.hash_get_all("otp").await.unwrap().unwrap();
        assert_eq!(stored["retry"], "10");
    }
}
