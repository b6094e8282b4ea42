//! # 缓存模块
//!
//! 刷新令牌与验证码记录的存储后端（内存 / Redis）

pub mod abstract_cache;
pub mod client;
pub mod keys;

pub use abstract_cache::{CacheBackend, CacheProvider, HashCheck, MemoryCache};
pub use client::RedisCache;
pub use keys::{CacheKey, CacheKeyBuilder};
