//! # 测试辅助函数
//!
//! 提供装配好的认证服务与内存依赖

use std::sync::Arc;

use super::fixtures::test_app_config;
use crate::auth::service::{AuthDependencies, AuthService};
use crate::auth::types::{EntityRules, Group};
use crate::cache::CacheBackend;
use crate::config::AppConfig;
use crate::notify::{LogNotifier, Notifier};
use crate::store::{EntityStore, GroupStore, MemoryStore};

/// 测试中使用的规则词表
pub const TEST_RULES: [&str; 6] = ["list", "create", "read", "update", "delete", "menu"];

/// 内存依赖上的认证服务
pub struct TestContext {
    pub config: AppConfig,
    pub store: Arc<MemoryStore>,
    pub cache: Arc<CacheBackend>,
    pub auth: AuthService,
}

impl TestContext {
    /// 使用默认测试配置与日志投递
    pub async fn new() -> Self {
        Self::with_notifier(test_app_config(), Arc::new(LogNotifier)).await
    }

    /// 自定义配置与投递实现
    pub async fn with_notifier(config: AppConfig, notifier: Arc<dyn Notifier>) -> Self {
        let store = Arc::new(MemoryStore::new());
        for entity in ["files", "products", "orders", "users"] {
            store
                .upsert_entity(EntityRules::new(entity, TEST_RULES))
                .await
                .unwrap_or_else(|e| panic!("seed entity {entity}: {e}"));
        }

        let cache = Arc::new(CacheBackend::memory(config.cache.memory_max_entries));
        let auth = AuthService::new(
            &config,
            AuthDependencies {
                cache: Arc::clone(&cache),
                users: store.clone(),
                groups: store.clone(),
                entities: store.clone(),
                notifier,
            },
        )
        .unwrap_or_else(|e| panic!("build auth service: {e}"));

        Self {
            config,
            store,
            cache,
            auth,
        }
    }

    /// 写入分组
    pub async fn seed_group(&self, group: Group) {
        self.store
            .create_group(group)
            .await
            .unwrap_or_else(|e| panic!("seed group: {e}"));
    }
}
