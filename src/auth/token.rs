//! # 令牌服务
//!
//! 签发与校验访问令牌；签发、轮换刷新令牌，刷新令牌的存活状态保存在缓存中

use std::sync::Arc;
use std::time::Duration;

use crate::auth::jwt::JwtManager;
use crate::auth::permissions::Role;
use crate::auth::types::{AccessTokenPayload, TokenPair};
use crate::cache::{CacheBackend, CacheKeyBuilder};
use crate::config::JwtConfig;
use crate::error::{AuthError, Result};
use crate::store::UserStore;
use crate::{ldebug, linfo, lwarn, logging::{LogComponent, LogStage}};

/// 缓存中的刷新令牌值：`"{user_id}+{role}"`
fn refresh_entry(user_id: i32, role: Role) -> String {
    format!("{user_id}+{role}")
}

/// 解析缓存值中的用户 ID
fn entry_user_id(entry: &str) -> Option<i32> {
    entry.split_once('+').and_then(|(id, _)| id.parse().ok())
}

/// 令牌服务
pub struct TokenService {
    jwt: JwtManager,
    cache: Arc<CacheBackend>,
    users: Arc<dyn UserStore>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    /// 创建令牌服务
    pub fn new(
        config: &JwtConfig,
        cache: Arc<CacheBackend>,
        users: Arc<dyn UserStore>,
    ) -> Result<Self> {
        Ok(Self {
            jwt: JwtManager::new(config)?,
            cache,
            users,
            access_ttl: Duration::from_secs(config.access_token_lifetime),
            refresh_ttl: Duration::from_secs(config.refresh_token_lifetime),
        })
    }

    /// 签发令牌对，并在缓存中登记刷新令牌
    pub async fn generate_token(&self, user_id: i32, role: Role, limited: bool) -> Result<TokenPair> {
        let access_token = self
            .jwt
            .create_signed_token(user_id, role, limited, self.access_ttl)?;
        let refresh_token = self.jwt.sign_refresh_token(user_id)?;

        let key = CacheKeyBuilder::refresh_token(&refresh_token).build();
        self.cache
            .set(&key, refresh_entry(user_id, role), Some(self.refresh_ttl))
            .await?;

        ldebug!(
            "system",
            LogStage::Token,
            LogComponent::Token,
            "token_issued",
            &format!("为用户 {user_id} 签发令牌对 (role={role}, limited={limited})")
        );

        Ok(TokenPair::bearer(access_token, refresh_token))
    }

    /// 只签发受限访问令牌，不登记刷新令牌
    pub fn generate_limited_token(&self, user_id: i32, role: Role) -> Result<String> {
        self.jwt
            .create_signed_token(user_id, role, true, self.access_ttl)
    }

    /// 校验访问令牌
    pub fn verify_token(&self, access_token: &str) -> Result<AccessTokenPayload> {
        self.jwt.verify_access_token(access_token)
    }

    /// 用旧刷新令牌换取新令牌对；旧令牌原子地作废
    pub async fn refresh(&self, old_refresh_token: &str) -> Result<TokenPair> {
        let key = CacheKeyBuilder::refresh_token(old_refresh_token).build();

        let Some(entry) = self.cache.get::<String>(&key).await? else {
            return Err(AuthError::RefreshTokenExpired.into());
        };

        let token_user_id = self.jwt.verify_refresh_token(old_refresh_token)?;
        if entry_user_id(&entry) != Some(token_user_id) {
            lwarn!(
                "system",
                LogStage::Token,
                LogComponent::Token,
                "refresh_user_mismatch",
                &format!("刷新令牌中的用户 {token_user_id} 与缓存记录不一致")
            );
            return Err(AuthError::InvalidTokenProvided.into());
        }

        let user = self
            .users
            .find_by_id(token_user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.is_force_login {
            return Err(AuthError::UserForceLogin.into());
        }

        // 并发刷新时只有一个调用能删除成功
        if !self.cache.compare_and_delete(&key, &entry).await? {
            return Err(AuthError::RefreshTokenExpired.into());
        }

        let pair = self.generate_token(user.id, user.role, false).await?;

        linfo!(
            "system",
            LogStage::Token,
            LogComponent::Token,
            "token_refreshed",
            &format!("用户 {} 的刷新令牌已轮换", user.id)
        );

        Ok(pair)
    }

    /// 刷新令牌有效期
    #[must_use]
    pub const fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::UserChanges;
    use crate::store::MemoryStore;
    use crate::testing::{UserFixture, test_jwt_config};

    async fn setup() -> (TokenService, Arc<MemoryStore>, Arc<CacheBackend>) {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(UserFixture::customer(1).build()).await;
        let cache = Arc::new(CacheBackend::memory(1000));
        let service = TokenService::new(&test_jwt_config(), cache.clone(), store.clone()).unwrap();
        (service, store, cache)
    }

    #[test]
    fn test_entry_user_id() {
        assert_eq!(entry_user_id(&refresh_entry(12, Role::Admin)), Some(12));
        assert_eq!(entry_user_id("garbage"), None);
    }

    #[tokio::test]
    async fn test_generate_and_verify() {
        let (service, _, cache) = setup().await;
        let pair = service.generate_token(1, Role::Customer, false).await.unwrap();

        let payload = service.verify_token(&pair.access_token).unwrap();
        assert_eq!(payload.user_id, 1);
        assert_eq!(payload.role, Role::Customer);
        assert_eq!(pair.token_type, "bearer");

        let key = CacheKeyBuilder::refresh_token(&pair.refresh_token).build();
        assert_eq!(
            cache.get::<String>(&key).await.unwrap(),
            Some("1+customer".to_string())
        );
    }

    #[tokio::test]
    async fn test_refresh_rotates_token() {
        let (service, _, _) = setup().await;
        let pair = service.generate_token(1, Role::Customer, false).await.unwrap();

        let rotated = service.refresh(&pair.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, pair.refresh_token);

        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::RefreshTokenExpired));
        service.refresh(&rotated.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_rejects_mismatched_entry() {
        let (service, _, cache) = setup().await;
        let pair = service.generate_token(1, Role::Customer, false).await.unwrap();
        let key = CacheKeyBuilder::refresh_token(&pair.refresh_token).build();
        cache
            .set(&key, refresh_entry(2, Role::Admin), None)
            .await
            .unwrap();

        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::InvalidTokenProvided));
    }

    #[tokio::test]
    async fn test_refresh_uses_current_role() {
        let (service, store, cache) = setup().await;
        let pair = service.generate_token(1, Role::Customer, false).await.unwrap();
        store.insert_user(UserFixture::admin(1).build()).await;

        let rotated = service.refresh(&pair.refresh_token).await.unwrap();
        let payload = service.verify_token(&rotated.access_token).unwrap();
        assert_eq!(payload.role, Role::Admin);

        let key = CacheKeyBuilder::refresh_token(&rotated.refresh_token).build();
        assert_eq!(
            cache.get::<String>(&key).await.unwrap(),
            Some("1+admin".to_string())
        );
    }

    #[tokio::test]
    async fn test_refresh_after_force_login() {
        let (service, store, _) = setup().await;
        let pair = service.generate_token(1, Role::Customer, false).await.unwrap();
        store
            .update_user(
                1,
                UserChanges {
                    is_force_login: Some(true),
                    ..UserChanges::default()
                },
            )
            .await
            .unwrap();

        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::UserForceLogin));
    }

    #[tokio::test]
    async fn test_concurrent_refresh_has_single_winner() {
        let (service, _, _) = setup().await;
        let service = Arc::new(service);
        let pair = service.generate_token(1, Role::Customer, false).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                let token = pair.refresh_token.clone();
                tokio::spawn(async move { service.refresh(&token).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_limited_token_has_no_refresh_entry() {
        let (service, _, cache) = setup().await;
        let token = service.generate_limited_token(1, Role::Customer).unwrap();
        let payload = service.verify_token(&token).unwrap();
        assert!(payload.limited);
        assert!(matches!(cache.as_ref(), CacheBackend::Memory(memory) if memory.is_empty()));
    }
}
