//! # 认证流程编排
//!
//! 组合令牌、验证码、权限解析与用户存储，实现密码登录、验证码登录、
//! 第三方登录、登出、刷新与修改密码等流程

use chrono::Utc;
use std::sync::Arc;

use crate::auth::otp::OtpService;
use crate::auth::password::{hash_password, random_password, verify_password};
use crate::auth::permissions::{PermissionMap, PermissionResolver, Role, Scope};
use crate::auth::social::IdentityProvider;
use crate::auth::token::TokenService;
use crate::auth::types::{
    AccessTokenPayload, CUSTOMER_GROUP, LoginType, NewUser, OtpRequestType, SocialProfile,
    TokenPair, User, UserChanges, UserStatus, Username,
};
use crate::cache::CacheBackend;
use crate::config::AppConfig;
use crate::error::{AuthError, Result};
use crate::notify::Notifier;
use crate::store::{EntityStore, GroupStore, UserStore};
use crate::{ldebug, linfo, lwarn, logging::{LogComponent, LogStage}};

/// 认证服务依赖的存储与外部协作者
pub struct AuthDependencies {
    pub cache: Arc<CacheBackend>,
    pub users: Arc<dyn UserStore>,
    pub groups: Arc<dyn GroupStore>,
    pub entities: Arc<dyn EntityStore>,
    pub notifier: Arc<dyn Notifier>,
}

/// 认证服务
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: Arc<TokenService>,
    otp: Arc<OtpService>,
    permissions: Arc<PermissionResolver>,
    bcrypt_cost: u32,
    random_password_length: usize,
}

impl AuthService {
    /// 按配置装配认证服务
    pub fn new(config: &AppConfig, deps: AuthDependencies) -> Result<Self> {
        let tokens = Arc::new(TokenService::new(
            &config.jwt,
            Arc::clone(&deps.cache),
            Arc::clone(&deps.users),
        )?);
        let otp = Arc::new(OtpService::new(
            deps.cache,
            deps.notifier,
            config.otp.clone(),
        ));
        let permissions = Arc::new(PermissionResolver::new(deps.groups, deps.entities));

        Ok(Self {
            users: deps.users,
            tokens,
            otp,
            permissions,
            bcrypt_cost: config.security.bcrypt_cost,
            random_password_length: config.security.random_password_length,
        })
    }

    /// 令牌服务
    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    /// 验证码服务
    #[must_use]
    pub fn otp(&self) -> &Arc<OtpService> {
        &self.otp
    }

    /// 权限解析器
    #[must_use]
    pub fn permissions(&self) -> &Arc<PermissionResolver> {
        &self.permissions
    }

    /// 登录成功：记录登录时间、清除强制下线标记并签发完整令牌对
    async fn complete_login(&self, user: &User, extra: UserChanges) -> Result<TokenPair> {
        let base = UserChanges::login(user, Utc::now());
        let changes = UserChanges {
            email_verified: extra.email_verified,
            phone_verified: extra.phone_verified,
            hashed_password: extra.hashed_password,
            is_force_change_password: extra.is_force_change_password,
            ..base
        };
        let user = self.users.update_user(user.id, changes).await?;
        let pair = self.tokens.generate_token(user.id, user.role, false).await?;

        linfo!(
            "system",
            LogStage::Authentication,
            LogComponent::Auth,
            "login_success",
            &format!("用户 {} 登录成功", user.id)
        );
        Ok(pair)
    }

    async fn require_user(&self, username: &Username) -> Result<User> {
        self.users
            .find_by_username(username, None)
            .await?
            .ok_or_else(|| AuthError::UserNotFound.into())
    }

    /// 密码登录；按顺序检查存在性、启用状态、邮箱 / 手机验证
    pub async fn login_with_password(
        &self,
        username: &Username,
        password: &str,
        allowed_roles: Option<&[Role]>,
    ) -> Result<TokenPair> {
        let user = self
            .users
            .find_by_username(username, allowed_roles)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let password_ok = user
            .hashed_password
            .as_deref()
            .is_some_and(|hash| verify_password(password, hash));
        if !password_ok {
            lwarn!(
                "system",
                LogStage::Authentication,
                LogComponent::Auth,
                "password_mismatch",
                &format!("{username} 密码校验失败")
            );
            return Err(AuthError::UserNotFound.into());
        }

        if !user.is_enable {
            return Err(AuthError::UserIsDisabled.into());
        }
        match username {
            Username::Email(value) if !user.email_verified => {
                return Err(AuthError::EmailNotVerified {
                    username: value.clone(),
                }
                .into());
            }
            Username::Phone(value) if !user.phone_verified => {
                return Err(AuthError::PhoneNotVerified {
                    username: value.clone(),
                }
                .into());
            }
            _ => {}
        }

        self.complete_login(&user, UserChanges::default()).await
    }

    /// 验证码登录，用户不存在时注册为客户
    pub async fn otp_login_or_register(&self, username: &Username, code: &str) -> Result<TokenPair> {
        self.otp.verify(username, code).await?;

        let user = match self.users.find_by_username(username, None).await? {
            Some(user) => {
                if !user.is_enable {
                    return Err(AuthError::UserIsDisabled.into());
                }
                if user.is_blocked {
                    return Err(AuthError::UserIsBlocked.into());
                }
                user
            }
            None => {
                let mut new_user = NewUser::customer(username);
                new_user.email_verified = username.is_email();
                new_user.phone_verified = username.is_phone();
                let created = self.users.create_user(new_user).await?;
                linfo!(
                    "system",
                    LogStage::Authentication,
                    LogComponent::Auth,
                    "user_registered",
                    &format!("通过验证码注册新用户 {} ({username})", created.id)
                );
                created
            }
        };

        self.complete_login(&user, UserChanges::default().verified(username))
            .await
    }

    /// 第三方登录：按邮箱查找或创建客户
    pub async fn social_login(&self, profile: SocialProfile) -> Result<TokenPair> {
        // 与 Username::parse 一致，邮箱统一小写
        let Some(email) = profile
            .email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(str::to_lowercase)
        else {
            return Err(AuthError::SocialLoginNotAcceptable.into());
        };

        let user = match self.users.find_by_email(&email).await? {
            Some(user) => user,
            None => {
                let password = random_password(self.random_password_length);
                let new_user = NewUser {
                    email: Some(email.clone()),
                    mobile_number: None,
                    hashed_password: Some(hash_password(&password, self.bcrypt_cost)?),
                    first_name: profile.first_name.clone(),
                    last_name: profile.last_name.clone(),
                    avatar: profile.avatar.clone(),
                    role: Role::Customer,
                    groups: vec![CUSTOMER_GROUP.to_string()],
                    permissions: Vec::new(),
                    email_verified: profile.email_verified,
                    phone_verified: false,
                    user_status: UserStatus::JustJoined,
                    login_type: LoginType::Social,
                };
                self.users.create_user(new_user).await?
            }
        };

        if !user.is_enable {
            return Err(AuthError::UserIsDisabled.into());
        }
        if user.is_blocked {
            return Err(AuthError::UserIsBlocked.into());
        }
        match user.user_status {
            UserStatus::Pending => return Err(AuthError::UserIsPending.into()),
            UserStatus::Rejected => return Err(AuthError::UserIsRejected.into()),
            _ => {}
        }

        let extra = UserChanges {
            email_verified: profile.email_verified.then_some(true),
            ..UserChanges::default()
        };
        self.complete_login(&user, extra).await
    }

    /// 通过身份提供方的授权码完成第三方登录
    pub async fn social_login_with_code(
        &self,
        provider: &dyn IdentityProvider,
        code: &str,
    ) -> Result<TokenPair> {
        let profile = provider.exchange_code(code).await?;
        ldebug!(
            "system",
            LogStage::Authentication,
            LogComponent::Social,
            "social_profile",
            &format!("{} 返回用户资料", provider.name())
        );
        self.social_login(profile).await
    }

    /// 登出：设置强制下线标记；管理员可以指定其他用户
    pub async fn logout(&self, current: &User, target_user_id: Option<i32>) -> Result<bool> {
        let target = target_user_id.unwrap_or(current.id);
        if target != current.id && current.role != Role::Admin {
            return Err(AuthError::AccessDenied.into());
        }

        let updated = self
            .users
            .update_user(
                target,
                UserChanges {
                    is_force_login: Some(true),
                    ..UserChanges::default()
                },
            )
            .await?;

        linfo!(
            "system",
            LogStage::Authentication,
            LogComponent::Auth,
            "logout",
            &format!("用户 {target} 已被强制下线 (操作者 {})", current.id)
        );
        Ok(updated.is_force_login)
    }

    /// 刷新令牌
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        self.tokens.refresh(refresh_token).await
    }

    /// 修改密码；受限令牌的调用视为一次登录并返回新的完整令牌对
    pub async fn change_password(
        &self,
        user: &User,
        old_password: Option<&str>,
        new_password: &str,
        is_limited: bool,
    ) -> Result<Option<TokenPair>> {
        if !is_limited {
            let old_password = old_password.ok_or(AuthError::OldPasswordRequired)?;
            let matches = user
                .hashed_password
                .as_deref()
                .is_some_and(|hash| verify_password(old_password, hash));
            if !matches {
                return Err(AuthError::OldPasswordNotMatch.into());
            }
        }

        let changes = UserChanges {
            hashed_password: Some(hash_password(new_password, self.bcrypt_cost)?),
            is_force_change_password: Some(false),
            is_force_login: Some(false),
            ..UserChanges::default()
        };

        if is_limited {
            return self.complete_login(user, changes).await.map(Some);
        }

        self.users.update_user(user.id, changes).await?;
        linfo!(
            "system",
            LogStage::Authentication,
            LogComponent::Auth,
            "password_changed",
            &format!("用户 {} 已修改密码", user.id)
        );
        Ok(None)
    }

    /// 申请登录验证码（用户可以不存在）
    pub async fn request_login_otp(&self, username: &Username) -> Result<()> {
        let user = self.users.find_by_username(username, None).await?;
        self.otp
            .request(
                username,
                OtpRequestType::Verification,
                user.as_ref().and_then(User::display_name),
            )
            .await
    }

    /// 申请重置密码验证码（用户必须存在）
    pub async fn request_reset_password_otp(&self, username: &Username) -> Result<()> {
        let user = self.require_user(username).await?;
        self.otp
            .request(username, OtpRequestType::ResetPassword, user.display_name())
            .await
    }

    /// 校验已有用户的验证码并登录
    pub async fn verify_otp(&self, username: &Username, code: &str) -> Result<TokenPair> {
        let user = self.require_user(username).await?;
        self.otp.verify(username, code).await?;
        self.complete_login(&user, UserChanges::default().verified(username))
            .await
    }

    /// 校验重置密码验证码，返回只能用于修改密码的受限令牌
    pub async fn verify_reset_password_otp(&self, username: &Username, code: &str) -> Result<String> {
        let user = self.require_user(username).await?;
        self.otp.verify(username, code).await?;
        self.tokens.generate_limited_token(user.id, user.role)
    }

    /// 校验访问令牌并加载用户；拒绝受限令牌
    pub async fn authenticate(&self, access_token: &str) -> Result<User> {
        let payload = self.tokens.verify_token(access_token)?;
        if payload.limited {
            return Err(AuthError::LimitedToken.into());
        }
        self.load_active_user(&payload).await
    }

    /// 校验访问令牌并加载用户；接受受限令牌（修改密码使用）
    ///
    /// 受限令牌只检查存在、启用与封禁：持有者已通过验证码证明身份，
    /// 强制下线标记与未验证的渠道不应阻止重置密码
    pub async fn authenticate_limited(&self, access_token: &str) -> Result<(User, bool)> {
        let payload = self.tokens.verify_token(access_token)?;
        if !payload.limited {
            return Ok((self.load_active_user(&payload).await?, false));
        }

        let user = self
            .users
            .find_by_id(payload.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if !user.is_enable {
            return Err(AuthError::UserIsDisabled.into());
        }
        if user.is_blocked {
            return Err(AuthError::UserIsBlocked.into());
        }
        Ok((user, true))
    }

    async fn load_active_user(&self, payload: &AccessTokenPayload) -> Result<User> {
        let user = self
            .users
            .find_by_id(payload.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.is_force_login {
            return Err(AuthError::UserForceLogin.into());
        }
        if !user.is_enable {
            return Err(AuthError::UserIsDisabled.into());
        }
        if user.is_blocked {
            return Err(AuthError::UserIsBlocked.into());
        }
        if let Some(email) = user.email.as_ref().filter(|_| !user.email_verified) {
            return Err(AuthError::EmailNotVerified {
                username: email.clone(),
            }
            .into());
        }
        if let Some(phone) = user.mobile_number.as_ref().filter(|_| !user.phone_verified) {
            return Err(AuthError::PhoneNotVerified {
                username: phone.clone(),
            }
            .into());
        }
        Ok(user)
    }

    /// 有效权限表
    pub async fn effective_permissions(&self, user: &User) -> Result<PermissionMap> {
        self.permissions.effective_permissions(user).await
    }

    /// 权限检查
    pub async fn authorize(&self, user: &User, scope: Option<&Scope>) -> Result<()> {
        self.permissions.check_scope(user, scope).await
    }

    /// 后台权限检查：角色必须是管理员或审计员
    pub async fn authorize_admin(&self, user: &User, scope: Option<&Scope>) -> Result<()> {
        if !user.role.is_staff() {
            return Err(AuthError::AccessDenied.into());
        }
        self.permissions.check_scope(user, scope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestContext, UserFixture};

    #[tokio::test]
    async fn test_password_login_check_order() {
        let ctx = TestContext::new().await;
        let hash = hash_password("pw", 4).unwrap();
        ctx.store
            .insert_user(
                UserFixture::customer(1)
                    .email("a@example.com")
                    .password_hash(&hash)
                    .email_verified(false)
                    .enabled(false)
                    .build(),
            )
            .await;
        let username = Username::parse("a@example.com").unwrap();

        let err = ctx
            .auth
            .login_with_password(&username, "pw", None)
            .await
            .unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::UserIsDisabled));

        let err = ctx
            .auth
            .login_with_password(&username, "wrong", None)
            .await
            .unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn test_password_login_requires_verified_channel() {
        let ctx = TestContext::new().await;
        let hash = hash_password("pw", 4).unwrap();
        ctx.store
            .insert_user(
                UserFixture::customer(1)
                    .phone("+989123456789")
                    .password_hash(&hash)
                    .phone_verified(false)
                    .build(),
            )
            .await;
        let username = Username::parse("+989123456789").unwrap();

        let err = ctx
            .auth
            .login_with_password(&username, "pw", None)
            .await
            .unwrap_err();
        assert_eq!(
            err.as_auth(),
            Some(&AuthError::PhoneNotVerified {
                username: "+989123456789".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_password_login_filters_roles() {
        let ctx = TestContext::new().await;
        let hash = hash_password("pw", 4).unwrap();
        ctx.store
            .insert_user(
                UserFixture::customer(1)
                    .email("c@example.com")
                    .password_hash(&hash)
                    .build(),
            )
            .await;
        let username = Username::parse("c@example.com").unwrap();

        let err = ctx
            .auth
            .login_with_password(&username, "pw", Some(&[Role::Admin, Role::Audit]))
            .await
            .unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::UserNotFound));

        let pair = ctx
            .auth
            .login_with_password(&username, "pw", Some(&[Role::Customer]))
            .await
            .unwrap();
        let user = ctx.auth.authenticate(&pair.access_token).await.unwrap();
        assert!(user.login_datetime.is_some());
    }

    #[tokio::test]
    async fn test_social_login_creates_customer() {
        let ctx = TestContext::new().await;
        let profile = SocialProfile {
            email: Some("new@example.com".to_string()),
            first_name: Some("Nima".to_string()),
            email_verified: true,
            ..SocialProfile::default()
        };

        let pair = ctx.auth.social_login(profile).await.unwrap();
        let user = ctx.auth.authenticate(&pair.access_token).await.unwrap();
        assert_eq!(user.login_type, LoginType::Social);
        assert_eq!(user.role, Role::Customer);
        assert!(user.hashed_password.is_some());
        assert!(user.email_verified);
    }

    #[tokio::test]
    async fn test_social_login_rejections() {
        let ctx = TestContext::new().await;
        let err = ctx
            .auth
            .social_login(SocialProfile::default())
            .await
            .unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::SocialLoginNotAcceptable));

        ctx.store
            .insert_user(
                UserFixture::customer(1)
                    .email("pending@example.com")
                    .status(UserStatus::Pending)
                    .build(),
            )
            .await;
        let err = ctx
            .auth
            .social_login(SocialProfile {
                email: Some("pending@example.com".to_string()),
                ..SocialProfile::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::UserIsPending));
    }

    #[tokio::test]
    async fn test_change_password_requires_old_password() {
        let ctx = TestContext::new().await;
        let hash = hash_password("old", 4).unwrap();
        let user = UserFixture::customer(1).password_hash(&hash).build();
        ctx.store.insert_user(user.clone()).await;

        let err = ctx
            .auth
            .change_password(&user, None, "new", false)
            .await
            .unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::OldPasswordRequired));

        let err = ctx
            .auth
            .change_password(&user, Some("nope"), "new", false)
            .await
            .unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::OldPasswordNotMatch));

        assert!(ctx
            .auth
            .change_password(&user, Some("old"), "new", false)
            .await
            .unwrap()
            .is_none());
        let stored = ctx.store.find_by_id(1).await.unwrap().unwrap();
        assert!(verify_password("new", stored.hashed_password.as_deref().unwrap()));
    }

    #[tokio::test]
    async fn test_limited_token_flow() {
        let ctx = TestContext::new().await;
        ctx.store
            .insert_user(UserFixture::customer(1).phone("+989123456789").build())
            .await;
        let username = Username::parse("+989123456789").unwrap();

        ctx.auth.request_reset_password_otp(&username).await.unwrap();
        let limited = ctx
            .auth
            .verify_reset_password_otp(&username, "12345")
            .await
            .unwrap();

        let err = ctx.auth.authenticate(&limited).await.unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::LimitedToken));

        let (user, is_limited) = ctx.auth.authenticate_limited(&limited).await.unwrap();
        assert!(is_limited);
        let pair = ctx
            .auth
            .change_password(&user, None, "fresh", is_limited)
            .await
            .unwrap()
            .unwrap();
        let payload = ctx.auth.tokens().verify_token(&pair.access_token).unwrap();
        assert!(!payload.limited);
    }

    #[tokio::test]
    async fn test_reset_otp_requires_existing_user() {
        let ctx = TestContext::new().await;
        let username = Username::parse("ghost@example.com").unwrap();
        let err = ctx
            .auth
            .request_reset_password_otp(&username)
            .await
            .unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn test_only_admin_can_logout_others() {
        let ctx = TestContext::new().await;
        let customer = UserFixture::customer(1).build();
        let admin = UserFixture::admin(2).build();
        ctx.store.insert_user(customer.clone()).await;
        ctx.store.insert_user(admin.clone()).await;

        let err = ctx.auth.logout(&customer, Some(2)).await.unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::AccessDenied));
        assert!(ctx.auth.logout(&admin, Some(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_authorize_admin_requires_staff_role() {
        let ctx = TestContext::new().await;
        let customer = UserFixture::customer(1).build();
        let err = ctx.auth.authorize_admin(&customer, None).await.unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::AccessDenied));

        let audit = UserFixture::new(2, Role::Audit).groups(&[]).build();
        ctx.auth.authorize_admin(&audit, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_password_reset_after_logout() {
        let ctx = TestContext::new().await;
        let user = UserFixture::customer(1).phone("+989123456789").build();
        ctx.store.insert_user(user.clone()).await;
        let username = Username::parse("+989123456789").unwrap();
        assert!(ctx.auth.logout(&user, None).await.unwrap());

        ctx.auth.request_reset_password_otp(&username).await.unwrap();
        let limited = ctx
            .auth
            .verify_reset_password_otp(&username, "12345")
            .await
            .unwrap();
        let (user, is_limited) = ctx.auth.authenticate_limited(&limited).await.unwrap();
        assert!(is_limited);
        assert!(user.is_force_login);

        let pair = ctx
            .auth
            .change_password(&user, None, "fresh", is_limited)
            .await
            .unwrap()
            .unwrap();
        let user = ctx.auth.authenticate(&pair.access_token).await.unwrap();
        assert!(!user.is_force_login);
        assert!(verify_password("fresh", user.hashed_password.as_deref().unwrap()));
    }

    #[tokio::test]
    async fn test_limited_token_ignores_unverified_email() {
        let ctx = TestContext::new().await;
        ctx.store
            .insert_user(
                UserFixture::customer(1)
                    .email("x@example.com")
                    .email_verified(false)
                    .phone("+989123456789")
                    .build(),
            )
            .await;
        let username = Username::parse("+989123456789").unwrap();

        ctx.auth.request_reset_password_otp(&username).await.unwrap();
        let limited = ctx
            .auth
            .verify_reset_password_otp(&username, "12345")
            .await
            .unwrap();
        let (user, is_limited) = ctx.auth.authenticate_limited(&limited).await.unwrap();
        assert_eq!((user.id, is_limited), (1, true));
    }

    #[tokio::test]
    async fn test_limited_token_still_rejects_blocked_and_disabled() {
        let ctx = TestContext::new().await;
        ctx.store
            .insert_user(UserFixture::customer(1).blocked(true).build())
            .await;
        ctx.store
            .insert_user(UserFixture::customer(2).enabled(false).build())
            .await;

        let blocked = ctx
            .auth
            .tokens()
            .generate_limited_token(1, Role::Customer)
            .unwrap();
        let err = ctx.auth.authenticate_limited(&blocked).await.unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::UserIsBlocked));

        let disabled = ctx
            .auth
            .tokens()
            .generate_limited_token(2, Role::Customer)
            .unwrap();
        let err = ctx.auth.authenticate_limited(&disabled).await.unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::UserIsDisabled));
    }

    #[tokio::test]
    async fn test_full_token_through_limited_path_keeps_strict_checks() {
        let ctx = TestContext::new().await;
        let user = UserFixture::customer(1).build();
        ctx.store.insert_user(user.clone()).await;
        let pair = ctx
            .auth
            .tokens()
            .generate_token(1, Role::Customer, false)
            .await
            .unwrap();
        ctx.auth.logout(&user, None).await.unwrap();

        let err = ctx
            .auth
            .authenticate_limited(&pair.access_token)
            .await
            .unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::UserForceLogin));
    }

    #[tokio::test]
    async fn test_social_login_matches_email_case_insensitively() {
        let ctx = TestContext::new().await;
        ctx.store
            .insert_user(UserFixture::customer(7).email("foo@example.com").build())
            .await;

        let pair = ctx
            .auth
            .social_login(SocialProfile {
                email: Some("Foo@Example.COM".to_string()),
                email_verified: true,
                ..SocialProfile::default()
            })
            .await
            .unwrap();
        let payload = ctx.auth.tokens().verify_token(&pair.access_token).unwrap();
        assert_eq!(payload.user_id, 7);
        assert_eq!(ctx.store.user_count().await, 1);
    }
}
