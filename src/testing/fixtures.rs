//! # 测试数据 Fixtures
//!
//! 提供测试用的数据结构和预设数据

use crate::auth::permissions::Role;
use crate::auth::types::{CUSTOMER_GROUP, LoginType, Permission, User, UserStatus};
use crate::config::{AppConfig, JwtConfig, OtpConfig, SecurityConfig};

/// 测试用签名密钥
pub const TEST_JWT_SECRET: &str = "commerce-auth-test-secret";

/// 测试模式下的固定验证码
pub const TEST_OTP_CODE: &str = "12345";

/// 用户测试数据构建器
pub struct UserFixture {
    user: User,
}

impl UserFixture {
    /// 创建指定角色的用户（邮箱已验证、已启用）
    #[must_use]
    pub fn new(id: i32, role: Role) -> Self {
        Self {
            user: User {
                id,
                email: Some(format!("user{id}@example.com")),
                mobile_number: None,
                hashed_password: None,
                first_name: None,
                last_name: None,
                avatar: None,
                role,
                groups: vec![CUSTOMER_GROUP.to_string()],
                permissions: Vec::new(),
                is_enable: true,
                is_blocked: false,
                is_force_login: false,
                is_force_change_password: false,
                email_verified: true,
                phone_verified: true,
                user_status: UserStatus::Confirmed,
                login_type: LoginType::Direct,
                login_datetime: None,
                last_login_datetime: None,
            },
        }
    }

    /// 客户
    #[must_use]
    pub fn customer(id: i32) -> Self {
        Self::new(id, Role::Customer)
    }

    /// 管理员
    #[must_use]
    pub fn admin(id: i32) -> Self {
        Self::new(id, Role::Admin).groups(&["super_admin"])
    }

    /// 设置邮箱
    #[must_use]
    pub fn email(mut self, email: &str) -> Self {
        self.user.email = Some(email.to_string());
        self
    }

    /// 设置手机号
    #[must_use]
    pub fn phone(mut self, phone: &str) -> Self {
        self.user.mobile_number = Some(phone.to_string());
        self
    }

    /// 设置密码哈希
    #[must_use]
    pub fn password_hash(mut self, hash: &str) -> Self {
        self.user.hashed_password = Some(hash.to_string());
        self
    }

    /// 设置所属分组
    #[must_use]
    pub fn groups(mut self, groups: &[&str]) -> Self {
        self.user.groups = groups.iter().map(ToString::to_string).collect();
        self
    }

    /// 追加直接权限
    #[must_use]
    pub fn permission(mut self, permission: Permission) -> Self {
        self.user.permissions.push(permission);
        self
    }

    /// 设置启用状态
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.user.is_enable = enabled;
        self
    }

    /// 设置封禁状态
    #[must_use]
    pub const fn blocked(mut self, blocked: bool) -> Self {
        self.user.is_blocked = blocked;
        self
    }

    /// 设置邮箱验证状态
    #[must_use]
    pub const fn email_verified(mut self, verified: bool) -> Self {
        self.user.email_verified = verified;
        self
    }

    /// 设置手机验证状态
    #[must_use]
    pub const fn phone_verified(mut self, verified: bool) -> Self {
        self.user.phone_verified = verified;
        self
    }

    /// 设置审核状态
    #[must_use]
    pub const fn status(mut self, status: UserStatus) -> Self {
        self.user.user_status = status;
        self
    }

    /// 构建用户
    #[must_use]
    pub fn build(self) -> User {
        self.user
    }
}

/// 测试用 JWT 配置
#[must_use]
pub fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret_key: TEST_JWT_SECRET.to_string(),
        ..JwtConfig::default()
    }
}

/// 测试用完整配置：验证码测试模式、低 bcrypt 成本
#[must_use]
pub fn test_app_config() -> AppConfig {
    AppConfig {
        jwt: test_jwt_config(),
        otp: OtpConfig {
            test_mode: true,
            test_code: TEST_OTP_CODE.to_string(),
            ..OtpConfig::default()
        },
        security: SecurityConfig {
            bcrypt_cost: 4,
            ..SecurityConfig::default()
        },
        ..AppConfig::default()
    }
}
