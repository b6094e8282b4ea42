//! # 认证类型定义
//!
//! 定义认证核心使用的数据结构：用户名、用户、权限、分组、令牌

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::auth::permissions::Role;
use crate::error::AuthError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap_or_else(|_| unreachable!())
});

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{7,15}$").unwrap_or_else(|_| unreachable!()));

/// 登录用户名：邮箱或手机号，在请求边界解析一次
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Username {
    /// 邮箱（小写）
    Email(String),
    /// 手机号（`00` 前缀已转换为 `+`）
    Phone(String),
}

impl Username {
    /// 解析原始输入
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AuthError::InvalidUsername(raw.to_string()));
        }

        if trimmed.contains('@') {
            let email = trimmed.to_lowercase();
            if !EMAIL_RE.is_match(&email) {
                return Err(AuthError::InvalidUsername(raw.to_string()));
            }
            return Ok(Self::Email(email));
        }

        let compact: String = trimmed
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
            .collect();
        let phone = match compact.strip_prefix("00") {
            Some(rest) => format!("+{rest}"),
            None => compact,
        };
        if !PHONE_RE.is_match(&phone) {
            return Err(AuthError::InvalidUsername(raw.to_string()));
        }
        Ok(Self::Phone(phone))
    }

    /// 规范化后的值（同时也是验证码缓存键）
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Email(value) | Self::Phone(value) => value,
        }
    }

    /// 是否为邮箱
    #[must_use]
    pub const fn is_email(&self) -> bool {
        matches!(self, Self::Email(_))
    }

    /// 是否为手机号
    #[must_use]
    pub const fn is_phone(&self) -> bool {
        matches!(self, Self::Phone(_))
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

impl FromStr for Username {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// 用户审核状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Pending,
    #[default]
    JustJoined,
    JoinedClub,
    Confirmed,
    Rejected,
}

impl UserStatus {
    /// 数据库存储值
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::JustJoined => "just_joined",
            Self::JoinedClub => "joined_club",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
        }
    }

    /// 从存储值解析
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "just_joined" => Some(Self::JustJoined),
            "joined_club" => Some(Self::JoinedClub),
            "confirmed" => Some(Self::Confirmed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// 账户来源
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginType {
    #[default]
    Direct,
    Social,
}

impl LoginType {
    /// 数据库存储值
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Social => "social",
        }
    }

    /// 从存储值解析
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(Self::Direct),
            "social" => Some(Self::Social),
            _ => None,
        }
    }
}

/// 单个实体上的权限授予
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// 实体代码名
    pub entity: String,
    /// 规则集合
    pub rules: BTreeSet<String>,
}

impl Permission {
    /// 构造权限
    pub fn new<I, S>(entity: impl Into<String>, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entity: entity.into(),
            rules: rules.into_iter().map(Into::into).collect(),
        }
    }
}

/// 权限分组
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<Permission>,
    pub is_enable: bool,
}

impl Group {
    /// 构造启用状态的分组
    #[must_use]
    pub fn new(name: impl Into<String>, permissions: Vec<Permission>) -> Self {
        Self {
            name: name.into(),
            description: None,
            permissions,
            is_enable: true,
        }
    }
}

/// 分组的部分更新
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupUpdate {
    pub description: Option<String>,
    pub permissions: Option<Vec<Permission>>,
    pub is_enable: Option<bool>,
}

/// 业务实体及其合法规则词表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRules {
    pub code_name: String,
    pub valid_rules: BTreeSet<String>,
}

impl EntityRules {
    /// 构造实体词表
    pub fn new<I, S>(code_name: impl Into<String>, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            code_name: code_name.into(),
            valid_rules: rules.into_iter().map(Into::into).collect(),
        }
    }
}

/// 用户（认证核心关心的字段）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub email: Option<String>,
    pub mobile_number: Option<String>,
    #[serde(skip_serializing)]
    pub hashed_password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub role: Role,
    pub groups: Vec<String>,
    pub permissions: Vec<Permission>,
    pub is_enable: bool,
    pub is_blocked: bool,
    pub is_force_login: bool,
    pub is_force_change_password: bool,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub user_status: UserStatus,
    pub login_type: LoginType,
    pub login_datetime: Option<DateTime<Utc>>,
    pub last_login_datetime: Option<DateTime<Utc>>,
}

impl User {
    /// 是否匹配给定用户名
    #[must_use]
    pub fn matches_username(&self, username: &Username) -> bool {
        match username {
            Username::Email(email) => self.email.as_deref() == Some(email.as_str()),
            Username::Phone(phone) => self.mobile_number.as_deref() == Some(phone.as_str()),
        }
    }

    /// 展示用名字
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.first_name.as_deref().filter(|name| !name.is_empty())
    }
}

/// 新建用户所需字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: Option<String>,
    pub mobile_number: Option<String>,
    pub hashed_password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub role: Role,
    pub groups: Vec<String>,
    pub permissions: Vec<Permission>,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub user_status: UserStatus,
    pub login_type: LoginType,
}

/// 客户默认分组
pub const CUSTOMER_GROUP: &str = "customer";

impl NewUser {
    /// 以用户名注册的客户账户
    #[must_use]
    pub fn customer(username: &Username) -> Self {
        let (email, mobile_number) = match username {
            Username::Email(email) => (Some(email.clone()), None),
            Username::Phone(phone) => (None, Some(phone.clone())),
        };
        Self {
            email,
            mobile_number,
            hashed_password: None,
            first_name: None,
            last_name: None,
            avatar: None,
            role: Role::Customer,
            groups: vec![CUSTOMER_GROUP.to_string()],
            permissions: Vec::new(),
            email_verified: false,
            phone_verified: false,
            user_status: UserStatus::JustJoined,
            login_type: LoginType::Direct,
        }
    }
}

/// 一次登录记录：本次时间与上次时间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginStamp {
    pub at: DateTime<Utc>,
    pub previous: Option<DateTime<Utc>>,
}

/// 用户的部分更新，`None` 表示保持不变
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub login: Option<LoginStamp>,
    pub is_force_login: Option<bool>,
    pub is_force_change_password: Option<bool>,
    pub email_verified: Option<bool>,
    pub phone_verified: Option<bool>,
    pub hashed_password: Option<String>,
}

impl UserChanges {
    /// 登录成功：轮换登录时间并清除强制下线标记
    #[must_use]
    pub fn login(user: &User, now: DateTime<Utc>) -> Self {
        Self {
            login: Some(LoginStamp {
                at: now,
                previous: user.login_datetime,
            }),
            is_force_login: Some(false),
            ..Self::default()
        }
    }

    /// 标记用户名对应的渠道已验证
    #[must_use]
    pub fn verified(mut self, username: &Username) -> Self {
        match username {
            Username::Email(_) => self.email_verified = Some(true),
            Username::Phone(_) => self.phone_verified = Some(true),
        }
        self
    }

    /// 应用到内存中的用户
    pub fn apply_to(&self, user: &mut User) {
        if let Some(stamp) = self.login {
            user.login_datetime = Some(stamp.at);
            user.last_login_datetime = stamp.previous;
        }
        if let Some(value) = self.is_force_login {
            user.is_force_login = value;
        }
        if let Some(value) = self.is_force_change_password {
            user.is_force_change_password = value;
        }
        if let Some(value) = self.email_verified {
            user.email_verified = value;
        }
        if let Some(value) = self.phone_verified {
            user.phone_verified = value;
        }
        if let Some(hash) = &self.hashed_password {
            user.hashed_password = Some(hash.clone());
        }
    }
}

/// 令牌对
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl TokenPair {
    /// 构造 bearer 令牌对
    #[must_use]
    pub fn bearer(access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// 访问令牌载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenPayload {
    pub user_id: i32,
    pub role: Role,
    pub limited: bool,
    pub iat: i64,
    pub exp: i64,
}

/// 验证码用途，仅决定投递模板
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpRequestType {
    #[default]
    Verification,
    ResetPassword,
}

/// 第三方身份提供方验证过的资料
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialProfile {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub email_verified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("User@Example.com", Username::Email("user@example.com".to_string()))]
    #[case("+989123456789", Username::Phone("+989123456789".to_string()))]
    #[case("00989123456789", Username::Phone("+989123456789".to_string()))]
    #[case(" 0912-345-6789 ", Username::Phone("09123456789".to_string()))]
    fn test_username_parse(#[case] raw: &str, #[case] expected: Username) {
        assert_eq!(Username::parse(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("not-an-email@")]
    #[case("12ab34")]
    fn test_username_parse_rejects(#[case] raw: &str) {
        assert!(matches!(
            Username::parse(raw),
            Err(AuthError::InvalidUsername(_))
        ));
    }

    #[test]
    fn test_new_customer_from_phone() {
        let username = Username::parse("+989123456789").unwrap();
        let new_user = NewUser::customer(&username);
        assert_eq!(new_user.mobile_number.as_deref(), Some("+989123456789"));
        assert_eq!(new_user.email, None);
        assert_eq!(new_user.role, Role::Customer);
        assert_eq!(new_user.groups, vec![CUSTOMER_GROUP.to_string()]);
    }

    #[test]
    fn test_login_changes_shift_timestamps() {
        let earlier = Utc::now() - chrono::Duration::hours(3);
        let now = Utc::now();
        let mut user = crate::testing::UserFixture::customer(1).build();
        user.login_datetime = Some(earlier);
        user.is_force_login = true;

        UserChanges::login(&user, now).apply_to(&mut user);

        assert_eq!(user.login_datetime, Some(now));
        assert_eq!(user.last_login_datetime, Some(earlier));
        assert!(!user.is_force_login);
    }

    #[test]
    fn test_user_serialization_hides_password() {
        let user = crate::testing::UserFixture::customer(1)
            .password_hash("$2b$04$hash")
            .build();
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("hashed_password").is_none());
    }
}
