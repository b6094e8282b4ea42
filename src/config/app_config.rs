//! # 应用配置结构定义

use serde::{Deserialize, Serialize};

/// 应用主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 数据库配置
    pub database: super::DatabaseConfig,
    /// 缓存配置
    pub cache: CacheConfig,
    /// JWT 令牌配置
    pub jwt: JwtConfig,
    /// 一次性验证码配置
    pub otp: OtpConfig,
    /// 密码与随机凭据配置
    pub security: SecurityConfig,
    /// 通知投递配置
    pub notifier: NotifierConfig,
    /// 第三方登录配置
    pub social: SocialConfig,
}

/// 缓存类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    /// 内存缓存
    #[default]
    Memory,
    /// Redis缓存
    Redis,
}

/// 缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 缓存类型
    pub cache_type: CacheType,
    /// 内存缓存最大条目数
    pub memory_max_entries: usize,
    /// Redis 缓存配置
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: CacheType::Memory,
            memory_max_entries: 10000,
            redis: None,
        }
    }
}

/// Redis配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis连接URL
    pub url: String,
    /// 连接池大小
    pub pool_size: u32,
    /// 连接超时时间（秒）
    pub connection_timeout: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
            pool_size: 10,
            connection_timeout: 10,
        }
    }
}

/// JWT 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// 签名密钥
    pub secret_key: String,
    /// 签名算法：HS256 / HS384 / HS512
    pub algorithm: String,
    /// 访问令牌有效期（秒）
    pub access_token_lifetime: u64,
    /// 刷新令牌有效期（秒）
    pub refresh_token_lifetime: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            algorithm: "HS256".to_string(),
            access_token_lifetime: 3600,
            refresh_token_lifetime: 36000,
        }
    }
}

/// 一次性验证码配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OtpConfig {
    /// 验证码位数
    pub length: usize,
    /// 有效期（秒）
    pub window: u64,
    /// 最多允许的错误次数
    pub max_retries: i64,
    /// 测试模式：固定验证码且不投递
    pub test_mode: bool,
    /// 测试模式下的固定验证码
    pub test_code: String,
    /// 测试模式下的有效期（秒）
    pub test_window: u64,
    /// 短信模板，`{code}` 会被替换为验证码
    pub sms_template: String,
    /// 账户验证邮件标题
    pub email_subject_verification: String,
    /// 重置密码邮件标题
    pub email_subject_reset_password: String,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            length: 5,
            window: 120,
            max_retries: 10,
            test_mode: false,
            test_code: "12345".to_string(),
            test_window: 50,
            sms_template: "Your verification code: {code}".to_string(),
            email_subject_verification: "Verification code".to_string(),
            email_subject_reset_password: "Reset password code".to_string(),
        }
    }
}

/// 安全相关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// bcrypt 计算成本
    pub bcrypt_cost: u32,
    /// 第三方登录用户随机密码长度
    pub random_password_length: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: bcrypt::DEFAULT_COST,
            random_password_length: 16,
        }
    }
}

/// 通知投递方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    /// 仅写日志
    #[default]
    Log,
    /// HTTP 回调
    Webhook,
}

/// 通知投递配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// 投递方式
    pub kind: NotifierKind,
    /// 短信投递地址
    pub sms_url: Option<String>,
    /// 邮件投递地址
    pub email_url: Option<String>,
    /// 发件人
    pub sender_email: String,
    /// 请求超时（秒）
    pub timeout: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            kind: NotifierKind::Log,
            sms_url: None,
            email_url: None,
            sender_email: "no-reply@localhost".to_string(),
            timeout: 10,
        }
    }
}

/// 第三方登录配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialConfig {
    /// Google 登录
    pub google: Option<GoogleConfig>,
    /// Facebook 登录
    pub facebook: Option<FacebookConfig>,
}

/// Google OAuth 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub tokeninfo_url: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v3/userinfo".to_string(),
            tokeninfo_url: "https://oauth2.googleapis.com/tokeninfo".to_string(),
        }
    }
}

/// Facebook OAuth 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FacebookConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub graph_url: String,
}

impl Default for FacebookConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            graph_url: "https://graph.facebook.com/v18.0".to_string(),
        }
    }
}

impl AppConfig {
    /// Redis 连接地址（未配置时使用默认值）
    #[must_use]
    pub fn redis_url(&self) -> String {
        self.cache
            .redis
            .as_ref()
            .map_or_else(|| RedisConfig::default().url, |redis| redis.url.clone())
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.is_empty() {
            return Err("database.url must not be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("database.max_connections must be greater than 0".to_string());
        }
        if self.jwt.secret_key.trim().is_empty() {
            return Err("jwt.secret_key must be configured".to_string());
        }
        if !matches!(self.jwt.algorithm.as_str(), "HS256" | "HS384" | "HS512") {
            return Err(format!("unsupported jwt.algorithm: {}", self.jwt.algorithm));
        }
        if self.jwt.access_token_lifetime == 0 || self.jwt.refresh_token_lifetime == 0 {
            return Err("token lifetimes must be greater than 0".to_string());
        }
        if !(1..=10).contains(&self.otp.length) {
            return Err(format!("otp.length must be within 1..=10, got {}", self.otp.length));
        }
        if self.otp.window == 0 || self.otp.test_window == 0 {
            return Err("otp windows must be greater than 0".to_string());
        }
        if self.otp.max_retries <= 0 {
            return Err("otp.max_retries must be greater than 0".to_string());
        }
        if self.otp.test_mode && self.otp.test_code.is_empty() {
            return Err("otp.test_code must be set when otp.test_mode is enabled".to_string());
        }
        if !(4..=31).contains(&self.security.bcrypt_cost) {
            return Err(format!(
                "security.bcrypt_cost must be within 4..=31, got {}",
                self.security.bcrypt_cost
            ));
        }
        if self.cache.cache_type == CacheType::Memory && self.cache.memory_max_entries == 0 {
            return Err("cache.memory_max_entries must be greater than 0".to_string());
        }
        if self.notifier.kind == NotifierKind::Webhook
            && self.notifier.sms_url.is_none()
            && self.notifier.email_url.is_none()
        {
            return Err("webhook notifier needs sms_url or email_url".to_string());
        }
        Ok(())
    }
}
