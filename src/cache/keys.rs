//! # 缓存键命名规范
//!
//! 认证核心使用的缓存键统一在 `auth:` 命名空间下生成

use std::fmt;

/// 缓存键类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheKey {
    /// 刷新令牌 - `auth:refresh:{token}`
    RefreshToken { token: String },

    /// 一次性验证码 - `auth:otp:{username}`
    Otp { username: String },
}

impl CacheKey {
    /// 生成缓存键字符串
    #[must_use]
    pub fn build(&self) -> String {
        match self {
            Self::RefreshToken { token } => format!("auth:refresh:{token}"),
            Self::Otp { username } => format!("auth:otp:{username}"),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.build())
    }
}

/// 缓存键构建器
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// 刷新令牌缓存键
    #[must_use]
    pub fn refresh_token(token: &str) -> CacheKey {
        CacheKey::RefreshToken {
            token: token.to_string(),
        }
    }

    /// 验证码缓存键（用户名为手机号或邮箱）
    #[must_use]
    pub fn otp(username: &str) -> CacheKey {
        CacheKey::Otp {
            username: username.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_building() {
        assert_eq!(
            CacheKeyBuilder::otp("+989123456789").build(),
            "auth:otp:+989123456789"
        );
        assert_eq!(
            CacheKeyBuilder::refresh_token("abc.def").to_string(),
            "auth:refresh:abc.def"
        );
    }
}
