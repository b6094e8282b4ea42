//! # Commerce Auth
//!
//! 电商后台的认证核心：访问 / 刷新令牌、验证码登录与基于分组的权限解析

pub mod auth;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod notify;
pub mod store;
pub mod testing;

// Re-export commonly used types
pub use auth::{AuthService, Role, Scope, TokenPair, User, Username};
pub use config::AppConfig;
pub use error::{AppError, AuthError, Result};
