//! # 配置管理模块
//!
//! 处理应用配置加载、验证和管理

mod app_config;
mod database;
mod manager;

pub use app_config::{
    AppConfig, CacheConfig, CacheType, FacebookConfig, GoogleConfig, JwtConfig, NotifierConfig,
    NotifierKind, OtpConfig, RedisConfig, SecurityConfig, SocialConfig,
};
pub use database::DatabaseConfig;
pub use manager::{CONFIG_PATH_ENV, ConfigManager};

/// 加载配置（文件 + 环境变量覆盖）
pub fn load_config() -> crate::error::Result<std::sync::Arc<AppConfig>> {
    Ok(ConfigManager::new()?.get_config())
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> crate::error::Result<()> {
    config.validate().map_err(crate::error::AppError::config)
}
