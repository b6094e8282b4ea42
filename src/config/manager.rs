//! # 配置管理器
//!
//! 统一的配置加载入口：TOML 文件 → 环境变量覆盖 → 校验

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{AppConfig, CacheType, RedisConfig};
use crate::error::{AppError, Result};

/// 配置文件路径环境变量
pub const CONFIG_PATH_ENV: &str = "COMMERCE_AUTH_CONFIG";

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// 当前配置
    config: Arc<AppConfig>,
    /// 配置来源文件
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// 创建配置管理器
    ///
    /// 优先使用 `COMMERCE_AUTH_CONFIG` 指定的文件，否则读取
    /// `config/config.{RUST_ENV}.toml`；默认路径不存在时退回内置默认值。
    pub fn new() -> Result<Self> {
        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            return Self::from_file(path);
        }

        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let default_path = PathBuf::from(format!("config/config.{env_name}.toml"));
        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            warn!(
                "配置文件不存在，使用默认配置: {}",
                default_path.display()
            );
            Self::from_config(AppConfig::default(), None)
        }
    }

    /// 从指定文件创建配置管理器
    pub fn from_file(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref();
        let config = Self::load_config_file(config_path)?;
        Self::from_config(config, Some(config_path.to_path_buf()))
    }

    /// 从 TOML 文本创建（测试与嵌入场景）
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        Self::from_config(config, None)
    }

    fn from_config(mut config: AppConfig, source: Option<PathBuf>) -> Result<Self> {
        Self::apply_env_overrides(&mut config)?;
        super::validate_config(&config)?;

        info!(
            "配置加载完成: cache={:?}, otp_test_mode={}",
            config.cache.cache_type, config.otp.test_mode
        );

        Ok(Self {
            config: Arc::new(config),
            source,
        })
    }

    /// 获取配置
    #[must_use]
    pub fn get_config(&self) -> Arc<AppConfig> {
        Arc::clone(&self.config)
    }

    /// 配置来源文件
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    fn load_config_file(path: &Path) -> Result<AppConfig> {
        if !path.exists() {
            return Err(AppError::config(format!(
                "配置文件不存在: {}",
                path.display()
            )));
        }

        let config_content = std::fs::read_to_string(path).map_err(|e| {
            AppError::config_with_source(format!("读取配置文件失败: {}", path.display()), e)
        })?;

        toml::from_str(&config_content).map_err(|e| {
            AppError::config_with_source(format!("TOML解析失败 - 配置文件: {}", path.display()), e)
        })
    }

    /// 应用环境变量覆盖
    fn apply_env_overrides(config: &mut AppConfig) -> Result<()> {
        Self::apply_overrides(config, |key| env::var(key).ok())
    }

    /// 按键查找覆盖值并写入配置
    fn apply_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("COMMERCE_AUTH_DATABASE_URL") {
            debug!("应用环境变量覆盖: database.url");
            config.database.url = url;
        }

        if let Some(url) = lookup("COMMERCE_AUTH_REDIS_URL") {
            debug!("应用环境变量覆盖: cache.redis.url");
            config.cache.cache_type = CacheType::Redis;
            config
                .cache
                .redis
                .get_or_insert_with(RedisConfig::default)
                .url = url;
        }

        if let Some(secret) = lookup("COMMERCE_AUTH_JWT_SECRET") {
            debug!("应用环境变量覆盖: jwt.secret_key = ***");
            config.jwt.secret_key = secret;
        }

        if let Some(value) = lookup("COMMERCE_AUTH_OTP_TEST_MODE") {
            config.otp.test_mode = value.parse::<bool>().map_err(|e| {
                AppError::config_with_source(
                    format!("COMMERCE_AUTH_OTP_TEST_MODE 取值无效: {value}"),
                    e,
                )
            })?;
            debug!("应用环境变量覆盖: otp.test_mode = {}", config.otp.test_mode);
        }

        Ok(())
    }
}
