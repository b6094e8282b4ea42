//! # 数据库配置

use crate::error::{AppError, Result};
use crate::{linfo, logging::{LogComponent, LogStage}};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 数据库URL
    pub url: String,
    /// 最大连接数
    pub max_connections: u32,
    /// 连接超时时间（秒）
    pub connect_timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/commerce_auth.db".to_string(),
            max_connections: 10,
            connect_timeout: 30,
        }
    }
}

impl DatabaseConfig {
    /// 是否为 SQLite 文件数据库
    #[must_use]
    pub fn is_sqlite_file(&self) -> bool {
        self.url.starts_with("sqlite:") && !self.url.contains(":memory:")
    }

    /// SQLite 文件路径（去掉协议前缀与查询参数）
    #[must_use]
    pub fn sqlite_path(&self) -> Option<&Path> {
        if !self.is_sqlite_file() {
            return None;
        }
        let raw = self
            .url
            .strip_prefix("sqlite://")
            .or_else(|| self.url.strip_prefix("sqlite:"))?;
        let path = raw.split('?').next().unwrap_or(raw);
        Some(Path::new(path))
    }

    /// 确保数据库路径存在（仅对SQLite文件数据库）
    pub fn ensure_database_path(&self) -> Result<()> {
        let Some(db_path) = self.sqlite_path() else {
            return Ok(());
        };

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::config_with_source(
                        format!("无法创建数据库目录: {}", parent.display()),
                        e,
                    )
                })?;
                linfo!(
                    "system",
                    LogStage::Startup,
                    LogComponent::Database,
                    "create_db_dir",
                    &format!("创建数据库目录: {}", parent.display())
                );
            }
        }

        if !db_path.exists() {
            std::fs::File::create(db_path).map_err(|e| {
                AppError::config_with_source(
                    format!("无法创建数据库文件: {}", db_path.display()),
                    e,
                )
            })?;
            linfo!(
                "system",
                LogStage::Startup,
                LogComponent::Database,
                "create_db_file",
                &format!("数据库文件创建成功: {}", db_path.display())
            );
        }

        Ok(())
    }
}
