//! # 数据库模块
//!
//! 数据库连接和迁移管理

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::{AppError, Result};
use crate::{lerror, linfo, lwarn, logging::{LogComponent, LogStage}};

/// 日志中隐藏连接串里的凭据
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

/// 初始化数据库连接
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    linfo!(
        "system",
        LogStage::Database,
        LogComponent::Database,
        "connect",
        &format!("正在连接数据库: {}", redact_url(&config.url))
    );

    config.ensure_database_path()?;

    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .map_err(|e| AppError::database_with_source("数据库连接失败", e))?;

    linfo!(
        "system",
        LogStage::Database,
        LogComponent::Database,
        "connected",
        "数据库连接成功"
    );
    Ok(db)
}

/// 运行数据库迁移（包含默认权限数据）
pub async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    linfo!(
        "system",
        LogStage::Database,
        LogComponent::Database,
        "migrate_start",
        "开始运行数据库迁移..."
    );

    match ::migration::Migrator::up(db, None).await {
        Ok(()) => {
            linfo!(
                "system",
                LogStage::Database,
                LogComponent::Database,
                "migrate_done",
                "数据库迁移完成"
            );
            Ok(())
        }
        Err(e) => {
            lerror!(
                "system",
                LogStage::Database,
                LogComponent::Database,
                "migrate_failed",
                &format!("数据库迁移失败: {e}")
            );
            Err(AppError::database_with_source("数据库迁移失败", e))
        }
    }
}

/// 检查是否有未应用的迁移
pub async fn check_database_status(db: &DatabaseConnection) -> Result<usize> {
    let pending = ::migration::Migrator::get_pending_migrations(db)
        .await
        .map_err(|e| AppError::database_with_source("查询迁移状态失败", e))?;

    if !pending.is_empty() {
        lwarn!(
            "system",
            LogStage::Database,
            LogComponent::Database,
            "pending_migrations",
            &format!("有 {} 个待应用的迁移", pending.len())
        );
    }
    Ok(pending.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> DatabaseConfig {
        DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..DatabaseConfig::default()
        }
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("postgres://user:pw@db:5432/app"),
            "postgres://***@db:5432/app"
        );
        assert_eq!(redact_url("sqlite::memory:"), "sqlite::memory:");
    }

    #[tokio::test]
    async fn test_migrations_apply_cleanly() {
        let db = init_database(&memory_config()).await.unwrap();
        run_migrations(&db).await.unwrap();
        assert_eq!(check_database_status(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("auth.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", path.display()),
            ..DatabaseConfig::default()
        };

        init_database(&config).await.unwrap();
        assert!(path.exists());
    }
}
