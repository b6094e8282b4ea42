//! # Commerce Auth 主程序
//!
//! 运维命令行：数据库迁移、配置检查、密码哈希与令牌签发

use clap::{Parser, Subcommand};
use std::sync::Arc;

use commerce_auth::{
    AppError, Result, Role,
    auth::{TokenService, password::hash_password},
    cache::CacheBackend,
    config::{self, AppConfig},
    database, lerror, linfo,
    logging::{self, LogComponent, LogStage},
    store::DatabaseStore,
};

#[derive(Parser)]
#[command(name = "commerce-auth", version, about = "Commerce authentication core tooling")]
struct Cli {
    /// 日志级别（RUST_LOG 优先）
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 连接数据库并执行迁移（包含默认实体目录与分组）
    Migrate,
    /// 加载并校验配置，检查缓存连通性
    CheckConfig,
    /// 计算 bcrypt 密码哈希
    HashPassword {
        password: String,
        #[arg(long, default_value_t = bcrypt::DEFAULT_COST)]
        cost: u32,
    },
    /// 为指定用户签发令牌
    IssueToken {
        #[arg(long)]
        user_id: i32,
        #[arg(long)]
        role: Role,
        /// 只签发受限令牌（仅能修改密码）
        #[arg(long)]
        limited: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志系统
    logging::init_logging(cli.log_level.as_deref());

    let result = match cli.command {
        Command::Migrate => run_migrate().await,
        Command::CheckConfig => run_check_config().await,
        Command::HashPassword { password, cost } => {
            println!("{}", hash_password(&password, cost)?);
            Ok(())
        }
        Command::IssueToken {
            user_id,
            role,
            limited,
        } => run_issue_token(user_id, role, limited).await,
    };

    if let Err(e) = &result {
        lerror!(
            "system",
            LogStage::Shutdown,
            LogComponent::Main,
            "command_failed",
            &format!("命令执行失败: {e}")
        );
    }
    result
}

fn load() -> Result<Arc<AppConfig>> {
    let config = config::load_config()?;
    linfo!(
        "system",
        LogStage::Configuration,
        LogComponent::Config,
        "config_loaded",
        &format!(
            "配置已加载 (cache={:?}, otp_test_mode={})",
            config.cache.cache_type, config.otp.test_mode
        )
    );
    Ok(config)
}

async fn run_migrate() -> Result<()> {
    let config = load()?;
    let db = database::init_database(&config.database).await?;
    database::run_migrations(&db).await?;
    database::check_database_status(&db).await?;

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "migrate_complete",
        "数据库初始化完成"
    );
    Ok(())
}

async fn run_check_config() -> Result<()> {
    let config = load()?;
    let cache = CacheBackend::from_config(&config.cache).await?;
    cache.ping().await?;

    linfo!(
        "system",
        LogStage::Configuration,
        LogComponent::Config,
        "config_ok",
        &format!("配置有效，缓存后端 {} 可用", cache.kind())
    );
    Ok(())
}

async fn run_issue_token(user_id: i32, role: Role, limited: bool) -> Result<()> {
    let config = load()?;
    let cache = Arc::new(CacheBackend::from_config(&config.cache).await?);
    let db = database::init_database(&config.database).await?;
    let tokens = TokenService::new(&config.jwt, cache, Arc::new(DatabaseStore::new(db)))?;

    let output = if limited {
        serde_json::json!({ "access_token": tokens.generate_limited_token(user_id, role)? })
    } else {
        serde_json::to_value(tokens.generate_token(user_id, role, false).await?)
            .map_err(|e| AppError::serialization("令牌序列化失败", e))?
    };
    println!("{output}");
    Ok(())
}
