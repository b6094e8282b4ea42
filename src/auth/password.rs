//! # 密码工具
//!
//! bcrypt 哈希与校验，以及第三方注册用户的随机密码

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::error::Result;

/// 计算密码哈希
pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    Ok(bcrypt::hash(password, cost)?)
}

/// 校验密码；哈希格式错误视为不匹配
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// 生成字母数字随机密码
#[must_use]
pub fn random_password(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
