//! # 一次性验证码服务
//!
//! 验证码记录保存在缓存哈希 `{code, retry}` 中：
//! - 同一用户名同时只允许一条存活记录
//! - 错误次数达到上限后记录锁定，直到自然过期
//! - 验证成功后立即删除（单次有效）

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::types::{OtpRequestType, Username};
use crate::cache::{CacheBackend, CacheKeyBuilder, HashCheck};
use crate::config::OtpConfig;
use crate::error::{AuthError, Result};
use crate::notify::{Notifier, OtpMessage, render_email, render_sms};
use crate::{ldebug, linfo, lwarn, logging::{LogComponent, LogStage}};

const FIELD_CODE: &str = "code";
const FIELD_RETRY: &str = "retry";

/// 生成由 1-9 组成的数字验证码
#[must_use]
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'1' + rng.gen_range(0..9u8)))
        .collect()
}

/// 验证码服务
pub struct OtpService {
    cache: Arc<CacheBackend>,
    notifier: Arc<dyn Notifier>,
    config: OtpConfig,
}

impl OtpService {
    /// 创建验证码服务
    pub fn new(cache: Arc<CacheBackend>, notifier: Arc<dyn Notifier>, config: OtpConfig) -> Self {
        Self {
            cache,
            notifier,
            config,
        }
    }

    fn window(&self) -> Duration {
        if self.config.test_mode {
            Duration::from_secs(self.config.test_window)
        } else {
            Duration::from_secs(self.config.window)
        }
    }

    /// 申请验证码；已有存活记录时拒绝
    pub async fn request(
        &self,
        username: &Username,
        request_type: OtpRequestType,
        recipient_name: Option<&str>,
    ) -> Result<()> {
        let code = if self.config.test_mode {
            self.config.test_code.clone()
        } else {
            generate_code(self.config.length)
        };

        let key = CacheKeyBuilder::otp(username.value()).build();
        let created = self
            .cache
            .hash_set_nx(
                &key,
                &[(FIELD_CODE, code.clone()), (FIELD_RETRY, "0".to_string())],
                self.window(),
            )
            .await?;

        if !created {
            return Err(AuthError::OtpExists.into());
        }

        linfo!(
            "system",
            LogStage::Otp,
            LogComponent::Otp,
            "otp_requested",
            &format!("已为 {username} 生成验证码 ({request_type:?})")
        );

        if self.config.test_mode {
            return Ok(());
        }

        let message = match username {
            Username::Phone(_) => render_sms(&self.config, &code),
            Username::Email(_) => render_email(&self.config, &code, request_type, recipient_name),
        };
        self.deliver(username.value().to_string(), message);

        Ok(())
    }

    /// 异步投递，失败只记录日志
    fn deliver(&self, recipient: String, message: OtpMessage) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let result = match &message {
                OtpMessage::Sms { body } => notifier.send_sms(&recipient, body).await,
                OtpMessage::Email { subject, body } => {
                    notifier.send_email(&recipient, subject, body).await
                }
            };

            if let Err(e) = result {
                lwarn!(
                    "system",
                    LogStage::Notification,
                    LogComponent::Otp,
                    "otp_delivery_failed",
                    &format!("验证码投递失败 ({recipient}): {e}")
                );
            }
        });
    }

    /// 校验验证码；成功后删除记录
    ///
    /// 比较、计数与删除在缓存侧一次完成，并发的错误尝试不会越过次数上限
    pub async fn verify(&self, username: &Username, code: &str) -> Result<()> {
        let key = CacheKeyBuilder::otp(username.value()).build();

        let outcome = self
            .cache
            .hash_check_and_take(&key, FIELD_CODE, code, FIELD_RETRY, self.config.max_retries)
            .await?;

        match outcome {
            HashCheck::Matched => {
                linfo!(
                    "system",
                    LogStage::Otp,
                    LogComponent::Otp,
                    "otp_verified",
                    &format!("{username} 验证码校验通过")
                );
                Ok(())
            }
            HashCheck::Mismatch(retries) => {
                ldebug!(
                    "system",
                    LogStage::Otp,
                    LogComponent::Otp,
                    "otp_mismatch",
                    &format!("{username} 验证码错误 ({retries}/{})", self.config.max_retries)
                );
                Err(AuthError::OtpExpiredOrInvalid.into())
            }
            HashCheck::Locked => {
                ldebug!(
                    "system",
                    LogStage::Otp,
                    LogComponent::Otp,
                    "otp_locked",
                    &format!("{username} 的验证码已锁定")
                );
                Err(AuthError::OtpExpiredOrInvalid.into())
            }
            HashCheck::Missing => Err(AuthError::OtpExpiredOrInvalid.into()),
        }
    }
}
