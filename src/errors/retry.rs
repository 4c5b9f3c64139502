//! 重试助手：只对瞬时性失败（网络/未知）做有限次指数退避重试。
//! 用户拒绝永不自动重试；确定性失败（回滚/校验）重试也不会改变结果。

use crate::errors::classify::{ClassifiedError, ErrorKind};
use crate::log_warn;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// 分类结果是否值得重试
pub fn is_retryable(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Network | ErrorKind::Unknown)
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 重试次数（不含首次尝试），默认 3 次即最多 4 次尝试
    pub max_retries: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// 第 attempt 次尝试前的退避时长：base * 2^(attempt-1) 加 0~10% 抖动
    /// 抖动可以避免多个重试任务在同一时间点“齐射” RPC 节点
    pub(crate) fn backoff(&self, attempt: usize) -> Duration {
        let exponent = (attempt.saturating_sub(1)).min(10);
        let base_ms = self.base_delay.as_millis() as u64;
        let delay_ms = base_ms.saturating_mul(1u64 << exponent);
        let jitter = rand::thread_rng().gen_range(0..=(delay_ms / 10 + 1));
        Duration::from_millis(delay_ms + jitter)
    }
}

/// 默认判定（is_retryable）的重试执行
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, op: F) -> Result<T, ClassifiedError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClassifiedError>>,
{
    with_retry_if(policy, |err| is_retryable(err.kind), op).await
}

/// 自定义判定的重试执行。判定返回 false 立即停止；
/// 用户拒绝无条件停止，不询问判定函数。
pub async fn with_retry_if<T, F, Fut, P>(
    policy: RetryPolicy,
    predicate: P,
    mut op: F,
) -> Result<T, ClassifiedError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClassifiedError>>,
    P: Fn(&ClassifiedError) -> bool,
{
    let mut last_error: Option<ClassifiedError> = None;
    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.backoff(attempt);
            log_warn!(
                "操作失败，正在进行第 {} 次重试，等待 {:?}...",
                attempt,
                delay
            );
            sleep(delay).await;
        }
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if err.kind == ErrorKind::UserRejected {
                    return Err(err);
                }
                if !predicate(&err) {
                    return Err(err);
                }
                last_error = Some(err);
            }
        }
    }
    Err(last_error
        .unwrap_or_else(|| ClassifiedError::new(ErrorKind::Unknown, "重试循环未执行任何尝试")))
}
