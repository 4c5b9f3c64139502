use super::ethereum_provider::NetworkClient;
use crate::errors::classify::classify_kind;
use crate::errors::error::AppError;
use crate::errors::retry::{is_retryable, RetryPolicy};
use crate::log_warn;
use async_trait::async_trait;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Address, Bytes, TransactionReceipt, H256, U256, U64};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// 重试适配器：包装任意 NetworkClient，仅对分类为可重试的失败
/// （网络/未知）做指数退避重试；确定性失败立即上抛。
pub struct RetryAdapter {
    inner: Arc<dyn NetworkClient>,
    policy: RetryPolicy,
}

impl RetryAdapter {
    pub fn new(inner: Arc<dyn NetworkClient>, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            policy: RetryPolicy::new(max_retries, base_delay),
        }
    }

    async fn retry_call<T, F, Fut>(&self, mut f: F) -> Result<T, AppError>
    where
        T: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, AppError>> + Send,
    {
        let mut last_error: Option<AppError> = None;
        for attempt in 0..=self.policy.max_retries {
            if attempt > 0 {
                let delay = self.policy.backoff(attempt);
                log_warn!(
                    "RPC 调用失败，正在进行第 {} 次重试，等待 {:?}...",
                    attempt,
                    delay
                );
                sleep(delay).await;
            }
            match f().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !is_retryable(classify_kind(&e)) {
                        return Err(e);
                    }
                    log_warn!("RPC 调用失败 (第 {} 次): {:?}", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| AppError::Internal("重试循环未执行任何尝试".to_string())))
    }
}

#[async_trait]
impl NetworkClient for RetryAdapter {
    async fn get_block_number(&self) -> Result<U64, AppError> {
        self.retry_call(|| {
            let inner = Arc::clone(&self.inner);
            async move { inner.get_block_number().await }
        })
        .await
    }

    async fn get_balance(&self, address: Address) -> Result<U256, AppError> {
        self.retry_call(|| {
            let inner = Arc::clone(&self.inner);
            async move { inner.get_balance(address).await }
        })
        .await
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, AppError> {
        self.retry_call(|| {
            let inner = Arc::clone(&self.inner);
            async move { inner.get_code(address).await }
        })
        .await
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<Option<TransactionReceipt>, AppError> {
        self.retry_call(|| {
            let inner = Arc::clone(&self.inner);
            async move { inner.get_transaction_receipt(tx_hash).await }
        })
        .await
    }

    async fn get_chain_id(&self) -> Result<U256, AppError> {
        self.retry_call(|| {
            let inner = Arc::clone(&self.inner);
            async move { inner.get_chain_id().await }
        })
        .await
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, AppError> {
        self.retry_call(|| {
            let inner = Arc::clone(&self.inner);
            let tx = tx.clone();
            async move { inner.estimate_gas(&tx).await }
        })
        .await
    }

    async fn estimate_eip1559_fees(&self) -> Result<(U256, U256), AppError> {
        self.retry_call(|| {
            let inner = Arc::clone(&self.inner);
            async move { inner.estimate_eip1559_fees().await }
        })
        .await
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, AppError> {
        self.retry_call(|| {
            let inner = Arc::clone(&self.inner);
            let tx = tx.clone();
            async move { inner.call(&tx).await }
        })
        .await
    }

    async fn block_gas_limit(&self) -> Result<U256, AppError> {
        self.retry_call(|| {
            let inner = Arc::clone(&self.inner);
            async move { inner.block_gas_limit().await }
        })
        .await
    }
}
