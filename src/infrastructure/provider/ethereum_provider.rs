use crate::config::EthereumConfig;
use crate::errors::error::AppError;
use crate::log_info;
use async_trait::async_trait;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Address, BlockNumber, Bytes, TransactionReceipt, H256, U256, U64};
use ethers_providers::{Http, Middleware, Provider};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

/// 网络客户端能力：余额/代码/回执查询、费用估算、只读调用。
/// 任何兼容 JSON-RPC 的节点实现都可以替换。
#[async_trait]
pub trait NetworkClient: Send + Sync {
    async fn get_block_number(&self) -> Result<U64, AppError>;
    async fn get_balance(&self, address: Address) -> Result<U256, AppError>;
    async fn get_code(&self, address: Address) -> Result<Bytes, AppError>;
    async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<Option<TransactionReceipt>, AppError>;
    async fn get_chain_id(&self) -> Result<U256, AppError>;

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, AppError>;
    async fn estimate_eip1559_fees(&self) -> Result<(U256, U256), AppError>;
    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, AppError>;
    /// 当前区块的 gas 上限，用于显式 gas 覆盖值的上限校验
    async fn block_gas_limit(&self) -> Result<U256, AppError>;
}

/// 根据 rpc_url 和 api_keys 组装各节点端点
pub(crate) fn endpoint_urls(config: &EthereumConfig) -> Result<Vec<String>, AppError> {
    let keys: Vec<&str> = config
        .api_keys
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .collect();

    if keys.is_empty() {
        return Ok(vec![config.rpc_url.clone()]);
    }

    keys.iter()
        .map(|key| {
            let url = if config.rpc_url.ends_with('/') {
                format!("{}{}", config.rpc_url, key)
            } else {
                format!("{}/{}", config.rpc_url, key)
            };
            // 先做一次解析校验，避免把坏 URL 带进 Provider
            Url::parse(&url)
                .map(|u| u.to_string())
                .map_err(|e| AppError::InvalidUrl(format!("{}: {}", url, e)))
        })
        .collect()
}

/// HTTP Provider 池：每个 api key 一个实例，原子下标轮询
pub struct EthereumProvider {
    providers: Vec<Arc<Provider<Http>>>,
    index: AtomicUsize,
}

impl EthereumProvider {
    pub fn new(config: &EthereumConfig) -> Result<Self, AppError> {
        let providers = endpoint_urls(config)?
            .iter()
            .map(|url| {
                Provider::<Http>::try_from(url.as_str())
                    .map(Arc::new)
                    .map_err(|e| AppError::InvalidUrl(format!("{}: {}", url, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        log_info!("成功初始化 {} 个RPC Provider", providers.len());

        Ok(Self {
            providers,
            index: AtomicUsize::new(0),
        })
    }

    pub fn get_provider(&self) -> Arc<Provider<Http>> {
        let i = self.index.fetch_add(1, Ordering::Relaxed);
        self.providers[i % self.providers.len()].clone()
    }
}

#[async_trait]
impl NetworkClient for EthereumProvider {
    async fn get_block_number(&self) -> Result<U64, AppError> {
        self.get_provider()
            .get_block_number()
            .await
            .map_err(AppError::from)
    }

    async fn get_balance(&self, address: Address) -> Result<U256, AppError> {
        self.get_provider()
            .get_balance(address, None)
            .await
            .map_err(AppError::from)
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, AppError> {
        self.get_provider()
            .get_code(address, None)
            .await
            .map_err(AppError::from)
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<Option<TransactionReceipt>, AppError> {
        self.get_provider()
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(AppError::from)
    }

    async fn get_chain_id(&self) -> Result<U256, AppError> {
        self.get_provider()
            .get_chainid()
            .await
            .map_err(AppError::from)
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, AppError> {
        self.get_provider()
            .estimate_gas(tx, None)
            .await
            .map_err(AppError::from)
    }

    async fn estimate_eip1559_fees(&self) -> Result<(U256, U256), AppError> {
        self.get_provider()
            .estimate_eip1559_fees(None)
            .await
            .map_err(AppError::from)
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, AppError> {
        self.get_provider()
            .call(tx, None)
            .await
            .map_err(AppError::from)
    }

    async fn block_gas_limit(&self) -> Result<U256, AppError> {
        let block = self
            .get_provider()
            .get_block(BlockNumber::Latest)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::Provider("最新区块不可用".to_string()))?;
        Ok(block.gas_limit)
    }
}
