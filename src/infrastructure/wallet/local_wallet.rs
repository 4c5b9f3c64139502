use crate::config::{EthereumConfig, WalletConfig};
use crate::errors::error::WalletError;
use crate::infrastructure::provider::ethereum_provider::endpoint_urls;
use crate::infrastructure::wallet::wallet_provider::{WalletEvent, WalletProvider};
use crate::log_info;
use async_trait::async_trait;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Address, H256};
use ethers_middleware::{NonceManagerMiddleware, SignerMiddleware};
use ethers_providers::{Http, Middleware, MiddlewareError, Provider};
use ethers_signers::{LocalWallet, Signer};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// 中间件栈：Nonce 管理 → 签名 → HTTP Provider
type WalletClient = NonceManagerMiddleware<SignerMiddleware<Provider<Http>, LocalWallet>>;

/// 内嵌签名器实现的 WalletProvider。
/// 账户授权是平凡的（私钥在手即为已授权），但契约语义与浏览器钱包一致。
pub struct LocalWalletProvider {
    client: WalletClient,
    address: Address,
    chain_id: u64,
    /// 本地签名器不产生推送事件；通道仅为满足订阅契约而保留
    subscribers: Mutex<Vec<mpsc::UnboundedSender<WalletEvent>>>,
}

impl LocalWalletProvider {
    pub fn new(eth: &EthereumConfig, wallet_cfg: &WalletConfig) -> Result<Self, WalletError> {
        let private_key = wallet_cfg
            .resolve_private_key()
            .ok_or(WalletError::Unavailable)?;

        // 强制绑定 chain_id，防止签名被跨链重放
        let wallet = private_key
            .trim()
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| WalletError::Configuration(format!("私钥格式错误: {}", e)))?
            .with_chain_id(eth.chain_id);

        let address = wallet.address();

        let endpoint = endpoint_urls(eth)
            .map_err(|e| WalletError::Configuration(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| WalletError::Configuration("无可用的 RPC 端点".to_string()))?;

        let http = Provider::<Http>::try_from(endpoint.as_str())
            .map_err(|e| WalletError::Configuration(format!("无效的 RPC URL: {}", e)))?;

        let client = NonceManagerMiddleware::new(SignerMiddleware::new(http, wallet), address);

        log_info!(
            "本地签名器就绪 → address: {:?} | chain_id: {}",
            address,
            eth.chain_id
        );

        Ok(Self {
            client,
            address,
            chain_id: eth.chain_id,
            subscribers: Mutex::new(Vec::new()),
        })
    }
}

fn map_send_error<E: MiddlewareError>(err: E) -> WalletError {
    // 中间件栈层层包装，优先穿透到结构化的 JSON-RPC 错误
    if let Some(rpc) = err.as_error_response() {
        return WalletError::from_rpc(rpc.code, rpc.message.clone());
    }
    WalletError::Signing(err.to_string())
}

#[async_trait]
impl WalletProvider for LocalWalletProvider {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        Ok(vec![self.address])
    }

    async fn get_accounts(&self) -> Result<Vec<Address>, WalletError> {
        Ok(vec![self.address])
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        Ok(self.chain_id)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        // 内嵌签名器绑定单一链；切到其他链按未添加网络处理（4902 语义）
        if chain_id == self.chain_id {
            Ok(())
        } else {
            Err(WalletError::UnrecognizedChain(chain_id))
        }
    }

    async fn sign_and_send(&self, tx: TypedTransaction) -> Result<H256, WalletError> {
        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(map_send_error)?;
        Ok(pending.tx_hash())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<WalletEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }
}
