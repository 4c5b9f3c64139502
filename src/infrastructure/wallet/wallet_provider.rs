use crate::errors::error::WalletError;
use async_trait::async_trait;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Address, H256};
use tokio::sync::mpsc;

/// 钱包推送事件（账户/链变更、断开），经由显式队列分发给 ConnectionManager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
    Disconnected,
}

/// 钱包能力契约：任何满足该契约的浏览器钱包或内嵌签名器可互换。
/// 签名与密钥管理完全委托给实现方，核心不触碰私钥原文。
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// 交互式请求账户授权（浏览器钱包会弹出确认框）
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;

    /// 非交互式查询已授权账户，不打扰用户；会话恢复时使用
    async fn get_accounts(&self) -> Result<Vec<Address>, WalletError>;

    async fn chain_id(&self) -> Result<u64, WalletError>;

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError>;

    /// 签名并广播，返回交易哈希；确认等待由调用方负责
    async fn sign_and_send(&self, tx: TypedTransaction) -> Result<H256, WalletError>;

    /// 订阅钱包推送事件
    fn subscribe(&self) -> mpsc::UnboundedReceiver<WalletEvent>;
}
