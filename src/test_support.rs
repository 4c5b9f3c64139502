//! 测试专用的 WalletProvider / NetworkClient 桩实现

use crate::errors::error::{AppError, WalletError};
use crate::infrastructure::provider::NetworkClient;
use crate::infrastructure::wallet::{WalletEvent, WalletProvider};
use async_trait::async_trait;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Address, Bytes, TransactionReceipt, H256, U256, U64};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// 可编排的钱包桩：记录调用次数，支持拒绝/延迟/事件注入
pub struct MockWallet {
    accounts: Vec<Address>,
    chain_id: u64,
    request_delay_ms: u64,
    reject_request: bool,
    reject_switch: bool,
    reject_sign: bool,
    request_calls: AtomicUsize,
    get_calls: AtomicUsize,
    sign_calls: AtomicUsize,
    last_tx: Mutex<Option<TypedTransaction>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<WalletEvent>>>,
}

impl MockWallet {
    pub fn with_accounts(accounts: Vec<Address>, chain_id: u64) -> Self {
        Self {
            accounts,
            chain_id,
            request_delay_ms: 0,
            reject_request: false,
            reject_switch: false,
            reject_sign: false,
            request_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            sign_calls: AtomicUsize::new(0),
            last_tx: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// 用户在授权框上点了拒绝
    pub fn rejecting() -> Self {
        let mut wallet = Self::with_accounts(vec![], 1);
        wallet.reject_request = true;
        wallet
    }

    pub fn with_request_delay_ms(mut self, delay_ms: u64) -> Self {
        self.request_delay_ms = delay_ms;
        self
    }

    pub fn with_switch_rejection(mut self) -> Self {
        self.reject_switch = true;
        self
    }

    pub fn with_sign_rejection(mut self) -> Self {
        self.reject_sign = true;
        self
    }

    pub fn request_account_calls(&self) -> usize {
        self.request_calls.load(Ordering::SeqCst)
    }

    pub fn get_account_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    pub fn last_tx(&self) -> Option<TypedTransaction> {
        self.last_tx.lock().unwrap().clone()
    }

    /// 注入一条推送事件（模拟钱包扩展的 push 通知）
    pub fn emit(&self, event: WalletEvent) {
        let subscribers = self.subscribers.lock().unwrap();
        for tx in subscribers.iter() {
            let _ = tx.send(event.clone());
        }
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        self.request_calls.fetch_add(1, Ordering::SeqCst);
        if self.request_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.request_delay_ms)).await;
        }
        if self.reject_request {
            return Err(WalletError::UserRejected);
        }
        Ok(self.accounts.clone())
    }

    async fn get_accounts(&self) -> Result<Vec<Address>, WalletError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.accounts.clone())
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        Ok(self.chain_id)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        if self.reject_switch {
            return Err(WalletError::UserRejected);
        }
        if chain_id == self.chain_id {
            Ok(())
        } else {
            Err(WalletError::UnrecognizedChain(chain_id))
        }
    }

    async fn sign_and_send(&self, tx: TypedTransaction) -> Result<H256, WalletError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_tx.lock().unwrap() = Some(tx);
        if self.reject_sign {
            return Err(WalletError::UserRejected);
        }
        Ok(H256::from_low_u64_be(0xabcd))
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<WalletEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }
}

/// 可编排的节点桩。call 以交易 value 的低位作为下标，
/// 命中 fail_indices 的调用返回错误，其余原样回显下标字节。
pub struct MockNetworkClient {
    pub estimate: U256,
    pub estimate_error: Option<String>,
    pub max_fee: U256,
    pub base_tip: U256,
    pub block_number: U64,
    pub block_gas_limit: U256,
    pub receipt: Mutex<Option<TransactionReceipt>>,
    pub fail_indices: HashSet<usize>,
    pub network_calls: AtomicUsize,
}

impl Default for MockNetworkClient {
    fn default() -> Self {
        Self {
            estimate: U256::from(100_000u64),
            estimate_error: None,
            max_fee: U256::from(40_000_000_000u64),
            base_tip: U256::from(2_000_000_000u64),
            block_number: U64::from(12),
            block_gas_limit: U256::from(30_000_000u64),
            receipt: Mutex::new(None),
            fail_indices: HashSet::new(),
            network_calls: AtomicUsize::new(0),
        }
    }
}

impl MockNetworkClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_receipt(self, receipt: TransactionReceipt) -> Self {
        *self.receipt.lock().unwrap() = Some(receipt);
        self
    }

    pub fn with_failing_calls(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.fail_indices = indices.into_iter().collect();
        self
    }

    pub fn network_call_count(&self) -> usize {
        self.network_calls.load(Ordering::SeqCst)
    }

    fn track(&self) {
        self.network_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// 构造一个已打包的回执；status 1 表示成功，0 表示 revert
pub fn mined_receipt(hash: H256, status: u64, block_number: u64) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: hash,
        status: Some(U64::from(status)),
        block_number: Some(U64::from(block_number)),
        ..Default::default()
    }
}

#[async_trait]
impl NetworkClient for MockNetworkClient {
    async fn get_block_number(&self) -> Result<U64, AppError> {
        self.track();
        Ok(self.block_number)
    }

    async fn get_balance(&self, _address: Address) -> Result<U256, AppError> {
        self.track();
        Ok(U256::zero())
    }

    async fn get_code(&self, _address: Address) -> Result<Bytes, AppError> {
        self.track();
        Ok(Bytes::new())
    }

    async fn get_transaction_receipt(
        &self,
        _tx_hash: H256,
    ) -> Result<Option<TransactionReceipt>, AppError> {
        self.track();
        Ok(self.receipt.lock().unwrap().clone())
    }

    async fn get_chain_id(&self) -> Result<U256, AppError> {
        self.track();
        Ok(U256::from(11155111u64))
    }

    async fn estimate_gas(&self, _tx: &TypedTransaction) -> Result<U256, AppError> {
        self.track();
        if let Some(message) = &self.estimate_error {
            return Err(AppError::Rpc {
                code: 3,
                message: message.clone(),
            });
        }
        Ok(self.estimate)
    }

    async fn estimate_eip1559_fees(&self) -> Result<(U256, U256), AppError> {
        self.track();
        Ok((self.max_fee, self.base_tip))
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, AppError> {
        self.track();
        let index = tx.value().map(|v| v.low_u64() as usize).unwrap_or(0);
        if self.fail_indices.contains(&index) {
            return Err(AppError::Rpc {
                code: 3,
                message: "execution reverted".to_string(),
            });
        }
        Ok(Bytes::from(vec![index as u8]))
    }

    async fn block_gas_limit(&self) -> Result<U256, AppError> {
        self.track();
        Ok(self.block_gas_limit)
    }
}
