// services/tx/types.rs

use crate::errors::classify::ClassifiedError;
use crate::services::tx::gas::gas_strategy::TxPriority;
use ethers::abi::{self, Token};
use ethers_core::types::{Address, Bytes, H256, U256};
use ethers_core::utils::keccak256;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
pub struct TxOptions {
    pub priority: TxPriority,
    /// gas limit 安全余量百分比，120 表示 +20%
    pub gas_limit_buffer: u64,
    /// 显式 gas limit 覆盖值：按原值使用，仅做上下限校验
    pub gas_limit_override: Option<U256>,
    pub confirmations: u64,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for TxOptions {
    fn default() -> Self {
        Self {
            priority: TxPriority::Normal,
            gas_limit_buffer: 120,
            gas_limit_override: None,
            confirmations: 1,
            timeout_secs: 300,
            poll_interval_ms: 2000,
        }
    }
}

impl TxOptions {
    /// 以配置文件的默认值为基底；优先级与覆盖值仍由单笔提交决定
    pub fn from_config(cfg: &crate::config::TxConfig) -> Self {
        Self {
            priority: TxPriority::Normal,
            gas_limit_buffer: cfg.gas_limit_buffer,
            gas_limit_override: None,
            confirmations: cfg.confirmations,
            timeout_secs: cfg.timeout_secs,
            poll_interval_ms: cfg.poll_interval_ms,
        }
    }
}

/// 单笔提交请求。to 保持字符串形态，提交时先做本地校验再碰网络。
#[derive(Debug, Clone)]
pub struct TxRequest {
    pub to: String,
    pub value: U256,
    pub data: Bytes,
    pub options: TxOptions,
}

impl TxRequest {
    pub fn transfer(to: impl Into<String>, value: U256) -> Self {
        Self {
            to: to.into(),
            value,
            data: Bytes::default(), // 原生转账 data 为空
            options: TxOptions::default(),
        }
    }

    pub fn call(to: impl Into<String>, data: Bytes) -> Self {
        Self {
            to: to.into(),
            value: U256::zero(),
            data,
            options: TxOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Idle,
    Estimating,
    Pending,
    Confirmed,
    Failed,
}

impl TxStatus {
    /// 状态机只能向前推进：idle → estimating → pending → {confirmed | failed}
    pub fn can_transition_to(self, next: TxStatus) -> bool {
        use TxStatus::*;
        matches!(
            (self, next),
            (Idle, Estimating)
                | (Estimating, Pending)
                | (Estimating, Failed)
                | (Pending, Confirmed)
                | (Pending, Failed)
        )
    }
}

static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(1);

/// 单笔交易的生命周期记录。id 为本地生成（提交前链上哈希未知），
/// hash 仅在提交被网络接受后出现。
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub id: u64,
    pub status: TxStatus,
    pub hash: Option<H256>,
    pub error: Option<ClassifiedError>,
    pub required_confirmations: u64,
}

impl TransactionRecord {
    pub fn new() -> Self {
        Self {
            id: NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed),
            status: TxStatus::Idle,
            hash: None,
            error: None,
            required_confirmations: 1,
        }
    }
}

impl Default for TransactionRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// ERC20 transfer(address,uint256) 的函数选择器 (0xa9059cbb)
static ERC20_TRANSFER_SELECTOR: Lazy<[u8; 4]> = Lazy::new(|| {
    let hash = keccak256("transfer(address,uint256)");
    [hash[0], hash[1], hash[2], hash[3]]
});

/// 构造标准 ERC20 transfer 的调用数据
/// 每个参数占 32 字节，总计 4 + 32 + 32 = 68 字节
pub fn erc20_transfer_data(to: Address, amount: U256) -> Bytes {
    let mut data = Vec::with_capacity(68);
    data.extend_from_slice(&*ERC20_TRANSFER_SELECTOR);
    data.extend_from_slice(&abi::encode(&[Token::Address(to), Token::Uint(amount)]));
    data.into()
}
