use crate::errors::classify::{classify, ClassifiedError};
use crate::errors::error::AppError;
use crate::infrastructure::provider::NetworkClient;
use crate::infrastructure::wallet::WalletProvider;
use crate::services::tx::gas::gas_service::GasService;
use crate::services::tx::types::{TransactionRecord, TxRequest, TxStatus};
use crate::utils::check::parse_address;
use crate::utils::format::{group_digits, wei_to_ether};
use crate::log_info;
use crate::log_warn;
use ethers_contract::EthEvent;
use ethers_core::abi::RawLog;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{
    Address, Eip1559TransactionRequest, TransactionReceipt, H256, U256, U64,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, timeout};

type TxListener = Box<dyn Fn(&TransactionRecord) + Send + Sync>;

/// ERC20 Transfer 事件，确认后从回执日志中解析用于记录
#[derive(EthEvent, Debug)]
#[ethevent(name = "Transfer", abi = "Transfer(address,address,uint256)")]
pub struct TransferEvent {
    #[ethevent(indexed)]
    pub from: Address,
    #[ethevent(indexed)]
    pub to: Address,
    pub value: U256,
}

/// 驱动单笔交易走完 估算 → 提交 → 确认 的状态机。
/// 一个实例只服务一次提交；并发提交请创建独立实例，
/// 实例之间只共享只读的 provider/wallet 句柄。
pub struct TransactionSubmitter {
    wallet: Arc<dyn WalletProvider>,
    provider: Arc<dyn NetworkClient>,
    gas_svc: GasService,
    chain_id: u64,
    record: Mutex<TransactionRecord>,
    listeners: Mutex<Vec<TxListener>>,
}

impl TransactionSubmitter {
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        provider: Arc<dyn NetworkClient>,
        gas_svc: GasService,
        chain_id: u64,
    ) -> Self {
        Self {
            wallet,
            provider,
            gas_svc,
            chain_id,
            record: Mutex::new(TransactionRecord::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// 注册状态监听。每次状态迁移后同步回调，回调返回前不会进入下一步。
    pub fn subscribe(&self, listener: impl Fn(&TransactionRecord) + Send + Sync + 'static) {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.push(Box::new(listener));
    }

    /// 当前记录快照
    pub fn record(&self) -> TransactionRecord {
        self.record
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn transition(
        &self,
        next: TxStatus,
        apply: impl FnOnce(&mut TransactionRecord),
    ) -> TransactionRecord {
        let (snapshot, changed) = {
            let mut record = self.record.lock().unwrap_or_else(|e| e.into_inner());
            let changed = record.status.can_transition_to(next);
            if changed {
                record.status = next;
                apply(&mut record);
            } else {
                log_warn!("忽略非法状态迁移: {:?} -> {:?}", record.status, next);
            }
            (record.clone(), changed)
        };
        if changed {
            let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            for listener in listeners.iter() {
                listener(&snapshot);
            }
        }
        snapshot
    }

    fn fail(&self, error: ClassifiedError) -> ClassifiedError {
        self.transition(TxStatus::Failed, |record| {
            record.error = Some(error.clone());
        });
        error
    }

    /// 提交一笔交易并等待确认，返回终态记录。
    pub async fn submit(&self, request: TxRequest) -> Result<TransactionRecord, ClassifiedError> {
        if self.record().status != TxStatus::Idle {
            return Err(classify(
                AppError::Validation("该提交器实例已被使用，请为新交易创建新实例".to_string())
                    .into(),
            ));
        }

        // ---- 阶段 1：估算 ----
        self.transition(TxStatus::Estimating, |record| {
            record.required_confirmations = request.options.confirmations;
        });

        // 地址校验先于任何网络调用
        let to = match parse_address(&request.to) {
            Ok(address) => address,
            Err(err) => return Err(self.fail(classify(err.into()))),
        };

        let (max_fee_per_gas, priority_fee_per_gas) = match self
            .gas_svc
            .resolve_fees(self.provider.as_ref(), request.options.priority)
            .await
        {
            Ok(fees) => fees,
            Err(err) => return Err(self.fail(classify(err.into()))),
        };

        let mut tx_req = Eip1559TransactionRequest::new()
            .to(to)
            .value(request.value)
            .data(request.data.clone())
            .max_fee_per_gas(max_fee_per_gas)
            .max_priority_fee_per_gas(priority_fee_per_gas)
            .chain_id(self.chain_id);

        let gas_limit = match self
            .gas_svc
            .resolve_gas_limit(
                self.provider.as_ref(),
                &TypedTransaction::Eip1559(tx_req.clone()),
                &request.options,
            )
            .await
        {
            Ok(limit) => limit,
            Err(err) => return Err(self.fail(classify(err.into()))),
        };
        tx_req = tx_req.gas(gas_limit);

        log_info!(
            "交易已估算 → to: {:?} | value: {} ETH | gas_limit: {}",
            to,
            wei_to_ether(request.value),
            group_digits(gas_limit.as_u64())
        );

        // ---- 阶段 2：提交 ----
        let typed: TypedTransaction = tx_req.into();
        let hash = match self.wallet.sign_and_send(typed).await {
            Ok(hash) => hash,
            Err(err) => return Err(self.fail(classify(err.into()))),
        };
        self.transition(TxStatus::Pending, |record| {
            record.hash = Some(hash);
        });
        log_info!("交易已广播，等待上链 → hash: {:?}", hash);

        // ---- 阶段 3：确认 ----
        let wait = timeout(
            Duration::from_secs(request.options.timeout_secs),
            self.await_confirmations(
                hash,
                request.options.confirmations,
                request.options.poll_interval_ms,
            ),
        )
        .await;

        match wait {
            // 超时：哈希保留，交易可能稍后在链上确认，由调用方自行对账
            Err(_) => Err(self.fail(classify(
                AppError::Timeout(format!(
                    "等待 {} 个确认超过 {} 秒",
                    request.options.confirmations, request.options.timeout_secs
                ))
                .into(),
            ))),
            Ok(Err(err)) => Err(self.fail(classify(err))),
            Ok(Ok(receipt)) => {
                // 已上链但执行回滚：是失败而非成功
                if receipt.status == Some(U64::zero()) {
                    return Err(self.fail(classify(
                        AppError::Internal(format!(
                            "Transaction reverted on-chain. Hash: {:?}",
                            receipt.transaction_hash
                        ))
                        .into(),
                    )));
                }

                let snapshot = self.transition(TxStatus::Confirmed, |_| {});

                for event in parse_logs_from_receipt::<TransferEvent>(&receipt) {
                    log_info!(
                        "Transfer → from: {:?} | to: {:?} | value: {}",
                        event.from,
                        event.to,
                        event.value
                    );
                }
                log_info!(
                    "交易确认成功 → hash: {:?} | block: {:?} | gas_used: {:?}",
                    receipt.transaction_hash,
                    receipt.block_number,
                    receipt.gas_used
                );
                Ok(snapshot)
            }
        }
    }

    /// 轮询回执直到确认数达标。超时控制在调用方。
    async fn await_confirmations(
        &self,
        hash: H256,
        confirmations: u64,
        poll_interval_ms: u64,
    ) -> Result<TransactionReceipt, anyhow::Error> {
        loop {
            if let Some(receipt) = self.provider.get_transaction_receipt(hash).await? {
                if confirmations <= 1 {
                    return Ok(receipt);
                }
                if let Some(mined_at) = receipt.block_number {
                    let current = self.provider.get_block_number().await?;
                    // 确认数 = 当前高度 - 打包高度 + 1
                    let seen = current.as_u64().saturating_sub(mined_at.as_u64()) + 1;
                    if seen >= confirmations {
                        return Ok(receipt);
                    }
                }
            }
            sleep(Duration::from_millis(poll_interval_ms)).await;
        }
    }
}

/// 从回执中提取特定类型的事件
pub fn parse_logs_from_receipt<T: EthEvent>(receipt: &TransactionReceipt) -> Vec<T> {
    receipt
        .logs
        .iter()
        .filter_map(|log| {
            let raw_log = RawLog {
                topics: log.topics.clone(),
                data: log.data.to_vec(),
            };
            T::decode_log(&raw_log).ok()
        })
        .collect()
}
