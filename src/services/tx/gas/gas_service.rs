// services/tx/gas/gas_service.rs

use crate::errors::error::AppError;
use crate::infrastructure::provider::NetworkClient;
use crate::services::tx::gas::gas_strategy::TxPriority;
use crate::services::tx::types::TxOptions;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::U256;

/// 普通转账的最低 gas 成本，显式覆盖值的下限
pub const MIN_TX_GAS: u64 = 21_000;

/// Gas 计算服务（纯整数运算，无浮点风险）
#[derive(Clone, Copy, Debug)]
pub struct GasService {
    /// 全局对 tip 的额外调整百分比（100 = 无调整，110 = +10%，90 = -10%）
    base_tip_percent: u128,
}

impl Default for GasService {
    fn default() -> Self {
        Self::new(100)
    }
}

impl GasService {
    /// 构造函数：传入百分比整数
    /// 示例：GasService::new(110) 表示全局 tip +10%
    pub fn new(base_tip_percent: u128) -> Self {
        Self { base_tip_percent }
    }

    /// 根据优先级动态计算 EIP-1559 费用
    pub async fn resolve_fees(
        &self,
        provider: &dyn NetworkClient,
        priority: TxPriority,
    ) -> Result<(U256, U256), AppError> {
        // 1. 获取链上建议的费用
        let (max_fee_per_gas, base_priority_fee) = provider.estimate_eip1559_fees().await?;

        // 2. 计算优先级调整后的 tip（整数百分比运算）
        let priority_multiplier = priority.tip_multiplier_percent(); // 如 High -> 150

        let total_multiplier = self
            .base_tip_percent
            .checked_mul(priority_multiplier)
            .ok_or_else(|| {
                AppError::Internal("Tip multiplier overflow during calculation".to_string())
            })?
            / 100;

        let adjusted_priority_fee = base_priority_fee
            .checked_mul(U256::from(total_multiplier))
            .ok_or_else(|| AppError::Internal("Adjusted priority fee overflow".to_string()))?
            / U256::from(100);

        // 3. 计算 max_fee_per_gas 的安全上限
        // 策略：max_fee 不应远高于调整后的 tip
        let cap_multiplier = priority.max_fee_cap_multiplier_percent(); // 如 High -> 200

        let max_allowed_fee = adjusted_priority_fee
            .checked_mul(U256::from(cap_multiplier))
            .ok_or_else(|| AppError::Internal("Max fee cap calculation overflow".to_string()))?
            / U256::from(100);

        // 取链上建议值与安全上限的较小值（保守策略）
        let final_max_fee_per_gas = max_fee_per_gas.min(max_allowed_fee);

        Ok((final_max_fee_per_gas, adjusted_priority_fee))
    }

    /// 解析本次提交的 gas limit。
    /// 无覆盖值：链上估算 × 安全余量（120 = +20%），降低执行中途耗尽的概率；
    /// 有覆盖值：按原值使用，仅校验下限（最低交易成本）和上限（区块 gas 上限）。
    pub async fn resolve_gas_limit(
        &self,
        provider: &dyn NetworkClient,
        tx: &TypedTransaction,
        options: &TxOptions,
    ) -> Result<U256, AppError> {
        if let Some(limit) = options.gas_limit_override {
            if limit < U256::from(MIN_TX_GAS) {
                return Err(AppError::Validation(format!(
                    "gas limit {} 低于最低交易成本 {}",
                    limit, MIN_TX_GAS
                )));
            }
            let block_limit = provider.block_gas_limit().await?;
            if limit > block_limit {
                return Err(AppError::Validation(format!(
                    "gas limit {} 超过区块上限 {}",
                    limit, block_limit
                )));
            }
            return Ok(limit);
        }

        let estimated = provider.estimate_gas(tx).await?;
        Ok(estimated * U256::from(options.gas_limit_buffer) / U256::from(100))
    }
}
