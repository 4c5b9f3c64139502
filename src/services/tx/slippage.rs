use ethers_core::types::U256;

/// 滑点容忍度（整数百分比）。默认 5%，经配置可调，不在调用点硬编码。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlippageTolerance {
    percent: u64,
}

impl Default for SlippageTolerance {
    fn default() -> Self {
        Self { percent: 5 }
    }
}

impl SlippageTolerance {
    /// 超过 100 的输入收敛到 100（全额滑点没有意义，但不该 panic）
    pub fn new(percent: u64) -> Self {
        Self {
            percent: percent.min(100),
        }
    }

    pub fn percent(&self) -> u64 {
        self.percent
    }

    /// 给定报价输出，计算可接受的最低到账数量
    pub fn min_amount_out(&self, quoted: U256) -> U256 {
        quoted * U256::from(100 - self.percent) / U256::from(100)
    }
}
