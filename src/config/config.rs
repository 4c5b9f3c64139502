use config::{ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub ethereum: EthereumConfig,
    pub wallet: WalletConfig,
    pub tx: TxConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EthereumConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    /// 逗号分隔的节点 api key 列表；为空时直接使用 rpc_url
    pub api_keys: String,
    pub max_retries: usize,
    pub base_delay_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WalletConfig {
    /// 私钥优先从环境变量 ETH_PRIVATE_KEY 读取，配置文件仅作本地开发兜底
    pub private_key: Option<String>,
    /// 会话恢复标记的落盘位置
    pub session_file: String,
}

impl WalletConfig {
    pub fn resolve_private_key(&self) -> Option<String> {
        std::env::var("ETH_PRIVATE_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.private_key.clone())
    }
}

/// 交易提交的默认参数（单笔提交可在 TxOptions 中覆盖）
#[derive(Debug, Deserialize, Clone)]
pub struct TxConfig {
    pub confirmations: u64,
    pub timeout_secs: u64,
    /// gas limit 安全余量百分比，120 表示 +20%
    pub gas_limit_buffer: u64,
    pub poll_interval_ms: u64,
    pub batch_size: usize,
    pub cache_ttl_secs: u64,
    /// 滑点容忍度百分比，默认 5
    pub max_slippage_percent: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub dir: String,
    pub level: String,
    pub file_name: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        config::Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            .build()?
            .try_deserialize()
    }
}
