use config::ConfigError;
use ethers_providers::{ProviderError, RpcError};
use thiserror::Error;

/// 基础设施层错误（配置/IO/RPC），在服务边界统一归类为 ClassifiedError
#[derive(Error, Debug)]
pub enum AppError {
    #[error("配置加载错误: {0}")]
    Config(#[from] ConfigError),

    #[error("无效的地址: {0}")]
    InvalidAddress(String),

    #[error("无效的URL: {0}")]
    InvalidUrl(String),

    #[error("参数校验失败: {0}")]
    Validation(String),

    /// 节点返回的结构化 JSON-RPC 错误（保留 code 供分类使用）
    #[error("节点RPC错误 (code={code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("Provider错误: {0}")]
    Provider(String),

    #[error("请求超时: {0}")]
    Timeout(String),

    #[error("会话存储错误: {0}")]
    Store(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("钱包错误: {0}")]
    Wallet(#[from] WalletError),

    /// 内部不可预期错误（兜底）
    #[error("内部错误: {0}")]
    Internal(String),
}

impl AppError {
    pub fn new(message: &str) -> Self {
        AppError::Internal(message.to_string())
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        // 尽量保留结构化的 JSON-RPC 错误信息，分类器依赖 code
        if let Some(rpc) = err.as_error_response() {
            return AppError::Rpc {
                code: rpc.code,
                message: rpc.message.clone(),
            };
        }
        AppError::Provider(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// 钱包层的结构化失败信号（EIP-1193 语义）。
/// 分类器优先识别这些信号，识别不了才退回文本匹配。
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("钱包不可用（扩展未安装或签名器未配置）")]
    Unavailable,

    #[error("用户拒绝了请求")]
    UserRejected,

    #[error("钱包已有待处理的请求，请先完成或取消")]
    RequestPending,

    #[error("钱包无法识别链 {0}，需要先添加该网络")]
    UnrecognizedChain(u64),

    #[error("余额不足: {0}")]
    InsufficientFunds(String),

    #[error("钱包RPC错误 (code={code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("钱包配置错误: {0}")]
    Configuration(String),

    #[error("签名失败: {0}")]
    Signing(String),
}

impl WalletError {
    /// 从 JSON-RPC 错误码还原结构化信号
    /// 4001 = 用户拒绝, -32002 = 请求排队中（EIP-1193）
    pub fn from_rpc(code: i64, message: String) -> Self {
        match code {
            4001 => WalletError::UserRejected,
            -32002 => WalletError::RequestPending,
            _ if message.to_lowercase().contains("insufficient funds") => {
                WalletError::InsufficientFunds(message)
            }
            _ => WalletError::Rpc { code, message },
        }
    }
}
