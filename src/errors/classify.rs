//! 错误分类器：把上游五花八门的失败统一映射成封闭的分类枚举。
//! 分类规则按优先级顺序匹配，首个命中即返回；原始失败值始终保留在
//! cause 中供诊断使用（revert 原因提取是 best-effort，不可依赖）。

use crate::errors::error::{AppError, WalletError};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// 封闭的错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    UserRejected,
    InsufficientFunds,
    Network,
    ContractReverted,
    Validation,
    Unknown,
}

/// 分类后的错误：kind 由分类算法推导，调用方不得直接指定
#[derive(Debug, Clone)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    /// 原始失败值，仅用于诊断；Arc 包装使状态快照可以 Clone
    pub cause: Option<Arc<anyhow::Error>>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl StdError for ClassifiedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|e| AsRef::<dyn StdError + 'static>::as_ref(e))
    }
}

/// 完整分类：消费上游错误，产出分类结果并保留原始值
pub fn classify(err: anyhow::Error) -> ClassifiedError {
    let (kind, message) = {
        let chain: Vec<&(dyn StdError + 'static)> = err.chain().collect();
        let text = chain
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(": ");
        run_rules(&chain, &text)
    };
    ClassifiedError {
        kind,
        message,
        cause: Some(Arc::new(err)),
    }
}

/// 只取分类结果，不消费错误（重试适配器用它判断是否可重试）
pub fn classify_kind(err: &(dyn StdError + 'static)) -> ErrorKind {
    let mut chain: Vec<&(dyn StdError + 'static)> = vec![err];
    let mut cursor = err;
    while let Some(source) = cursor.source() {
        chain.push(source);
        cursor = source;
    }
    let text = chain
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(": ");
    run_rules(&chain, &text).0
}

fn run_rules<'e>(chain: &[&'e (dyn StdError + 'static)], text: &str) -> (ErrorKind, String) {
    let lower = text.to_lowercase();

    // 1. 用户拒绝：结构化信号优先，文本兜底
    if has_wallet_signal(chain, |w| matches!(w, WalletError::UserRejected))
        || contains_any(&lower, &["user rejected", "user denied", "rejected by user"])
    {
        return (ErrorKind::UserRejected, "用户拒绝了此次请求".to_string());
    }

    // 2. 余额不足
    if has_wallet_signal(chain, |w| matches!(w, WalletError::InsufficientFunds(_)))
        || contains_any(&lower, &["insufficient funds", "insufficient balance"])
    {
        return (
            ErrorKind::InsufficientFunds,
            "账户余额不足，无法完成此次操作".to_string(),
        );
    }

    // 3. 结构化 revert（JSON-RPC code 3 携带 revert 信息）
    for e in chain {
        if let Some((3, message)) = rpc_info(*e) {
            let reason = extract_revert_reason(message).unwrap_or_else(|| message.to_string());
            return (ErrorKind::ContractReverted, format!("合约执行回滚: {reason}"));
        }
    }

    // 4. 文本形态的 revert，兜底提取原因子串
    if contains_any(&lower, &["execution reverted", "transaction reverted", "revert"]) {
        return match extract_revert_reason(text) {
            Some(reason) => (ErrorKind::ContractReverted, format!("合约执行回滚: {reason}")),
            None => (
                ErrorKind::ContractReverted,
                "合约执行回滚（未能提取原因）".to_string(),
            ),
        };
    }

    // 本地校验失败与未添加网络属于确定性错误，重试不会改变结果
    for e in chain {
        if let Some(w) = e.downcast_ref::<WalletError>() {
            if let WalletError::UnrecognizedChain(chain_id) = w {
                return (
                    ErrorKind::Validation,
                    format!("目标网络 {chain_id} 尚未添加到钱包，请先添加该网络"),
                );
            }
        }
        match e.downcast_ref::<AppError>() {
            Some(AppError::Validation(detail)) => {
                return (ErrorKind::Validation, format!("参数校验失败: {detail}"));
            }
            Some(AppError::InvalidAddress(addr)) => {
                return (ErrorKind::Validation, format!("无效的地址: {addr}"));
            }
            _ => {}
        }
    }

    // 5. 传输层/连接失败（结构化超时 + -32xxx 传输类错误码 + 文本）
    let transport_signal = chain.iter().any(|e| {
        matches!(e.downcast_ref::<AppError>(), Some(AppError::Timeout(_)))
            || matches!(rpc_info(*e), Some((code, _)) if code <= -32000)
    });
    if transport_signal
        || contains_any(
            &lower,
            &[
                "connection",
                "connect error",
                "timed out",
                "timeout",
                "network",
                "dns error",
                "os error",
                "dropped from mempool",
            ],
        )
    {
        return (ErrorKind::Network, "网络连接异常，请稍后重试".to_string());
    }

    // 6. gas 预估失败：调用注定失败，提示检查参数
    if contains_any(
        &lower,
        &[
            "gas required exceeds allowance",
            "cannot estimate gas",
            "unpredictable_gas_limit",
            "always failing transaction",
            "intrinsic gas too low",
        ],
    ) {
        return (
            ErrorKind::Validation,
            "交易预估失败，请检查交易参数".to_string(),
        );
    }

    // 7. 兜底：沿用上游自己的描述
    let fallback = chain
        .first()
        .map(|e| e.to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "发生未知错误".to_string());
    (ErrorKind::Unknown, fallback)
}

fn has_wallet_signal(
    chain: &[&(dyn StdError + 'static)],
    predicate: impl Fn(&WalletError) -> bool,
) -> bool {
    chain
        .iter()
        .filter_map(|e| e.downcast_ref::<WalletError>())
        .any(|w| predicate(w))
}

fn rpc_info<'a>(err: &'a (dyn StdError + 'static)) -> Option<(i64, &'a str)> {
    if let Some(AppError::Rpc { code, message }) = err.downcast_ref::<AppError>() {
        return Some((*code, message.as_str()));
    }
    if let Some(WalletError::Rpc { code, message }) = err.downcast_ref::<WalletError>() {
        return Some((*code, message.as_str()));
    }
    None
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// 从错误文本中提取 revert 原因。不同节点/开发链的格式并不统一，
/// 这里只做子串级的 best-effort 提取，失败时返回 None。
pub fn extract_revert_reason(text: &str) -> Option<String> {
    // hardhat/ganache 风格: reverted with reason string 'xxx'
    if let Some(rest) = text.split("reason string '").nth(1) {
        if let Some(end) = rest.find('\'') {
            let reason = rest[..end].trim();
            if !reason.is_empty() {
                return Some(reason.to_string());
            }
        }
    }
    // geth 风格: execution reverted: xxx
    if let Some(rest) = text.split("execution reverted:").nth(1) {
        let line = rest.lines().next().unwrap_or(rest);
        let reason = line
            .trim()
            .trim_end_matches(['"', '\'', '}', ')', ','])
            .trim();
        if !reason.is_empty() {
            return Some(reason.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_user_rejection_wins() {
        let c = classify(WalletError::UserRejected.into());
        assert_eq!(c.kind, ErrorKind::UserRejected);
    }

    #[test]
    fn textual_user_rejection_detected() {
        let c = classify(anyhow::anyhow!("MetaMask Tx Signature: User denied"));
        assert_eq!(c.kind, ErrorKind::UserRejected);
    }

    // 用户拒绝优先于 revert 文本
    #[test]
    fn user_rejection_beats_revert_text() {
        let c = classify(anyhow::anyhow!(
            "user rejected the request before execution reverted"
        ));
        assert_eq!(c.kind, ErrorKind::UserRejected);
    }

    #[test]
    fn insufficient_funds_from_text() {
        let c = classify(anyhow::anyhow!(
            "err: insufficient funds for gas * price + value"
        ));
        assert_eq!(c.kind, ErrorKind::InsufficientFunds);
    }

    #[test]
    fn structured_revert_with_reason() {
        let err = AppError::Rpc {
            code: 3,
            message: "execution reverted: Not enough balance".to_string(),
        };
        let c = classify(err.into());
        assert_eq!(c.kind, ErrorKind::ContractReverted);
        assert!(c.message.contains("Not enough balance"), "{}", c.message);
    }

    #[test]
    fn hardhat_reason_string_extracted() {
        let reason =
            extract_revert_reason("VM Exception: reverted with reason string 'INSUFFICIENT_ALLOWANCE'");
        assert_eq!(reason.as_deref(), Some("INSUFFICIENT_ALLOWANCE"));
    }

    #[test]
    fn revert_text_without_reason_still_classified() {
        let c = classify(anyhow::anyhow!("Transaction reverted on-chain. Hash: 0xabc"));
        assert_eq!(c.kind, ErrorKind::ContractReverted);
        assert!(c.cause.is_some());
    }

    #[test]
    fn unrecognized_chain_is_validation() {
        let c = classify(WalletError::UnrecognizedChain(10).into());
        assert_eq!(c.kind, ErrorKind::Validation);
        assert!(c.message.contains("先添加"), "{}", c.message);
    }

    #[test]
    fn structured_timeout_is_network() {
        let c = classify(AppError::Timeout("等待 1 个确认超时".into()).into());
        assert_eq!(c.kind, ErrorKind::Network);
    }

    #[test]
    fn transport_text_is_network() {
        let c = classify(anyhow::anyhow!("error sending request: connection refused"));
        assert_eq!(c.kind, ErrorKind::Network);
    }

    #[test]
    fn estimate_failure_is_validation() {
        let c = classify(anyhow::anyhow!("gas required exceeds allowance (0)"));
        assert_eq!(c.kind, ErrorKind::Validation);
    }

    #[test]
    fn unknown_keeps_original_message() {
        let c = classify(anyhow::anyhow!("something very strange happened"));
        assert_eq!(c.kind, ErrorKind::Unknown);
        assert!(c.message.contains("something very strange"));
    }

    #[test]
    fn classify_kind_matches_classify() {
        let err = AppError::Timeout("t".into());
        assert_eq!(classify_kind(&err), ErrorKind::Network);
    }
}
