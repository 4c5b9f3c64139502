use crate::errors::error::AppError;
use ethers::prelude::Address;
use ethers::utils::to_checksum;

/// 账户地址校验：任何网络调用发起之前必须先通过这里。
/// 全小写/全大写视为未携带校验信息；混合大小写则按 EIP-55 校验。
pub fn parse_address(input: &str) -> Result<Address, AppError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(AppError::InvalidAddress("地址为空".to_string()));
    }

    let hex_part = s
        .strip_prefix("0x")
        .ok_or_else(|| AppError::InvalidAddress(format!("缺少 0x 前缀: {}", s)))?;

    if hex_part.len() != 40 {
        return Err(AppError::InvalidAddress(format!(
            "长度应为 40 个十六进制字符（实际 {}）: {}",
            hex_part.len(),
            s
        )));
    }

    if hex::decode(hex_part).is_err() {
        return Err(AppError::InvalidAddress(format!(
            "包含非十六进制字符: {}",
            s
        )));
    }

    let address: Address = s
        .parse()
        .map_err(|_| AppError::InvalidAddress(s.to_string()))?;

    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        let checksummed = to_checksum(&address, None);
        if checksummed != s {
            return Err(AppError::InvalidAddress(format!("EIP-55 校验失败: {}", s)));
        }
    }

    Ok(address)
}
