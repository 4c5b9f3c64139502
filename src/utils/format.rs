use bigdecimal::BigDecimal;
use ethers_core::types::U256;
use num_format::{Locale, ToFormattedString};
use std::str::FromStr;

/// 将 U256 转为 BigDecimal（经字符串中转，大数最稳）
pub fn u256_to_bigdecimal(value: U256) -> BigDecimal {
    let s = value.to_string();
    BigDecimal::from_str(&s).unwrap_or_else(|_| BigDecimal::from(0))
}

/// wei 转 ether，用于日志与展示
pub fn wei_to_ether(value: U256) -> BigDecimal {
    let wei = u256_to_bigdecimal(value);
    let one_ether = BigDecimal::from_str("1000000000000000000")
        .unwrap_or_else(|_| BigDecimal::from(1));
    wei / one_ether
}

/// 千分位分组，日志里的 gas 数字更可读
pub fn group_digits(value: u64) -> String {
    value.to_formatted_string(&Locale::en)
}
