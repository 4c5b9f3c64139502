pub mod config;

pub use config::{Config, EthereumConfig, LogConfig, TxConfig, WalletConfig};
