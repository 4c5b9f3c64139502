pub mod gas_service;
pub mod gas_strategy;

pub use gas_service::{GasService, MIN_TX_GAS};
pub use gas_strategy::TxPriority;
