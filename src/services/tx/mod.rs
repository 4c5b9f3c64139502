pub mod batch;
pub mod cache;
pub mod gas;
pub mod slippage;
pub mod submitter;
pub mod types;

pub use batch::batch_call;
pub use cache::ContractCallCache;
pub use slippage::SlippageTolerance;
pub use submitter::TransactionSubmitter;
pub use types::{TransactionRecord, TxOptions, TxRequest, TxStatus};
