pub mod local_wallet;
pub mod wallet_provider;

pub use local_wallet::LocalWalletProvider;
pub use wallet_provider::{WalletEvent, WalletProvider};
