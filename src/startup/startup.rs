use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::errors::error::AppError;
use crate::infrastructure::provider::{EthereumProvider, NetworkClient, RetryAdapter};
use crate::infrastructure::wallet::{LocalWalletProvider, WalletProvider};
use crate::log_info;
use crate::services::connection::{ConnectionManager, FileSessionStore, SessionStore};
use crate::services::tx::cache::ContractCallCache;
use crate::services::tx::gas::GasService;
use crate::services::tx::slippage::SlippageTolerance;
use crate::services::tx::submitter::TransactionSubmitter;
use crate::services::tx::types::TxOptions;

/// 应用装配与生命周期管理
pub struct Application {
    pub config: Config,
    pub provider: Arc<dyn NetworkClient>,
    pub wallet: Arc<dyn WalletProvider>,
    pub connection: Arc<ConnectionManager>,
    pub call_cache: Arc<ContractCallCache>,
    pub slippage: SlippageTolerance,
    gas_svc: GasService,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl Application {
    /// 构建应用实例（初始化 provider/钱包/会话存储，不启动服务）
    pub async fn build(config: Config) -> Result<Self> {
        // 1. Provider 池 + 重试适配器
        let eth_provider = Arc::new(EthereumProvider::new(&config.ethereum)?);
        let provider = Arc::new(RetryAdapter::new(
            eth_provider,
            config.ethereum.max_retries,
            Duration::from_secs(config.ethereum.base_delay_secs),
        )) as Arc<dyn NetworkClient>;
        info!("RPC provider initialized");

        // 2. 内嵌签名钱包（任何满足 WalletProvider 契约的实现均可替换）
        let wallet =
            Arc::new(LocalWalletProvider::new(&config.ethereum, &config.wallet)?)
                as Arc<dyn WalletProvider>;

        // 3. 会话存储 + 连接管理
        let store = Arc::new(FileSessionStore::new(config.wallet.session_file.as_str())?)
            as Arc<dyn SessionStore>;
        let connection = Arc::new(ConnectionManager::new(wallet.clone(), store));

        // 4. 调用缓存、gas 服务与滑点默认值
        let call_cache = Arc::new(ContractCallCache::new(Duration::from_secs(
            config.tx.cache_ttl_secs,
        )));
        let slippage = SlippageTolerance::new(config.tx.max_slippage_percent);
        let gas_svc = GasService::default();

        Ok(Self {
            config,
            provider,
            wallet,
            connection,
            call_cache,
            slippage,
            gas_svc,
        })
    }

    /// 为一笔新交易创建提交器。每笔交易独立实例，互不共享可变状态。
    pub fn new_submitter(&self) -> TransactionSubmitter {
        TransactionSubmitter::new(
            self.wallet.clone(),
            self.provider.clone(),
            self.gas_svc,
            self.config.ethereum.chain_id,
        )
    }

    /// 配置文件给出的单笔提交默认参数
    pub fn default_tx_options(&self) -> TxOptions {
        TxOptions::from_config(&self.config.tx)
    }

    /// 启动核心服务：恢复会话、消费钱包推送事件，直到收到退出信号
    pub async fn run(self) -> anyhow::Result<()> {
        match self.connection.restore_session().await {
            Ok(state) if state.address.is_some() => {
                log_info!("✔️ 会话已恢复 → {:?}", state.address)
            }
            Ok(_) => log_info!("无可恢复的会话，等待显式连接"),
            Err(e) => tracing::error!("会话恢复失败: {:?}", e),
        }

        let event_loop = self.connection.spawn_event_loop();

        log_info!("✔️ 核心服务已就绪");

        tokio::signal::ctrl_c().await?;
        log_info!("⚠️  收到退出信号，正在关闭...");
        event_loop.abort();
        Ok(())
    }
}
