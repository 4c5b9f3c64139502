use crate::errors::classify::{classify, ClassifiedError};
use crate::errors::error::WalletError;
use crate::infrastructure::wallet::{WalletEvent, WalletProvider};
use crate::services::connection::session_store::SessionStore;
use crate::{log_info, log_warn};
use arc_swap::ArcSwap;
use ethers_core::types::Address;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// 会话恢复标记键
pub const SESSION_MARKER_KEY: &str = "wallet.connected";

/// 连接读模型。address 有值当且仅当会话处于已连接状态。
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    pub address: Option<Address>,
    pub chain_id: Option<u64>,
    pub is_connecting: bool,
    pub last_error: Option<ClassifiedError>,
}

/// 维护单个钱包连接及其网络身份。
/// 状态经 ArcSwap 发布，快照读取无锁；写入遵循 last-write-wins，
/// 钱包推送事件与进行中的操作交错属于预期行为而非缺陷。
pub struct ConnectionManager {
    wallet: Arc<dyn WalletProvider>,
    store: Arc<dyn SessionStore>,
    state: ArcSwap<ConnectionState>,
    /// connect 串行化锁：同一时刻至多一个上游授权请求
    connect_lock: Mutex<()>,
    /// 每次 connect 完成（无论成败）时自增；等锁的并发调用据此复用结果
    connect_epoch: AtomicU64,
}

impl ConnectionManager {
    pub fn new(wallet: Arc<dyn WalletProvider>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            wallet,
            store,
            state: ArcSwap::from_pointee(ConnectionState::default()),
            connect_lock: Mutex::new(()),
            connect_epoch: AtomicU64::new(0),
        }
    }

    /// 当前连接状态快照（无锁）
    pub fn snapshot(&self) -> ConnectionState {
        self.state.load_full().as_ref().clone()
    }

    fn update_state(&self, f: impl FnOnce(&mut ConnectionState)) {
        let mut next = self.snapshot();
        f(&mut next);
        self.state.store(Arc::new(next));
    }

    /// 请求账户授权并建立连接。
    /// 并发调用时只发起一次上游请求：等锁的调用方直接复用先完成者的结果。
    pub async fn connect(&self) -> Result<ConnectionState, ClassifiedError> {
        let epoch_at_entry = self.connect_epoch.load(Ordering::SeqCst);
        let _guard = self.connect_lock.lock().await;

        // 等锁期间已有 connect 完成：复用其结果，不再发起第二次请求
        if self.connect_epoch.load(Ordering::SeqCst) != epoch_at_entry {
            let snapshot = self.snapshot();
            return match snapshot.last_error.clone() {
                Some(err) => Err(err),
                None => Ok(snapshot),
            };
        }

        // 已连接则幂等返回
        if self.snapshot().address.is_some() {
            return Ok(self.snapshot());
        }

        self.update_state(|s| s.is_connecting = true);

        let result = self.do_connect().await;
        self.connect_epoch.fetch_add(1, Ordering::SeqCst);

        match result {
            Ok(()) => {
                let snapshot = self.snapshot();
                log_info!(
                    "钱包连接成功 → address: {:?} | chain_id: {:?}",
                    snapshot.address,
                    snapshot.chain_id
                );
                Ok(snapshot)
            }
            Err(err) => {
                let classified = classify(err);
                self.update_state(|s| {
                    s.is_connecting = false;
                    s.address = None;
                    s.last_error = Some(classified.clone());
                });
                Err(classified)
            }
        }
    }

    async fn do_connect(&self) -> Result<(), anyhow::Error> {
        let accounts = self.wallet.request_accounts().await?;
        let address = accounts.first().copied().ok_or(WalletError::Unavailable)?;
        let chain_id = self.wallet.chain_id().await?;

        // 标记写入失败只影响下次启动的会话恢复，不让连接本身失败
        if let Err(e) = self.store.set(SESSION_MARKER_KEY, "1") {
            log_warn!("会话标记写入失败: {}", e);
        }

        self.update_state(|s| {
            s.address = Some(address);
            s.chain_id = Some(chain_id);
            s.is_connecting = false;
            s.last_error = None;
        });
        Ok(())
    }

    /// 断开连接：仅重置本地状态并清除恢复标记。
    /// 钱包不支持程序化断连，因此没有远端副作用，总是成功。
    pub fn disconnect(&self) {
        if let Err(e) = self.store.remove(SESSION_MARKER_KEY) {
            log_warn!("会话标记清除失败: {}", e);
        }
        self.state.store(Arc::new(ConnectionState::default()));
        log_info!("已断开钱包连接（仅本地状态）");
    }

    /// 请求钱包切换网络。成功后以钱包实际报告的链为准刷新 chain_id；
    /// 不改动 address。
    pub async fn switch_network(&self, target_chain_id: u64) -> Result<(), ClassifiedError> {
        match self.wallet.switch_chain(target_chain_id).await {
            Ok(()) => {
                let chain_id = self
                    .wallet
                    .chain_id()
                    .await
                    .map_err(|e| classify(e.into()))?;
                self.update_state(|s| {
                    s.chain_id = Some(chain_id);
                    s.last_error = None;
                });
                log_info!("已切换网络 → chain_id: {}", chain_id);
                Ok(())
            }
            Err(err) => {
                let classified = classify(err.into());
                self.update_state(|s| s.last_error = Some(classified.clone()));
                Err(classified)
            }
        }
    }

    /// 启动时恢复会话。无标记时不做任何事；有标记则做非交互查询，
    /// 授权已被撤销时清除标记并保持空状态。恢复流程不展示连接中状态。
    pub async fn restore_session(&self) -> Result<ConnectionState, ClassifiedError> {
        let marker = self
            .store
            .get(SESSION_MARKER_KEY)
            .map_err(|e| classify(e.into()))?;
        if marker.is_none() {
            return Ok(self.snapshot());
        }

        match self.wallet.get_accounts().await {
            Ok(accounts) if accounts.is_empty() => {
                if let Err(e) = self.store.remove(SESSION_MARKER_KEY) {
                    log_warn!("会话标记清除失败: {}", e);
                }
                Ok(self.snapshot())
            }
            Ok(accounts) => {
                let chain_id = self
                    .wallet
                    .chain_id()
                    .await
                    .map_err(|e| classify(e.into()))?;
                self.update_state(|s| {
                    s.address = accounts.first().copied();
                    s.chain_id = Some(chain_id);
                    s.is_connecting = false;
                    s.last_error = None;
                });
                let snapshot = self.snapshot();
                log_info!(
                    "会话已恢复 → address: {:?} | chain_id: {}",
                    snapshot.address,
                    chain_id
                );
                Ok(snapshot)
            }
            Err(err) => {
                let classified = classify(err.into());
                self.update_state(|s| s.last_error = Some(classified.clone()));
                Err(classified)
            }
        }
    }

    /// 处理一条钱包推送事件。必须幂等；与进行中的操作交错时 last-write-wins。
    pub fn handle_event(&self, event: WalletEvent) {
        match event {
            WalletEvent::AccountsChanged(accounts) => match accounts.first().copied() {
                // 空账户列表等价于断开
                None => self.disconnect(),
                Some(address) => self.update_state(|s| s.address = Some(address)),
            },
            WalletEvent::ChainChanged(chain_id) => {
                self.update_state(|s| s.chain_id = Some(chain_id));
            }
            WalletEvent::Disconnected => self.disconnect(),
        }
    }

    /// 启动事件循环：消费钱包推送队列直至通道关闭
    pub fn spawn_event_loop(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        let mut events = manager.wallet.subscribe();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                manager.handle_event(event);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::classify::ErrorKind;
    use crate::services::connection::session_store::MemorySessionStore;
    use crate::test_support::MockWallet;

    fn manager_with(wallet: Arc<MockWallet>, store: Arc<dyn SessionStore>) -> ConnectionManager {
        ConnectionManager::new(wallet, store)
    }

    fn addr(n: u8) -> Address {
        Address::from_low_u64_be(n as u64)
    }

    #[tokio::test]
    async fn connect_populates_state_and_marker() {
        let wallet = Arc::new(MockWallet::with_accounts(vec![addr(1)], 5));
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_with(wallet, store.clone());

        let state = manager.connect().await.unwrap();
        assert_eq!(state.address, Some(addr(1)));
        assert_eq!(state.chain_id, Some(5));
        assert!(!state.is_connecting);
        assert!(state.last_error.is_none());
        assert_eq!(store.get(SESSION_MARKER_KEY).unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn disconnect_always_yields_empty_state() {
        let wallet = Arc::new(MockWallet::with_accounts(vec![addr(1)], 5));
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_with(wallet, store.clone());

        manager.connect().await.unwrap();
        manager.disconnect();

        let state = manager.snapshot();
        assert!(state.address.is_none());
        assert!(state.chain_id.is_none());
        assert!(!state.is_connecting);
        assert!(state.last_error.is_none());
        assert_eq!(store.get(SESSION_MARKER_KEY).unwrap(), None);

        // 重复断开同样成功
        manager.disconnect();
        assert!(manager.snapshot().address.is_none());
    }

    #[tokio::test]
    async fn concurrent_connect_issues_single_upstream_request() {
        let wallet = Arc::new(
            MockWallet::with_accounts(vec![addr(1)], 5).with_request_delay_ms(30),
        );
        let store = Arc::new(MemorySessionStore::new());
        let manager = Arc::new(manager_with(wallet.clone(), store));

        let (a, b) = tokio::join!(manager.connect(), manager.connect());
        assert_eq!(a.unwrap().address, Some(addr(1)));
        assert_eq!(b.unwrap().address, Some(addr(1)));
        assert_eq!(wallet.request_account_calls(), 1);
    }

    #[tokio::test]
    async fn rejected_connect_classifies_and_keeps_address_empty() {
        let wallet = Arc::new(MockWallet::rejecting());
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_with(wallet, store.clone());

        let err = manager.connect().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::UserRejected);

        let state = manager.snapshot();
        assert!(state.address.is_none());
        assert!(!state.is_connecting);
        assert_eq!(state.last_error.unwrap().kind, ErrorKind::UserRejected);
        // 失败的连接不应留下恢复标记
        assert_eq!(store.get(SESSION_MARKER_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn restore_session_round_trip() {
        let store = Arc::new(MemorySessionStore::new());

        let before = {
            let wallet = Arc::new(MockWallet::with_accounts(vec![addr(7)], 11155111));
            let manager = manager_with(wallet, store.clone());
            manager.connect().await.unwrap()
        };

        // 模拟进程重启：同一持久化存储，新的管理器实例
        let wallet = Arc::new(MockWallet::with_accounts(vec![addr(7)], 11155111));
        let manager = manager_with(wallet.clone(), store);
        let after = manager.restore_session().await.unwrap();

        assert_eq!(after.address, before.address);
        assert_eq!(after.chain_id, before.chain_id);
        // 恢复走的是非交互查询，不会弹出授权框
        assert_eq!(wallet.request_account_calls(), 0);
        assert_eq!(wallet.get_account_calls(), 1);
    }

    #[tokio::test]
    async fn restore_session_without_marker_is_noop() {
        let wallet = Arc::new(MockWallet::with_accounts(vec![addr(7)], 1));
        let manager = manager_with(wallet.clone(), Arc::new(MemorySessionStore::new()));

        let state = manager.restore_session().await.unwrap();
        assert!(state.address.is_none());
        assert_eq!(wallet.get_account_calls(), 0);
    }

    #[tokio::test]
    async fn restore_session_clears_marker_when_authorization_revoked() {
        let store = Arc::new(MemorySessionStore::new());
        store.set(SESSION_MARKER_KEY, "1").unwrap();

        let wallet = Arc::new(MockWallet::with_accounts(vec![], 1));
        let manager = manager_with(wallet, store.clone());

        let state = manager.restore_session().await.unwrap();
        assert!(state.address.is_none());
        assert_eq!(store.get(SESSION_MARKER_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn switch_to_unknown_network_is_validation_error() {
        let wallet = Arc::new(MockWallet::with_accounts(vec![addr(1)], 5));
        let manager = manager_with(wallet, Arc::new(MemorySessionStore::new()));
        manager.connect().await.unwrap();

        let err = manager.switch_network(999).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        // address 不受影响
        assert_eq!(manager.snapshot().address, Some(addr(1)));
    }

    #[tokio::test]
    async fn switch_rejected_by_user() {
        let wallet = Arc::new(MockWallet::with_accounts(vec![addr(1)], 5).with_switch_rejection());
        let manager = manager_with(wallet, Arc::new(MemorySessionStore::new()));
        manager.connect().await.unwrap();

        let err = manager.switch_network(5).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::UserRejected);
    }

    #[tokio::test]
    async fn empty_accounts_event_disconnects() {
        let wallet = Arc::new(MockWallet::with_accounts(vec![addr(1)], 5));
        let manager = manager_with(wallet, Arc::new(MemorySessionStore::new()));
        manager.connect().await.unwrap();

        manager.handle_event(WalletEvent::AccountsChanged(vec![]));
        assert!(manager.snapshot().address.is_none());
    }

    #[tokio::test]
    async fn account_and_chain_events_are_last_write_wins() {
        let wallet = Arc::new(MockWallet::with_accounts(vec![addr(1)], 5));
        let manager = manager_with(wallet, Arc::new(MemorySessionStore::new()));
        manager.connect().await.unwrap();

        manager.handle_event(WalletEvent::AccountsChanged(vec![addr(2), addr(3)]));
        manager.handle_event(WalletEvent::ChainChanged(10));
        manager.handle_event(WalletEvent::ChainChanged(42161));

        let state = manager.snapshot();
        assert_eq!(state.address, Some(addr(2)));
        assert_eq!(state.chain_id, Some(42161));

        // 幂等：重复投递同一事件不改变结果
        manager.handle_event(WalletEvent::ChainChanged(42161));
        assert_eq!(manager.snapshot().chain_id, Some(42161));
    }

    #[tokio::test]
    async fn event_loop_consumes_pushed_events() {
        let wallet = Arc::new(MockWallet::with_accounts(vec![addr(1)], 5));
        let manager = Arc::new(manager_with(wallet.clone(), Arc::new(MemorySessionStore::new())));
        manager.connect().await.unwrap();

        let handle = manager.spawn_event_loop();
        wallet.emit(WalletEvent::ChainChanged(10));
        wallet.emit(WalletEvent::AccountsChanged(vec![addr(9)]));

        // 等待事件循环消费
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let state = manager.snapshot();
        assert_eq!(state.chain_id, Some(10));
        assert_eq!(state.address, Some(addr(9)));
        handle.abort();
    }
}
