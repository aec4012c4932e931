//! Connectivity reporting.
//!
//! A [`NetworkMonitor`] answers point-in-time queries and pushes every
//! connectivity change to its subscribers. Dropping a [`Subscription`]
//! unsubscribes it.

use std::sync::RwLock;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::Result;

mod fetch;
mod probe;
mod retry;

pub use fetch::{FetchedPage, PageFetcher};
pub use probe::ProbeNetworkMonitor;

const SUBSCRIBER_BUFFER: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkState {
    pub is_connected: bool,
    /// None when the platform could not tell
    pub is_internet_reachable: Option<bool>,
    pub connection_type: String,
}

impl NetworkState {
    pub fn online(connection_type: &str) -> Self {
        Self {
            is_connected: true,
            is_internet_reachable: Some(true),
            connection_type: connection_type.to_string(),
        }
    }

    pub fn offline() -> Self {
        Self {
            is_connected: false,
            is_internet_reachable: Some(false),
            connection_type: "none".to_string(),
        }
    }

    /// Connected and not known to be unreachable. Unknown reachability
    /// counts as online.
    pub fn is_online(&self) -> bool {
        self.is_connected && self.is_internet_reachable != Some(false)
    }
}

#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// 查询当前网络状态
    async fn current_state(&self) -> Result<NetworkState>;

    /// 订阅状态变化, 丢弃返回值即取消订阅
    fn subscribe(&self) -> Subscription;
}

#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<NetworkState>,
}

impl Subscription {
    fn new(rx: broadcast::Receiver<NetworkState>) -> Self {
        Self { rx }
    }

    /// Next state change, or None once the monitor is gone. A subscriber
    /// that falls behind skips ahead to the newest states.
    pub async fn recv(&mut self) -> Option<NetworkState> {
        loop {
            match self.rx.recv().await {
                Ok(state) => return Some(state),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Network subscriber lagged, skipped {} updates", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

/// Monitor fed by the host platform: every [`publish`](Self::publish) updates
/// the current state and is pushed to all subscribers.
#[derive(Debug)]
pub struct PushNetworkMonitor {
    current: RwLock<NetworkState>,
    sender: broadcast::Sender<NetworkState>,
}

impl PushNetworkMonitor {
    pub fn new(initial: NetworkState) -> Self {
        let (sender, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            current: RwLock::new(initial),
            sender,
        }
    }

    pub fn publish(&self, state: NetworkState) {
        debug!("Network state update: {:?}", state);
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = state.clone();
        // 没有订阅者时发送失败, 可以忽略
        let _ = self.sender.send(state);
    }

    pub fn latest(&self) -> NetworkState {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl NetworkMonitor for PushNetworkMonitor {
    async fn current_state(&self) -> Result<NetworkState> {
        Ok(self.latest())
    }

    fn subscribe(&self) -> Subscription {
        Subscription::new(self.sender.subscribe())
    }
}
