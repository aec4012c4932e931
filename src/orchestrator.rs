//! Online/offline state machine driving what the shell shows.
//!
//! Going offline shows the offline indicator and either the last cached copy
//! of the primary page or a static notice. Coming back online hides the
//! indicator and reloads the live page. Repeated reports of the current
//! state do nothing.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::CacheManager;
use crate::error::CacheError;
use crate::error_log::ErrorReporter;
use crate::network::{NetworkMonitor, NetworkState};
use crate::task::TaskHandle;
use crate::utils::is_absolute_url;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Online,
    Offline,
}

impl From<&NetworkState> for ConnectivityState {
    fn from(state: &NetworkState) -> Self {
        if state.is_online() {
            ConnectivityState::Online
        } else {
            ConnectivityState::Offline
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineContent {
    Cached,
    Notice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentOffline(OfflineContent),
    WentOnline,
}

/// The UI side: browser view, banners, notices.
pub trait PresentationShell: Send + Sync {
    fn set_offline_indicator(&self, visible: bool);

    /// 用缓存内容替代在线页面
    fn render_cached(&self, url: &str, document: &str);

    fn show_offline_notice(&self);

    /// 重新请求在线页面, 丢弃当前显示的缓存内容
    fn load_live(&self, url: &str);
}

pub struct OfflineOrchestrator {
    monitor: Arc<dyn NetworkMonitor>,
    cache: Arc<CacheManager>,
    shell: Arc<dyn PresentationShell>,
    primary_url: String,
    state: Mutex<ConnectivityState>,
    errors: Arc<ErrorReporter>,
}

impl OfflineOrchestrator {
    /// Queries the monitor once to pick the initial state. When that state is
    /// offline the offline side effects run right away.
    pub async fn start(
        monitor: Arc<dyn NetworkMonitor>,
        cache: Arc<CacheManager>,
        shell: Arc<dyn PresentationShell>,
        primary_url: &str,
    ) -> Result<Self> {
        url::Url::parse(primary_url)
            .map_err(|e| CacheError::Config(format!("invalid primary url {}: {}", primary_url, e)))?;

        let errors = Arc::clone(cache.error_reporter());
        let initial = query_state(monitor.as_ref(), &errors).await;
        info!("Starting offline orchestrator for {} in state {:?}", primary_url, initial);

        let orchestrator = Self {
            monitor,
            cache,
            shell,
            primary_url: primary_url.to_string(),
            state: Mutex::new(initial),
            errors,
        };

        if initial == ConnectivityState::Offline {
            orchestrator.enter_offline().await;
        }

        Ok(orchestrator)
    }

    pub async fn state(&self) -> ConnectivityState {
        *self.state.lock().await
    }

    pub async fn is_online(&self) -> bool {
        self.state().await == ConnectivityState::Online
    }

    pub fn primary_url(&self) -> &str {
        &self.primary_url
    }

    /// Connectivity callback. Returns the transition taken, if any.
    pub async fn handle_network_change(&self, network: NetworkState) -> Option<Transition> {
        let mut state = self.state.lock().await;
        let next = ConnectivityState::from(&network);
        if *state == next {
            debug!("Ignoring network update, still {:?}: {:?}", next, network);
            return None;
        }

        *state = next;
        let transition = match next {
            ConnectivityState::Offline => self.enter_offline().await,
            ConnectivityState::Online => self.enter_online(),
        };
        Some(transition)
    }

    /// Manual "try again": re-queries the monitor and, when online, reloads
    /// the live page even if the state did not change.
    pub async fn retry(&self) -> ConnectivityState {
        let mut state = self.state.lock().await;
        let next = query_state(self.monitor.as_ref(), &self.errors).await;
        info!("Retry requested, network is {:?}", next);

        match next {
            ConnectivityState::Online => {
                *state = next;
                self.enter_online();
            }
            ConnectivityState::Offline if *state == ConnectivityState::Online => {
                *state = next;
                self.enter_offline().await;
            }
            ConnectivityState::Offline => debug!("Still offline after retry"),
        }
        next
    }

    /// Hook for a finished live page load. Caches the page as `text/html`
    /// under its final URL while online. Failures are logged, never raised.
    pub async fn on_page_loaded(&self, final_url: &str, html: &str) -> bool {
        if !self.is_online().await {
            debug!("Not caching {} while offline", final_url);
            return false;
        }
        if !is_absolute_url(final_url) {
            debug!("Not caching non-http page {}", final_url);
            return false;
        }

        match self.cache.cache_document(final_url, html).await {
            Ok(()) => {
                debug!("Cached live page {} ({} bytes)", final_url, html.len());
                true
            }
            Err(e) => {
                warn!("Failed to cache live page {}: {}", final_url, e);
                self.errors.record("orchestrator.cache_page", &e);
                false
            }
        }
    }

    /// Subscribes to the monitor and applies every update until the returned
    /// handle is stopped or dropped, which also unsubscribes.
    pub fn watch(self: &Arc<Self>) -> TaskHandle {
        let orchestrator = Arc::clone(self);
        let mut subscription = self.monitor.subscribe();

        let handle = tokio::spawn(async move {
            // 订阅前可能已经发生变化, 先对齐一次
            match orchestrator.monitor.current_state().await {
                Ok(state) => {
                    orchestrator.handle_network_change(state).await;
                }
                Err(e) => debug!("Skipping initial reconcile: {}", e),
            }

            while let Some(state) = subscription.recv().await {
                orchestrator.handle_network_change(state).await;
            }
            debug!("Network monitor closed, orchestrator stops watching");
        });

        TaskHandle::new("offline-orchestrator", handle)
    }

    async fn enter_offline(&self) -> Transition {
        info!("Connectivity lost, switching to offline mode");
        self.shell.set_offline_indicator(true);

        match self.cache.get_cached(&self.primary_url).await {
            Some(document) => {
                info!("Serving cached copy of {}", self.primary_url);
                self.shell.render_cached(&self.primary_url, &document);
                Transition::WentOffline(OfflineContent::Cached)
            }
            None => {
                info!("No cached copy of {}, showing offline notice", self.primary_url);
                self.shell.show_offline_notice();
                Transition::WentOffline(OfflineContent::Notice)
            }
        }
    }

    fn enter_online(&self) -> Transition {
        info!("Connectivity restored, reloading {}", self.primary_url);
        self.shell.set_offline_indicator(false);
        self.shell.load_live(&self.primary_url);
        Transition::WentOnline
    }
}

/// 查询失败时按离线处理
async fn query_state(monitor: &dyn NetworkMonitor, errors: &ErrorReporter) -> ConnectivityState {
    match monitor.current_state().await {
        Ok(state) => ConnectivityState::from(&state),
        Err(e) => {
            warn!("Network query failed, assuming offline: {}", e);
            errors.record("network.query", &e);
            ConnectivityState::Offline
        }
    }
}

impl std::fmt::Debug for OfflineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineOrchestrator")
            .field("primary_url", &self.primary_url)
            .finish()
    }
}
