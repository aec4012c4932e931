use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Uri};
use hyper_tls::HttpsConnector;
use tracing::{debug, info, warn};

use super::{NetworkMonitor, NetworkState, PushNetworkMonitor, Subscription};
use crate::error::CacheError;
use crate::task::TaskHandle;
use crate::Result;

const PROBE_CONNECTION: &str = "probe";

/// Decides connectivity by requesting a probe URL. Any HTTP response counts
/// as reachable; a failed connection counts as offline.
#[derive(Debug)]
pub struct ProbeNetworkMonitor {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    probe_url: Uri,
    timeout: Duration,
    hub: PushNetworkMonitor,
}

impl ProbeNetworkMonitor {
    pub fn new(probe_url: &str, timeout: Duration) -> Result<Self> {
        let probe_url: Uri = probe_url
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| CacheError::Config(e.to_string()))?;
        info!("Creating network probe against {}", probe_url);

        Ok(Self {
            client: Client::builder().build(HttpsConnector::new()),
            probe_url,
            timeout,
            hub: PushNetworkMonitor::new(NetworkState::offline()),
        })
    }

    pub async fn probe(&self) -> Result<NetworkState> {
        let request = self.client.get(self.probe_url.clone());
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(resp)) => {
                debug!("Probe answered with {}", resp.status());
                Ok(NetworkState::online(PROBE_CONNECTION))
            }
            Ok(Err(e)) if e.is_connect() => {
                debug!("Probe connection failed: {}", e);
                Ok(NetworkState::offline())
            }
            Ok(Err(e)) => Err(CacheError::NetworkQuery(e.to_string())),
            Err(_) => Err(CacheError::NetworkQuery(format!(
                "probe timed out after {:?}",
                self.timeout
            ))),
        }
    }

    /// Probes every `every` and publishes to subscribers whenever the
    /// online/offline verdict changes. Failed probes count as offline.
    pub fn spawn_poller(self: &Arc<Self>, every: Duration) -> TaskHandle {
        info!("Starting network poller with interval {:?}", every);
        let monitor = Arc::clone(self);

        let handle = tokio::spawn(async move {
            loop {
                let state = monitor.probe().await.unwrap_or_else(|e| {
                    warn!("Network probe failed, assuming offline: {}", e);
                    NetworkState::offline()
                });
                monitor.record(state);
                tokio::time::sleep(every).await;
            }
        });

        TaskHandle::new("network-poller", handle)
    }

    fn record(&self, state: NetworkState) {
        if state.is_online() != self.hub.latest().is_online() {
            info!("Connectivity changed: online = {}", state.is_online());
            self.hub.publish(state);
        }
    }
}

#[async_trait]
impl NetworkMonitor for ProbeNetworkMonitor {
    async fn current_state(&self) -> Result<NetworkState> {
        let state = self.probe().await?;
        self.record(state.clone());
        Ok(state)
    }

    fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }
}
