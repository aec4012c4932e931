use offline_cache::prelude::*;
use std::sync::Arc;
use tracing::{info, warn};

struct LogShell;

impl PresentationShell for LogShell {
    fn set_offline_indicator(&self, visible: bool) {
        info!("offline indicator: {}", visible);
    }

    fn render_cached(&self, url: &str, document: &str) {
        info!("rendering cached {} ({} bytes)", url, document.len());
    }

    fn show_offline_notice(&self) {
        info!("no connection");
    }

    fn load_live(&self, url: &str) {
        info!("reloading {}", url);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting offline walkthrough");

    let cache = Arc::new(CacheManager::new(
        Arc::new(MemoryStore::new()),
        CachePolicy::default().with_max_size(1024 * 1024),
    ));

    // 存储测试数据
    let pages = [
        ("https://example.com/", "<html>home</html>", "text/html"),
        ("https://example.com/app.css", "body { margin: 0 }", "text/css"),
        ("https://example.com/logo.png", "PNG", "image/png"),
    ];
    for (url, data, content_type) in pages {
        match cache.cache(url, data, content_type).await {
            Ok(_) => info!("Cached {}", url),
            Err(e) => warn!("Failed to cache {}: {}", url, e),
        }
    }

    let stats = cache.stats().await;
    info!("Cache stats:");
    info!("  - Entries: {}", stats.entry_count);
    info!("  - Total size: {} bytes", stats.total_size);

    // 模拟断网和恢复
    let monitor = Arc::new(PushNetworkMonitor::new(NetworkState::online("wifi")));
    let orchestrator = Arc::new(
        OfflineOrchestrator::start(monitor.clone(), cache.clone(), Arc::new(LogShell), "https://example.com/")
            .await?,
    );

    orchestrator.handle_network_change(NetworkState::offline()).await;
    orchestrator.handle_network_change(NetworkState::offline()).await;
    orchestrator.handle_network_change(NetworkState::online("cellular")).await;
    info!("Final state: {:?}", orchestrator.state().await);

    cache.clear().await?;
    info!("Walkthrough completed, cache size {}", cache.size().await);
    Ok(())
}
