use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use offline_cache::prelude::*;
use offline_cache::task::TaskHandle;
use offline_cache::{logger, Config};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// 无界面的展示层: 把指令转发给主循环
enum ShellCommand {
    Indicator(bool),
    RenderCached(String, usize),
    Notice,
    LoadLive(String),
}

struct HeadlessShell {
    tx: mpsc::UnboundedSender<ShellCommand>,
}

impl HeadlessShell {
    fn send(&self, command: ShellCommand) {
        if self.tx.send(command).is_err() {
            warn!("Shell loop is gone, dropping command");
        }
    }
}

impl PresentationShell for HeadlessShell {
    fn set_offline_indicator(&self, visible: bool) {
        self.send(ShellCommand::Indicator(visible));
    }

    fn render_cached(&self, url: &str, document: &str) {
        self.send(ShellCommand::RenderCached(url.to_string(), document.len()));
    }

    fn show_offline_notice(&self) {
        self.send(ShellCommand::Notice);
    }

    fn load_live(&self, url: &str) {
        self.send(ShellCommand::LoadLive(url.to_string()));
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    config.validate()?;
    logger::init_logger(&config.logging.filter);

    info!("Starting offline shell for {}", config.shell.primary_url);

    let errors = Arc::new(ErrorReporter::new(config.error_log.capacity));
    let store = Arc::new(FileStore::open(&config.cache.store_path).await?);
    let cache = Arc::new(
        CacheManager::new(store, config.cache_policy())
            .with_namespace(config.cache.namespace.clone())?
            .with_error_reporter(errors.clone()),
    );

    let cleaner = config
        .cache
        .sweep_interval_secs
        .map(|secs| CacheCleaner::new(cache.clone(), Duration::from_secs(secs)).start());

    let probe_timeout = Duration::from_secs(config.network.probe_timeout_secs);
    let monitor = Arc::new(ProbeNetworkMonitor::new(&config.network.probe_url, probe_timeout)?);
    let poller = monitor.spawn_poller(Duration::from_secs(config.network.poll_interval_secs));
    let fetcher = PageFetcher::new(config.network.max_retries, probe_timeout * 2);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let shell = Arc::new(HeadlessShell { tx });
    let orchestrator = Arc::new(
        OfflineOrchestrator::start(monitor.clone(), cache.clone(), shell.clone(), &config.shell.primary_url)
            .await?,
    );
    let watcher = orchestrator.watch();

    if orchestrator.is_online().await {
        shell.load_live(orchestrator.primary_url());
    }

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);
    // 新的加载会中止尚未完成的旧加载
    let mut live_load: Option<TaskHandle> = None;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(command) = rx.recv() => match command {
                ShellCommand::Indicator(visible) => info!("Offline indicator visible: {}", visible),
                ShellCommand::RenderCached(url, len) => info!("Rendering cached {} ({} bytes)", url, len),
                ShellCommand::Notice => info!("No connection. Showing offline notice"),
                ShellCommand::LoadLive(url) => {
                    live_load = Some(spawn_live_load(
                        fetcher.clone(),
                        orchestrator.clone(),
                        errors.clone(),
                        url,
                    ));
                }
            },
        }
    }

    // 优雅关闭
    info!("Shutting down...");
    drop(live_load);
    watcher.stop();
    poller.stop();
    if let Some(cleaner) = cleaner {
        cleaner.stop();
    }

    let stats = cache.stats().await;
    info!(
        "Cache holds {} entries ({} bytes), {} errors recorded",
        stats.entry_count,
        stats.total_size,
        errors.len()
    );
    info!("Shutdown complete");

    Ok(())
}

fn spawn_live_load(
    fetcher: PageFetcher,
    orchestrator: Arc<OfflineOrchestrator>,
    errors: Arc<ErrorReporter>,
    url: String,
) -> TaskHandle {
    let handle = tokio::spawn(async move {
        match fetcher.fetch(&url).await {
            Ok(page) => {
                info!("Loaded live page {} ({} bytes)", page.url, page.body.len());
                orchestrator.on_page_loaded(&page.url, &page.body).await;
            }
            Err(e) => {
                error!("Live load of {} failed: {}", url, e);
                errors.record("shell.load", &e);
            }
        }
    });
    TaskHandle::new("live-load", handle)
}

/// Resolves on Ctrl+C. If the handler cannot be installed this never
/// resolves, leaving SIGTERM (or a kill) as the way out.
async fn until_interrupted<F>(ctrl_c: F)
where
    F: Future<Output = io::Result<()>>,
{
    match ctrl_c.await {
        Ok(()) => info!("Received Ctrl+C signal"),
        Err(e) => {
            warn!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal as unix_signal, SignalKind};

        match unix_signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = until_interrupted(signal::ctrl_c()) => {}
                    _ = terminate.recv() => info!("Received terminate signal"),
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                until_interrupted(signal::ctrl_c()).await;
            }
        }
    }

    #[cfg(not(unix))]
    until_interrupted(signal::ctrl_c()).await;
}
