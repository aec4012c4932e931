pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod error_log;
pub mod logger;
pub mod network;
pub mod orchestrator;
pub mod store;
pub mod task;
pub mod utils;

pub use config::Config;
pub use error::{CacheError, StoreError};

pub type Result<T> = std::result::Result<T, CacheError>;

pub mod prelude {
    pub use crate::cache::{CacheCleaner, CacheManager, CachePolicy, CacheStats};
    pub use crate::error_log::ErrorReporter;
    pub use crate::network::{
        NetworkMonitor, NetworkState, PageFetcher, ProbeNetworkMonitor, PushNetworkMonitor,
    };
    pub use crate::orchestrator::{ConnectivityState, OfflineOrchestrator, PresentationShell};
    pub use crate::store::{FileStore, KeyValueStore, MemoryStore};
}
