use tracing_subscriber::EnvFilter;

/// 初始化日志. `RUST_LOG` 优先于配置中的默认过滤规则
pub fn init_logger(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();
}
