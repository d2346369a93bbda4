use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub fn init() {
    init_with("info");
}

/// RUST_LOG 未设置时使用 `default_directive`，已有全局订阅者时保留原来的
pub fn init_with(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let fmt = tracing_subscriber::fmt::layer()
        .with_thread_ids(true)
        .with_target(false);
    match tracing_subscriber::registry().with(filter).with(fmt).try_init() {
        Ok(()) => true,
        Err(e) => {
            debug!("日志已初始化，跳过: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_keeps_existing_subscriber() {
        init_with("debug");
        assert!(!init_with("info"));
    }
}
