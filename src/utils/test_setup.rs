use dotenvy::dotenv;
use std::sync::Once;

static INIT: Once = Once::new();

/// Loads `.env` and fills in settings that keep tests fast and local.
pub fn setup_test_env() {
    INIT.call_once(|| {
        dotenv().ok();
        if std::env::var("OUTSIDER_BIND_ADDR").is_err() {
            std::env::set_var("OUTSIDER_BIND_ADDR", "127.0.0.1:0");
        }
        if std::env::var("OUTSIDER_CONNECT_TIMEOUT_MS").is_err() {
            std::env::set_var("OUTSIDER_CONNECT_TIMEOUT_MS", "2000");
        }
        if std::env::var("OUTSIDER_JOIN_SETTLE_MS").is_err() {
            std::env::set_var("OUTSIDER_JOIN_SETTLE_MS", "20");
        }
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("outsider=debug"))
            .with_test_writer()
            .try_init();
    });
}
