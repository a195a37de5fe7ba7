use once_cell::sync::OnceCell;
use std::time::Duration;

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}

fn connect_timeout() -> Duration {
    Duration::from_secs(env_u64("SPOTLOG_HTTP_CONNECT_TIMEOUT_SECS", 3).max(1))
}

fn user_agent() -> String {
    format!("spotlog/{}", env!("CARGO_PKG_VERSION"))
}

/// Base client builder with harmonized defaults. No request timeout is set
/// here; callers get platform defaults and must not assume retries.
pub(crate) fn builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .user_agent(user_agent())
        .connect_timeout(connect_timeout())
}

/// Shared default client.
pub(crate) fn client() -> &'static reqwest::Client {
    static CLIENT: OnceCell<reqwest::Client> = OnceCell::new();
    CLIENT.get_or_init(|| builder().build().expect("http client"))
}
