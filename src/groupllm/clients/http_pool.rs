//! HTTP client pool keeping one `reqwest::Client` per base URL.
//!
//! Every agent may point at a different endpoint, so the transport asks this pool for
//! the client of each request's base URL. Connections (DNS, TLS, keep-alive) are then
//! reused across agents sharing an endpoint and across turns.

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

lazy_static! {
    static ref HTTP_CLIENT_POOL: Mutex<HashMap<String, reqwest::Client>> =
        Mutex::new(HashMap::new());
}

/// Get or create the shared HTTP client for `base_url`.
///
/// Base URLs are compared after trimming a trailing `/`.
pub fn get_http_client(base_url: &str) -> reqwest::Client {
    let key = base_url.trim_end_matches('/').to_string();
    let mut pool = match HTTP_CLIENT_POOL.lock() {
        Ok(pool) => pool,
        Err(poisoned) => poisoned.into_inner(),
    };

    pool.entry(key).or_insert_with(create_pooled_client).clone()
}

fn create_pooled_client() -> reqwest::Client {
    reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .timeout(Duration::from_secs(300))
        .build()
        .unwrap_or_else(|e| {
            log::warn!("Falling back to default HTTP client settings: {}", e);
            reqwest::Client::new()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_keys_by_normalized_base_url() {
        let _a = get_http_client("https://pool-test.example.com/");
        let _b = get_http_client("https://pool-test.example.com");
        let _c = get_http_client("https://other-pool-test.example.com");

        let pool = HTTP_CLIENT_POOL.lock().unwrap();
        assert!(pool.contains_key("https://pool-test.example.com"));
        assert!(pool.contains_key("https://other-pool-test.example.com"));
        assert!(!pool.contains_key("https://pool-test.example.com/"));
    }
}
