//! Shared HTTP clients, one per base URL.
//!
//! Provider calls to the same host reuse a single `reqwest::Client` so connections, DNS
//! lookups and TLS sessions survive across persona turns.

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

lazy_static! {
    static ref HTTP_CLIENT_POOL: Mutex<HashMap<String, reqwest::Client>> =
        Mutex::new(HashMap::new());
}

/// Returns the pooled client for `base_url`, building it on first use.
pub fn get_http_client(base_url: &str) -> Result<reqwest::Client, reqwest::Error> {
    let mut pool = HTTP_CLIENT_POOL.lock().unwrap_or_else(|p| p.into_inner());
    if let Some(client) = pool.get(base_url) {
        return Ok(client.clone());
    }

    let client = reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    log::debug!("created pooled HTTP client for {}", base_url);
    pool.insert(base_url.to_string(), client.clone());
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_base_url_reuses_entry() {
        let url = "https://pool-test.example.com/v1/";
        for _ in 0..5 {
            get_http_client(url).unwrap();
        }
        let pool = HTTP_CLIENT_POOL.lock().unwrap();
        assert_eq!(pool.keys().filter(|k| k.as_str() == url).count(), 1);
    }

    #[test]
    fn different_providers_get_separate_entries() {
        let groq = "https://api.groq.com/openai/v1/";
        let cerebras = "https://api.cerebras.ai/v1/";
        get_http_client(groq).unwrap();
        get_http_client(cerebras).unwrap();
        let pool = HTTP_CLIENT_POOL.lock().unwrap();
        assert!(pool.contains_key(groq));
        assert!(pool.contains_key(cerebras));
    }
}
