//! Opt-in fixture for suites that exercise a live Redis server.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

/// Environment variable naming the Redis instance used by integration tests.
pub const TEST_REDIS_URL_ENV: &str = "MAGNETAR_TEST_REDIS_URL";

const DEFAULT_REDIS_PORT: u16 = 6379;
const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Handle to a reachable Redis server supplied by the environment.
#[derive(Debug, Clone)]
pub struct TestRedis {
    url: String,
}

impl TestRedis {
    /// Resolve the Redis instance named by `MAGNETAR_TEST_REDIS_URL`.
    ///
    /// Returns `Ok(None)` when the variable is unset or the server does not
    /// accept connections, so callers can skip instead of failing.
    ///
    /// # Errors
    ///
    /// Returns an error when the variable holds an unparsable URL.
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var(TEST_REDIS_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::probe(url.trim()),
            _ => Ok(None),
        }
    }

    fn probe(raw: &str) -> Result<Option<Self>> {
        let parsed = Url::parse(raw).with_context(|| format!("invalid {TEST_REDIS_URL_ENV}"))?;
        let host = parsed
            .host_str()
            .with_context(|| format!("{TEST_REDIS_URL_ENV} has no host"))?;
        let port = parsed.port().unwrap_or(DEFAULT_REDIS_PORT);
        Ok(reachable(host, port).then(|| Self {
            url: raw.to_string(),
        }))
    }

    /// Connection URL for [`magnetar_runtime::RedisStore::connect`].
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Returns `true` when a live Redis server is configured and reachable.
#[must_use]
pub fn redis_available() -> bool {
    matches!(TestRedis::from_env(), Ok(Some(_)))
}

fn reachable(host: &str, port: u16) -> bool {
    (host, port)
        .to_socket_addrs()
        .map(|mut addrs| {
            addrs.any(|addr| TcpStream::connect_timeout(&addr, PROBE_TIMEOUT).is_ok())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_rejects_unparsable_urls() {
        assert!(TestRedis::probe("not a url").is_err());
    }

    #[test]
    fn probe_skips_unreachable_servers() -> Result<()> {
        assert!(TestRedis::probe("redis://127.0.0.1:9")?.is_none());
        Ok(())
    }

    #[test]
    fn redis_available_matches_env_probe() {
        let expected = matches!(TestRedis::from_env(), Ok(Some(_)));
        assert_eq!(redis_available(), expected);
    }
}
