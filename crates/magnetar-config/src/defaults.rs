//! Default values applied when optional variables are absent.

use std::time::Duration;

pub(crate) const SERVICE_PORT: u16 = 8080;
pub(crate) const BIND_ADDR: &str = "0.0.0.0";
pub(crate) const PROGRESS_CHECK_INTERVAL: Duration = Duration::from_secs(60);
pub(crate) const RECOVERY_CHECK_INTERVAL: Duration = Duration::from_secs(60);
pub(crate) const STALE_THRESHOLD: Duration = Duration::from_secs(10 * 60);
pub(crate) const ETA_SLACK: Duration = Duration::from_secs(10);
pub(crate) const CALL_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const PROGRESS_QUEUE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
