//! Validation helpers for raw environment values.

use std::net::IpAddr;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

pub(crate) fn parse_port(field: &'static str, raw: &str) -> ConfigResult<u16> {
    let port = raw
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::invalid(field, raw, "not_a_port"))?;
    if port == 0 {
        return Err(ConfigError::invalid(field, raw, "zero"));
    }
    Ok(port)
}

pub(crate) fn parse_bind_addr(field: &'static str, raw: &str) -> ConfigResult<IpAddr> {
    raw.trim()
        .parse::<IpAddr>()
        .map_err(|_| ConfigError::invalid(field, raw, "not_an_ip_address"))
}

pub(crate) fn parse_seconds(field: &'static str, raw: &str) -> ConfigResult<Duration> {
    let seconds = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::invalid(field, raw, "not_an_integer"))?;
    if seconds == 0 {
        return Err(ConfigError::invalid(field, raw, "zero"));
    }
    Ok(Duration::from_secs(seconds))
}

pub(crate) fn parse_http_url(field: &'static str, raw: &str) -> ConfigResult<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let has_scheme = trimmed.starts_with("http://") || trimmed.starts_with("https://");
    let has_host = trimmed
        .split_once("://")
        .is_some_and(|(_, rest)| !rest.is_empty());
    if !has_scheme || !has_host {
        return Err(ConfigError::invalid(field, raw, "not_an_http_url"));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn parse_non_empty(field: &'static str, raw: &str) -> ConfigResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::invalid(field, raw, "empty"));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn parse_log_format(field: &'static str, raw: &str) -> ConfigResult<String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "json" | "pretty" => Ok(normalized),
        _ => Err(ConfigError::invalid(field, raw, "unknown_log_format")),
    }
}
