//! Environment loading for [`AppConfig`].

use magnetar_torrent_core::Category;
use tracing::debug;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    AppConfig, CategoryMap, PlexConfig, RedisConfig, SchedulerConfig, ServerConfig,
    TransmissionConfig,
};
use crate::validate::{
    parse_bind_addr, parse_http_url, parse_log_format, parse_non_empty, parse_port,
    parse_seconds,
};

const SERVICE_PORT: &str = "SERVICE_PORT";
const BIND_ADDR: &str = "BIND_ADDR";
const REDIS_URL: &str = "REDIS_URL";
const REDIS_PASSWORD: &str = "REDIS_PASSWORD";
const TRANSMISSION_URL: &str = "TRANSMISSION_URL";
const TRANSMISSION_USER: &str = "TRANSMISSION_USER";
const TRANSMISSION_PASSWORD: &str = "TRANSMISSION_PASSWORD";
const PLEX_URL: &str = "PLEX_URL";
const PLEX_TOKEN: &str = "PLEX_TOKEN";
const PROGRESS_CHECK_INTERVAL_SECS: &str = "PROGRESS_CHECK_INTERVAL_SECS";
const RECOVERY_CHECK_INTERVAL_SECS: &str = "RECOVERY_CHECK_INTERVAL_SECS";
const STALE_THRESHOLD_SECS: &str = "STALE_THRESHOLD_SECS";
const ETA_SLACK_SECS: &str = "ETA_SLACK_SECS";
const CALL_TIMEOUT_SECS: &str = "CALL_TIMEOUT_SECS";
const PROGRESS_QUEUE_TTL_SECS: &str = "PROGRESS_QUEUE_TTL_SECS";
const LOG_FORMAT: &str = "LOG_FORMAT";

const fn section_var(category: Category) -> &'static str {
    match category {
        Category::Films => "PLEX_CATEGORY_FILMS",
        Category::Series => "PLEX_CATEGORY_SERIES",
        Category::Cartoons => "PLEX_CATEGORY_CARTOONS",
        Category::CartoonsSeries => "PLEX_CATEGORY_CARTOONS_SERIES",
        Category::Shorts => "PLEX_CATEGORY_SHORTS",
    }
}

const fn dir_var(category: Category) -> &'static str {
    match category {
        Category::Films => "FILMS_DIR_PATH",
        Category::Series => "SERIES_DIR_PATH",
        Category::Cartoons => "CARTOONS_DIR_PATH",
        Category::CartoonsSeries => "CARTOONS_SERIES_DIR_PATH",
        Category::Shorts => "SHORTS_DIR_PATH",
    }
}

/// Reads variables through a caller-supplied lookup so tests never touch the
/// process environment. Blank values count as unset.
struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &'static str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, name: &'static str) -> ConfigResult<String> {
        self.optional(name)
            .ok_or(ConfigError::MissingEnv { name })
    }

    fn seconds_or(
        &self,
        name: &'static str,
        default: std::time::Duration,
    ) -> ConfigResult<std::time::Duration> {
        match self.optional(name) {
            Some(raw) => parse_seconds(name, &raw),
            None => {
                debug!(variable = name, default_secs = default.as_secs(), "using default");
                Ok(default)
            }
        }
    }

    fn per_category<T>(
        &self,
        name_for: fn(Category) -> &'static str,
        parse: fn(&'static str, &str) -> ConfigResult<T>,
    ) -> ConfigResult<CategoryMap<T>> {
        Category::ALL
            .into_iter()
            .map(|category| {
                let name = name_for(category);
                let raw = self.required(name)?;
                parse(name, &raw).map(|value| (category, value))
            })
            .collect()
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] for absent required variables and
    /// [`ConfigError::InvalidField`] for values that fail validation.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let server = ServerConfig {
            bind_addr: parse_bind_addr(
                BIND_ADDR,
                &env.optional(BIND_ADDR)
                    .unwrap_or_else(|| defaults::BIND_ADDR.to_string()),
            )?,
            port: env
                .optional(SERVICE_PORT)
                .map_or(Ok(defaults::SERVICE_PORT), |raw| {
                    parse_port(SERVICE_PORT, &raw)
                })?,
        };

        let redis = RedisConfig {
            url: parse_non_empty(REDIS_URL, &env.required(REDIS_URL)?)?,
            password: env.optional(REDIS_PASSWORD),
        };

        let transmission = TransmissionConfig {
            url: parse_http_url(TRANSMISSION_URL, &env.required(TRANSMISSION_URL)?)?,
            username: env.optional(TRANSMISSION_USER),
            password: env.optional(TRANSMISSION_PASSWORD),
            download_dirs: env.per_category(dir_var, parse_non_empty)?,
        };

        let plex = PlexConfig {
            url: parse_http_url(PLEX_URL, &env.required(PLEX_URL)?)?,
            token: parse_non_empty(PLEX_TOKEN, &env.required(PLEX_TOKEN)?)?,
            sections: env.per_category(section_var, parse_non_empty)?,
        };

        let scheduler = SchedulerConfig {
            progress_interval: env.seconds_or(
                PROGRESS_CHECK_INTERVAL_SECS,
                defaults::PROGRESS_CHECK_INTERVAL,
            )?,
            recovery_interval: env.seconds_or(
                RECOVERY_CHECK_INTERVAL_SECS,
                defaults::RECOVERY_CHECK_INTERVAL,
            )?,
            stale_threshold: env.seconds_or(STALE_THRESHOLD_SECS, defaults::STALE_THRESHOLD)?,
            eta_slack: env.seconds_or(ETA_SLACK_SECS, defaults::ETA_SLACK)?,
            call_timeout: env.seconds_or(CALL_TIMEOUT_SECS, defaults::CALL_TIMEOUT)?,
        };

        let queue_ttl = env.seconds_or(PROGRESS_QUEUE_TTL_SECS, defaults::PROGRESS_QUEUE_TTL)?;
        let log_format = env
            .optional(LOG_FORMAT)
            .map(|raw| parse_log_format(LOG_FORMAT, &raw))
            .transpose()?;

        Ok(Self {
            server,
            redis,
            transmission,
            plex,
            scheduler,
            queue_ttl,
            log_format,
        })
    }
}
