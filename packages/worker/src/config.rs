//! Environment-driven worker configuration.
//!
//! Every duration is given in whole seconds. Empty variables are treated
//! the same as unset ones.

use std::time::Duration;

use thiserror::Error;
use tile_locator_geocoder::{RetryDelays, google::DEFAULT_BASE_URL};
use tile_locator_queue::azure::{AzureQueue, DEFAULT_VISIBILITY_TIMEOUT};

use crate::pacing::Pacing;

/// Queue name used when `QUEUE_NAME` is unset.
pub const DEFAULT_QUEUE_NAME: &str = "unfetched";

/// Errors from reading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required environment variable.
    #[error("Missing environment variable: {name}")]
    MissingEnv {
        /// Name of the missing environment variable.
        name: String,
    },

    /// A variable is set but cannot be used.
    #[error("Invalid value {value:?} for {name}: {message}")]
    Invalid {
        /// Name of the environment variable.
        name: String,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        message: String,
    },
}

/// Where pending tile ids come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueSettings {
    /// An Azure Storage queue.
    Azure {
        /// Queue service endpoint, e.g. `https://acct.queue.core.windows.net`.
        endpoint: String,
        /// Queue name.
        queue_name: String,
        /// SAS token granting process rights on the queue.
        sas_token: String,
        /// Lease requested on each dequeue.
        visibility_timeout: Duration,
    },
    /// The tile service's own `GET /fetch` endpoint.
    Fetch,
}

/// Reverse-geocoding provider settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocoderSettings {
    /// Provider endpoint.
    pub base_url: String,
    /// Optional API key sent as `key=`.
    pub api_key: Option<String>,
    /// Back-off applied to deferred lookups.
    pub delays: RetryDelays,
}

impl GeocoderSettings {
    /// Reads the provider settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a delay is not a whole number of
    /// seconds.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the provider settings through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a delay is not a whole number of
    /// seconds.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = EnvReader { lookup };

        Ok(Self {
            base_url: env
                .optional("GEOCODER_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: env.optional("GEOCODER_API_KEY"),
            delays: RetryDelays {
                short: env.seconds("ERROR_DELAY_SECS", 15)?,
                quota_cooldown: env.seconds("QUOTA_COOLDOWN_SECS", 3600)?,
            },
        })
    }
}

/// Everything the worker binary needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Tile service base URL.
    pub tile_store_url: String,
    /// Queue backend.
    pub queue: QueueSettings,
    /// Provider settings.
    pub geocoder: GeocoderSettings,
    /// Per-request timeout for every HTTP client.
    pub http_timeout: Duration,
    /// Delays between cycles.
    pub pacing: Pacing,
    /// How long the process runs before exiting for a clean restart.
    pub restart_interval: Duration,
}

impl WorkerConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] if a required variable is unset,
    /// or [`ConfigError::Invalid`] if a value cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] if a required variable is unset,
    /// or [`ConfigError::Invalid`] if a value cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = EnvReader { lookup: &lookup };
        let tile_store_url = env.require("TILE_STORE_URL")?;

        let queue = match env.optional("QUEUE_BACKEND").as_deref() {
            None | Some("azure") => {
                let sas_token = env.require("AZURE_STORAGE_SAS_TOKEN")?;
                let endpoint = match env.optional("AZURE_QUEUE_ENDPOINT") {
                    Some(endpoint) => endpoint,
                    None => AzureQueue::account_endpoint(&env.require("AZURE_STORAGE_ACCOUNT")?),
                };
                QueueSettings::Azure {
                    endpoint,
                    queue_name: env
                        .optional("QUEUE_NAME")
                        .unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_string()),
                    sas_token,
                    visibility_timeout: env.seconds(
                        "QUEUE_VISIBILITY_TIMEOUT_SECS",
                        DEFAULT_VISIBILITY_TIMEOUT.as_secs(),
                    )?,
                }
            }
            Some("fetch") => QueueSettings::Fetch,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "QUEUE_BACKEND".to_string(),
                    value: other.to_string(),
                    message: "expected `azure` or `fetch`".to_string(),
                });
            }
        };

        Ok(Self {
            tile_store_url,
            queue,
            geocoder: GeocoderSettings::from_lookup(&lookup)?,
            http_timeout: http_timeout(&lookup)?,
            pacing: Pacing {
                idle: env.seconds("IDLE_INTERVAL_SECS", 15)?,
                steady: env.seconds("STEADY_INTERVAL_SECS", 40)?,
                error_delay: env.seconds("ERROR_DELAY_SECS", 15)?,
            },
            restart_interval: env.seconds("RESTART_INTERVAL_SECS", 3600)?,
        })
    }
}

/// Reads `HTTP_TIMEOUT_SECS` (default 15) through `lookup`.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] if the value is not a positive whole
/// number of seconds.
pub fn http_timeout(lookup: impl Fn(&str) -> Option<String>) -> Result<Duration, ConfigError> {
    let env = EnvReader { lookup };
    let timeout = env.seconds("HTTP_TIMEOUT_SECS", 15)?;
    if timeout.is_zero() {
        return Err(ConfigError::Invalid {
            name: "HTTP_TIMEOUT_SECS".to_string(),
            value: "0".to_string(),
            message: "timeout must be positive".to_string(),
        });
    }
    Ok(timeout)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn require(&self, name: &str) -> Result<String, ConfigError> {
        self.optional(name).ok_or_else(|| ConfigError::MissingEnv {
            name: name.to_string(),
        })
    }

    fn seconds(&self, name: &str, default: u64) -> Result<Duration, ConfigError> {
        let Some(value) = self.optional(name) else {
            return Ok(Duration::from_secs(default));
        };
        value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::Invalid {
                name: name.to_string(),
                value,
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn azure_defaults() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("TILE_STORE_URL", "https://tiles.example.com/api"),
            ("AZURE_STORAGE_ACCOUNT", "tilesacct"),
            ("AZURE_STORAGE_SAS_TOKEN", "?sv=2019&sig=abc"),
        ]))
        .unwrap();

        assert_eq!(config.tile_store_url, "https://tiles.example.com/api");
        assert_eq!(
            config.queue,
            QueueSettings::Azure {
                endpoint: "https://tilesacct.queue.core.windows.net".to_string(),
                queue_name: "unfetched".to_string(),
                sas_token: "?sv=2019&sig=abc".to_string(),
                visibility_timeout: Duration::from_secs(300),
            }
        );
        assert_eq!(config.geocoder.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.geocoder.api_key, None);
        assert_eq!(config.geocoder.delays, RetryDelays::default());
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert_eq!(config.pacing, Pacing::default());
        assert_eq!(config.restart_interval, Duration::from_secs(3600));
    }

    #[test]
    fn fetch_backend_needs_no_azure_credentials() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("TILE_STORE_URL", "http://localhost:3000"),
            ("QUEUE_BACKEND", "fetch"),
            ("GEOCODER_API_KEY", "secret"),
            ("STEADY_INTERVAL_SECS", "60"),
            ("QUOTA_COOLDOWN_SECS", "7200"),
        ]))
        .unwrap();

        assert_eq!(config.queue, QueueSettings::Fetch);
        assert_eq!(config.geocoder.api_key.as_deref(), Some("secret"));
        assert_eq!(config.pacing.steady, Duration::from_secs(60));
        assert_eq!(config.geocoder.delays.quota_cooldown, Duration::from_secs(7200));
    }

    #[test]
    fn endpoint_override_replaces_account() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("TILE_STORE_URL", "http://localhost:3000"),
            ("AZURE_STORAGE_SAS_TOKEN", "sig=abc"),
            ("AZURE_QUEUE_ENDPOINT", "http://127.0.0.1:10001/devstoreaccount1"),
            ("QUEUE_NAME", "tiles"),
        ]))
        .unwrap();

        let QueueSettings::Azure {
            endpoint,
            queue_name,
            ..
        } = config.queue
        else {
            panic!("expected azure backend");
        };
        assert_eq!(endpoint, "http://127.0.0.1:10001/devstoreaccount1");
        assert_eq!(queue_name, "tiles");
    }

    #[test]
    fn missing_tile_store_url() {
        let err = WorkerConfig::from_lookup(lookup(&[("QUEUE_BACKEND", "fetch")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv { ref name } if name == "TILE_STORE_URL"));
    }

    #[test]
    fn empty_values_count_as_missing() {
        let err = WorkerConfig::from_lookup(lookup(&[
            ("TILE_STORE_URL", "http://localhost:3000"),
            ("AZURE_STORAGE_SAS_TOKEN", "   "),
        ]))
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::MissingEnv { ref name } if name == "AZURE_STORAGE_SAS_TOKEN")
        );
    }

    #[test]
    fn rejects_unknown_backend_and_bad_numbers() {
        let err = WorkerConfig::from_lookup(lookup(&[
            ("TILE_STORE_URL", "http://localhost:3000"),
            ("QUEUE_BACKEND", "sqs"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref name, .. } if name == "QUEUE_BACKEND"));

        let err = WorkerConfig::from_lookup(lookup(&[
            ("TILE_STORE_URL", "http://localhost:3000"),
            ("QUEUE_BACKEND", "fetch"),
            ("IDLE_INTERVAL_SECS", "fifteen"),
        ]))
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid { ref name, ref value, .. } if name == "IDLE_INTERVAL_SECS" && value == "fifteen")
        );
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let err = http_timeout(lookup(&[("HTTP_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref name, .. } if name == "HTTP_TIMEOUT_SECS"));
    }
}
