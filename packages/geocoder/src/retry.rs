//! Failure classification and retry delays for geocoding calls.
//!
//! The worker never retries inside a cycle; instead every failed lookup is
//! turned into a [`RetryCause`] and a delay the worker waits before the
//! item comes round again. Quota signals get the long cooldown, everything
//! transient gets the short delay.

use std::time::Duration;

use tile_locator_geocoder_models::{GeocodeResponse, GeocodeStatus, LocationRecord};

use crate::GeocodeError;
use crate::address::extract_location;

/// Why a lookup must be retried later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryCause {
    /// The provider reported exhausted quota (`OVER_QUERY_LIMIT`,
    /// `OVER_DAILY_LIMIT`, or HTTP 429).
    QuotaExhausted {
        /// Provider status or HTTP status that signalled it.
        status: String,
    },
    /// A status we do not recognize. Treated as scarce-resource exhaustion.
    UnrecognizedStatus {
        /// Provider status or HTTP status.
        status: String,
    },
    /// Provider-side transient failure (`UNKNOWN_ERROR`, HTTP 5xx).
    ProviderUnavailable {
        /// Provider status or HTTP status.
        status: String,
    },
    /// Timeout, connection failure, or truncated body.
    Transport {
        /// Description of the failure.
        message: String,
    },
    /// The body could not be parsed as a geocoding response.
    MalformedResponse {
        /// Description of the parse failure.
        message: String,
    },
}

impl RetryCause {
    /// Whether this cause should be reported as quota exhaustion.
    #[must_use]
    pub const fn is_quota_signal(&self) -> bool {
        matches!(
            self,
            Self::QuotaExhausted { .. } | Self::UnrecognizedStatus { .. }
        )
    }
}

impl std::fmt::Display for RetryCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuotaExhausted { status } => write!(f, "quota exhausted ({status})"),
            Self::UnrecognizedStatus { status } => write!(f, "unrecognized status ({status})"),
            Self::ProviderUnavailable { status } => write!(f, "provider unavailable ({status})"),
            Self::Transport { message } => write!(f, "transport error: {message}"),
            Self::MalformedResponse { message } => write!(f, "malformed response: {message}"),
        }
    }
}

/// Delays applied to each class of [`RetryCause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDelays {
    /// Wait after transient failures.
    pub short: Duration,
    /// Wait after a quota signal.
    pub quota_cooldown: Duration,
}

impl Default for RetryDelays {
    fn default() -> Self {
        Self {
            short: Duration::from_secs(15),
            quota_cooldown: Duration::from_secs(60 * 60),
        }
    }
}

impl RetryDelays {
    /// Returns how long to wait before retrying after `cause`.
    #[must_use]
    pub const fn delay_for(&self, cause: &RetryCause) -> Duration {
        if cause.is_quota_signal() {
            self.quota_cooldown
        } else {
            self.short
        }
    }
}

/// Classifies a provider response by its `status` field.
///
/// `OK` is extracted into a [`LocationRecord`]; `ZERO_RESULTS` becomes an
/// empty record. Every other status is a [`RetryCause`].
///
/// # Errors
///
/// Returns the [`RetryCause`] for any status other than `OK` or
/// `ZERO_RESULTS`.
pub fn classify_response(response: GeocodeResponse) -> Result<LocationRecord, RetryCause> {
    let status = response.status.clone();
    if status.is_quota_exceeded() {
        return Err(RetryCause::QuotaExhausted {
            status: status.to_string(),
        });
    }

    match status {
        GeocodeStatus::Ok => Ok(extract_location(response)),
        GeocodeStatus::ZeroResults => Ok(LocationRecord::empty(response)),
        GeocodeStatus::UnknownError => Err(RetryCause::ProviderUnavailable {
            status: status.to_string(),
        }),
        other => Err(RetryCause::UnrecognizedStatus {
            status: other.to_string(),
        }),
    }
}

/// Classifies a failure that happened before a response could be parsed.
#[must_use]
pub fn classify_error(error: &GeocodeError) -> RetryCause {
    match error {
        GeocodeError::Http(e) => RetryCause::Transport {
            message: e.to_string(),
        },
        GeocodeError::Parse { message } => RetryCause::MalformedResponse {
            message: message.clone(),
        },
        GeocodeError::HttpStatus { status } => {
            let status_text = format!("HTTP {status}");
            match *status {
                429 => RetryCause::QuotaExhausted {
                    status: status_text,
                },
                500..=599 => RetryCause::ProviderUnavailable {
                    status: status_text,
                },
                _ => RetryCause::UnrecognizedStatus {
                    status: status_text,
                },
            }
        }
    }
}
