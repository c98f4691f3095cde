#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The tile resolution worker.
//!
//! Each cycle leases one tile id from the [`WorkQueue`], skips it if the
//! [`TileStore`] already has it, otherwise geocodes the tile's center and
//! persists the result. An item is acknowledged only once nothing more
//! needs to happen to it; every other path leaves it leased so the queue
//! redelivers it later. Queues that pop on read never redeliver, so for
//! those the worker holds the item itself and retries it before
//! dequeuing anything new.
//!
//! Cycles never fail. Every error is turned into a [`CycleOutcome`] and a
//! pause, and [`Worker::run_until`] keeps cycling until its deadline.

pub mod config;
pub mod pacing;
pub mod stats;

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tile_locator_geocoder::{Geocoder, Resolution, RetryCause, google::GoogleGeocoder};
use tile_locator_queue::{AzureQueue, FetchEndpointQueue, QueueError, WorkItem, WorkQueue};
use tile_locator_tile_models::{GeoTileScheme, TileRecord, TileScheme};
use tile_locator_tile_store::{HttpTileStore, TileStatus, TileStore};
use tokio::time::Instant;

pub use config::{ConfigError, GeocoderSettings, QueueSettings, WorkerConfig};
pub use pacing::Pacing;
pub use stats::WorkerStats;

/// Log target for quota exhaustion, so it can be filtered separately.
pub const QUOTA_LOG_TARGET: &str = "tile_locator::quota";

/// What happened in one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing was pending.
    Empty,
    /// The queue could not be read.
    QueueUnavailable,
    /// The tile store already had the tile.
    AlreadyResolved {
        /// The skipped tile.
        tile_id: String,
        /// Whether the delivery was removed from the queue.
        acknowledged: bool,
    },
    /// The tile store could not be asked; the item stays leased.
    CheckFailed {
        /// The tile that was being checked.
        tile_id: String,
    },
    /// The tile id is not valid in the tile scheme and was dropped.
    InvalidTile {
        /// The rejected tile id.
        tile_id: String,
        /// Whether the delivery was removed from the queue.
        acknowledged: bool,
    },
    /// Geocoding must be retried; the item stays leased.
    Deferred {
        /// The tile that was being geocoded.
        tile_id: String,
        /// Why the lookup was deferred.
        cause: RetryCause,
        /// Back-off requested by the geocoder.
        delay: Duration,
    },
    /// The location was found but could not be saved; the item stays
    /// leased.
    PersistFailed {
        /// The tile that was being saved.
        tile_id: String,
    },
    /// The tile was geocoded and saved.
    Resolved {
        /// The resolved tile.
        tile_id: String,
        /// Whether the delivery was removed from the queue.
        acknowledged: bool,
    },
}

/// The result of [`Worker::run_cycle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    /// What happened.
    pub outcome: CycleOutcome,
    /// How long to wait before the next cycle.
    pub pause: Duration,
}

/// Drains the queue one tile at a time.
pub struct Worker {
    queue: Arc<dyn WorkQueue>,
    store: Arc<dyn TileStore>,
    geocoder: Arc<dyn Geocoder>,
    scheme: Arc<dyn TileScheme>,
    pacing: Pacing,
    held: Mutex<Option<WorkItem>>,
}

impl Worker {
    /// Creates a worker over the given clients using [`GeoTileScheme`].
    #[must_use]
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        store: Arc<dyn TileStore>,
        geocoder: Arc<dyn Geocoder>,
        pacing: Pacing,
    ) -> Self {
        Self {
            queue,
            store,
            geocoder,
            scheme: Arc::new(GeoTileScheme),
            pacing,
            held: Mutex::new(None),
        }
    }

    /// Replaces the scheme used to turn tile ids into coordinates.
    #[must_use]
    pub fn with_scheme(mut self, scheme: Arc<dyn TileScheme>) -> Self {
        self.scheme = scheme;
        self
    }

    /// Builds the HTTP-backed worker described by `config`.
    ///
    /// # Errors
    ///
    /// * If the HTTP client cannot be built
    /// * If the tile store URL is not a usable base URL
    pub fn from_config(config: &WorkerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let client = http_client(config.http_timeout)?;

        let store = HttpTileStore::new(client.clone(), &config.tile_store_url)?;
        let queue: Arc<dyn WorkQueue> = match &config.queue {
            QueueSettings::Azure {
                endpoint,
                queue_name,
                sas_token,
                visibility_timeout,
            } => {
                log::info!("Reading tiles from Azure queue {queue_name} at {endpoint}");
                Arc::new(
                    AzureQueue::new(client.clone(), endpoint, queue_name.clone(), sas_token)
                        .with_visibility_timeout(*visibility_timeout),
                )
            }
            QueueSettings::Fetch => {
                log::info!("Reading tiles from {}/fetch", config.tile_store_url);
                Arc::new(FetchEndpointQueue::new(client.clone(), &config.tile_store_url))
            }
        };
        let geocoder = geocoder_from_settings(client, &config.geocoder);

        Ok(Self::new(queue, Arc::new(store), Arc::new(geocoder), config.pacing))
    }

    /// Runs one dequeue/check/geocode/persist/acknowledge cycle.
    ///
    /// The returned pause for a cycle that geocoded successfully is the
    /// steady interval minus the time the cycle already took.
    pub async fn run_cycle(&self) -> Cycle {
        let started = Instant::now();
        let outcome = self.process().await;

        let pause = match &outcome {
            CycleOutcome::Empty
            | CycleOutcome::QueueUnavailable
            | CycleOutcome::AlreadyResolved { .. }
            | CycleOutcome::CheckFailed { .. }
            | CycleOutcome::InvalidTile { .. } => self.pacing.idle,
            CycleOutcome::Deferred { delay, .. } => *delay,
            CycleOutcome::PersistFailed { .. } => self.pacing.error_delay,
            CycleOutcome::Resolved { .. } => self.pacing.steady_after(started.elapsed()),
        };

        Cycle { outcome, pause }
    }

    /// Cycles until `deadline`, then returns the totals.
    ///
    /// A cycle in flight is never interrupted; a pause that would run past
    /// the deadline is cut short.
    pub async fn run_until(&self, deadline: Instant) -> WorkerStats {
        let mut stats = WorkerStats::default();

        while Instant::now() < deadline {
            let cycle = self.run_cycle().await;
            stats.record(&cycle.outcome);
            log::debug!("Next cycle in {:?}", cycle.pause);
            tokio::time::sleep_until((Instant::now() + cycle.pause).min(deadline)).await;
        }

        if let Some(item) = self.held().as_ref() {
            log::error!(
                "Tile {} is still pending and cannot be redelivered; it is lost on exit",
                item.tile_id
            );
            stats.lost += 1;
        }

        stats
    }

    fn held(&self) -> MutexGuard<'_, Option<WorkItem>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Keeps `item` for the next cycle if the queue will not redeliver it.
    fn retry_later(&self, item: WorkItem) {
        if !self.queue.redelivers() {
            log::debug!("Holding tile {} for the next cycle", item.tile_id);
            *self.held() = Some(item);
        }
    }

    async fn next_item(&self) -> Result<Option<WorkItem>, QueueError> {
        let held = self.held().take();
        if let Some(item) = held {
            log::info!("Retrying held tile {}", item.tile_id);
            return Ok(Some(item));
        }
        self.queue.dequeue().await
    }

    async fn process(&self) -> CycleOutcome {
        let item = match self.next_item().await {
            Ok(Some(item)) => item,
            Ok(None) => {
                log::debug!("Queue is empty");
                return CycleOutcome::Empty;
            }
            Err(e) => {
                log::warn!("Failed to dequeue: {e}");
                return CycleOutcome::QueueUnavailable;
            }
        };
        let tile_id = item.tile_id.clone();
        log::debug!(
            "Dequeued tile {tile_id} (delivery {})",
            item.dequeue_count
        );

        match self.store.check_resolved(&tile_id).await {
            Ok(TileStatus::Resolved) => {
                log::info!("Tile {tile_id} is already resolved, skipping");
                let acknowledged = self.acknowledge(&item).await;
                return CycleOutcome::AlreadyResolved {
                    tile_id,
                    acknowledged,
                };
            }
            Ok(TileStatus::NotResolved) => {}
            Err(e) => {
                log::warn!("Failed to check tile {tile_id}: {e}");
                self.retry_later(item);
                return CycleOutcome::CheckFailed { tile_id };
            }
        }

        let coordinate = match self.scheme.center(&tile_id) {
            Ok(coordinate) => coordinate,
            Err(e) => {
                log::error!("Dropping invalid tile: {e}");
                let acknowledged = self.acknowledge(&item).await;
                return CycleOutcome::InvalidTile {
                    tile_id,
                    acknowledged,
                };
            }
        };

        let location = match self.geocoder.resolve(coordinate).await {
            Resolution::Located(location) => location,
            Resolution::RetryAfter { delay, cause } => {
                if cause.is_quota_signal() {
                    log::warn!(
                        target: QUOTA_LOG_TARGET,
                        "Geocoding quota exhausted ({cause}), pausing for {delay:?}"
                    );
                } else {
                    log::warn!("Deferring tile {tile_id}: {cause}, retrying in {delay:?}");
                }
                self.retry_later(item);
                return CycleOutcome::Deferred {
                    tile_id,
                    cause,
                    delay,
                };
            }
        };

        let record = TileRecord::new(tile_id.clone(), location);
        if let Err(e) = self.store.persist(&record).await {
            log::warn!("Failed to save tile {tile_id}: {e}");
            self.retry_later(item);
            return CycleOutcome::PersistFailed { tile_id };
        }
        log::info!(
            "Resolved tile {tile_id}: locality={:?} county={:?} state={:?} country={:?}",
            record.locality,
            record.administrative_area_level_2,
            record.administrative_area_level_1,
            record.country,
        );

        let acknowledged = self.acknowledge(&item).await;
        CycleOutcome::Resolved {
            tile_id,
            acknowledged,
        }
    }

    async fn acknowledge(&self, item: &WorkItem) -> bool {
        match self.queue.acknowledge(&item.lease).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    "Failed to acknowledge tile {}; it will be redelivered: {e}",
                    item.tile_id
                );
                false
            }
        }
    }
}

/// Builds the shared HTTP client.
///
/// # Errors
///
/// * If the TLS backend cannot be initialized
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("tile_locator/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Builds the provider client described by `settings`.
#[must_use]
pub fn geocoder_from_settings(
    client: reqwest::Client,
    settings: &GeocoderSettings,
) -> GoogleGeocoder {
    GoogleGeocoder::new(client, settings.base_url.clone(), settings.delays)
        .with_api_key(settings.api_key.clone())
}
