//! Rate acquisition and reconciliation.
//!
//! [`RateProvider`] resolves BTC quotes through an ordered chain of
//! [`RateSource`]s, caches live results in a [`KeyValueCollection`] and
//! publishes the current [`RateState`] to any number of subscribers. It never
//! fails outward: when every source is down it publishes a constant snapshot
//! together with a banner message.

use crate::core::cache::{KeyValueCollection, get_json, put_json};
use crate::core::currency::{Currency, Quotes, RateSource};
use crate::core::error::RateError;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

/// Store key of the cached snapshot.
pub const RATES_KEY: &str = "btcRates";

/// Terminal fallback used when no source answers.
pub const FALLBACK_QUOTES: Quotes = Quotes {
    usd: 103475.55,
    gbp: 78124.09,
    eur: 97530.40,
};

pub const FALLBACK_MESSAGE: &str = "Failed to fetch prices from both APIs. Using fallback rates.";

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

fn truncate_millis(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(t.timestamp_millis()).unwrap_or(t)
}

/// An immutable set of quotes. `degraded` is set when any quote is a
/// hardcoded constant rather than a live value.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSnapshot {
    pub quotes: Quotes,
    pub fetched_at: DateTime<Utc>,
    pub degraded: bool,
}

impl RateSnapshot {
    pub fn rate(&self, currency: Currency) -> f64 {
        self.quotes.get(currency)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, fresh_for: Duration) -> bool {
        let fresh_for = chrono::Duration::from_std(fresh_for).unwrap_or(chrono::Duration::MAX);
        now.signed_duration_since(self.fetched_at) < fresh_for
    }
}

/// Persisted shape of the cached snapshot.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRates {
    usd: f64,
    gbp: f64,
    eur: f64,
    /// Epoch milliseconds
    timestamp: i64,
    #[serde(default)]
    degraded: bool,
}

impl From<&RateSnapshot> for StoredRates {
    fn from(snapshot: &RateSnapshot) -> Self {
        StoredRates {
            usd: snapshot.quotes.usd,
            gbp: snapshot.quotes.gbp,
            eur: snapshot.quotes.eur,
            timestamp: snapshot.fetched_at.timestamp_millis(),
            degraded: snapshot.degraded,
        }
    }
}

impl StoredRates {
    fn into_snapshot(self) -> Option<RateSnapshot> {
        let quotes = Quotes {
            usd: self.usd,
            gbp: self.gbp,
            eur: self.eur,
        }
        .ensure_positive()
        .ok()?;
        Some(RateSnapshot {
            quotes,
            fetched_at: DateTime::from_timestamp_millis(self.timestamp)?,
            degraded: self.degraded,
        })
    }
}

/// Cross-rate sanity bound for one quote against USD: `value` must lie within
/// `usd * tolerance` of `usd * ratio`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossRateCheck {
    pub currency: Currency,
    pub ratio: f64,
    pub tolerance: f64,
}

impl Default for CrossRateCheck {
    fn default() -> Self {
        CrossRateCheck {
            currency: Currency::Gbp,
            ratio: 0.75,
            tolerance: 0.15,
        }
    }
}

impl CrossRateCheck {
    pub fn check(&self, quotes: &Quotes) -> Result<(), RateError> {
        let usd = quotes.usd;
        let value = quotes.get(self.currency);
        let expected = usd * self.ratio;
        if !(value.is_finite() && value > 0.0) || (value - expected).abs() > usd * self.tolerance {
            return Err(RateError::Validation {
                currency: self.currency.code().to_string(),
                message: format!(
                    "{value} is outside {expected:.2} ± {:.2}",
                    usd * self.tolerance
                ),
            });
        }
        Ok(())
    }

    /// Positivity of every quote the check does not cover.
    fn check_anchors(&self, quotes: Quotes) -> Result<Quotes, RateError> {
        for currency in Currency::ALL {
            if currency == self.currency {
                continue;
            }
            let value = quotes.get(currency);
            if !(value.is_finite() && value > 0.0) {
                return Err(RateError::Validation {
                    currency: currency.code().to_string(),
                    message: format!("expected a positive quote, got {value}"),
                });
            }
        }
        Ok(quotes)
    }
}

/// What presentation code observes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateState {
    pub snapshot: Option<RateSnapshot>,
    pub error: Option<String>,
}

enum Resolution {
    Live { quotes: Quotes, degraded: bool },
    Exhausted,
}

pub struct RateProviderBuilder {
    sources: Vec<Arc<dyn RateSource>>,
    store: Arc<dyn KeyValueCollection>,
    clock: Arc<dyn Clock>,
    fresh_for: Duration,
    cross_check: CrossRateCheck,
    timezone: Tz,
}

impl RateProviderBuilder {
    /// Appends a source; sources are tried in insertion order.
    pub fn source(mut self, source: Arc<dyn RateSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn fresh_for(mut self, fresh_for: Duration) -> Self {
        self.fresh_for = fresh_for;
        self
    }

    pub fn cross_check(mut self, cross_check: CrossRateCheck) -> Self {
        self.cross_check = cross_check;
        self
    }

    pub fn timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn build(self) -> RateProvider {
        let (state, _) = watch::channel(RateState::default());
        RateProvider {
            sources: self.sources,
            store: self.store,
            clock: self.clock,
            fresh_for: self.fresh_for,
            cross_check: self.cross_check,
            timezone: self.timezone,
            state,
            in_flight: Mutex::new(()),
            completed: AtomicU64::new(0),
        }
    }
}

pub struct RateProvider {
    sources: Vec<Arc<dyn RateSource>>,
    store: Arc<dyn KeyValueCollection>,
    clock: Arc<dyn Clock>,
    fresh_for: Duration,
    cross_check: CrossRateCheck,
    timezone: Tz,
    state: watch::Sender<RateState>,
    in_flight: Mutex<()>,
    completed: AtomicU64,
}

impl RateProvider {
    pub fn builder(store: Arc<dyn KeyValueCollection>) -> RateProviderBuilder {
        RateProviderBuilder {
            sources: Vec::new(),
            store,
            clock: Arc::new(SystemClock),
            fresh_for: Duration::from_secs(4 * 60),
            cross_check: CrossRateCheck::default(),
            timezone: chrono_tz::Europe::London,
        }
    }

    /// Returns usable rates, from cache when fresh and `force_refresh` is
    /// false, otherwise from the source chain. Never fails.
    #[instrument(name = "RateResolve", skip(self))]
    pub async fn resolve(&self, force_refresh: bool) -> RateSnapshot {
        let ticket = self.completed.load(Ordering::SeqCst);
        let _guard = self.in_flight.lock().await;

        // A resolution finished while we were queued; share its result
        if self.completed.load(Ordering::SeqCst) != ticket {
            if let Some(snapshot) = self.current_snapshot() {
                debug!("Joined in-flight resolution");
                return snapshot;
            }
        }

        if !force_refresh {
            if let Some(cached) = self.fresh_cached().await {
                return cached;
            }
        }

        let started_at = self.clock.now();
        let resolution = self.acquire().await;
        let snapshot = self.commit(started_at, resolution).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        snapshot
    }

    pub fn current_snapshot(&self) -> Option<RateSnapshot> {
        self.state.borrow().snapshot.clone()
    }

    pub fn error_message(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    /// Time of day of the current snapshot in the display timezone.
    pub fn last_updated_display(&self) -> String {
        self.state
            .borrow()
            .snapshot
            .as_ref()
            .map_or("N/A".to_string(), |s| {
                s.fetched_at
                    .with_timezone(&self.timezone)
                    .format("%H:%M:%S")
                    .to_string()
            })
    }

    pub fn subscribe(&self) -> watch::Receiver<RateState> {
        self.state.subscribe()
    }

    /// Runs a resolution in the background, e.g. for a user-initiated refresh.
    pub fn request_refresh(self: &Arc<Self>, force: bool) -> JoinHandle<RateSnapshot> {
        let provider = Arc::clone(self);
        tokio::spawn(async move { provider.resolve(force).await })
    }

    /// Resolves now and then every `every` until the handle is stopped or dropped.
    pub fn start(self: &Arc<Self>, every: Duration) -> RefreshHandle {
        let provider = Arc::clone(self);
        let every = every.max(Duration::from_secs(1));
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                debug!("Scheduled rate refresh");
                provider.resolve(false).await;
            }
        });
        RefreshHandle { task }
    }

    async fn load_cached(&self) -> Option<RateSnapshot> {
        get_json::<StoredRates>(self.store.as_ref(), RATES_KEY)
            .await
            .and_then(StoredRates::into_snapshot)
    }

    async fn fresh_cached(&self) -> Option<RateSnapshot> {
        let cached = self.load_cached().await?;
        if !cached.is_fresh(self.clock.now(), self.fresh_for) {
            debug!(fetched_at = %cached.fetched_at, "Cached rates are stale");
            return None;
        }

        // A newer unpersisted fallback stays published, banner included
        if let Some(current) = self.current_snapshot() {
            if current.fetched_at > cached.fetched_at {
                debug!(fetched_at = %current.fetched_at, "Keeping newer published rates");
                return Some(current);
            }
        }

        // Prefer the published value so repeated reads are identical
        let snapshot = match self.current_snapshot() {
            Some(current) if current.fetched_at == cached.fetched_at => current,
            _ => cached,
        };
        debug!(fetched_at = %snapshot.fetched_at, "Using cached rates");
        self.publish(snapshot.clone(), None);
        Some(snapshot)
    }

    async fn acquire(&self) -> Resolution {
        for (index, source) in self.sources.iter().enumerate() {
            let attempt = source
                .fetch_rates()
                .await
                .and_then(|quotes| self.cross_check.check_anchors(quotes));

            let mut quotes = match attempt {
                Ok(quotes) => quotes,
                Err(e) => {
                    warn!(source = source.name(), error = %e, "Rate source failed");
                    continue;
                }
            };

            let mut degraded = false;
            if let Err(e) = self.cross_check.check(&quotes) {
                warn!(source = source.name(), error = %e, "Discarding implausible quote");
                let currency = self.cross_check.currency;
                match self.repair(currency, &self.sources[index + 1..]).await {
                    Some(value) => quotes.set(currency, value),
                    None => {
                        quotes.set(currency, FALLBACK_QUOTES.get(currency));
                        degraded = true;
                    }
                }
            }

            debug!(source = source.name(), ?quotes, degraded, "Resolved rates");
            return Resolution::Live { quotes, degraded };
        }
        Resolution::Exhausted
    }

    /// Re-resolves one quote through the single-pair mode of `sources`.
    async fn repair(&self, currency: Currency, sources: &[Arc<dyn RateSource>]) -> Option<f64> {
        for source in sources {
            match source.fetch_rate(currency).await {
                Ok(value) if value.is_finite() && value > 0.0 => {
                    debug!(source = source.name(), %currency, value, "Repaired quote");
                    return Some(value);
                }
                Ok(value) => {
                    warn!(source = source.name(), %currency, value, "Repair returned a non-positive quote")
                }
                Err(e) => warn!(source = source.name(), %currency, error = %e, "Repair failed"),
            }
        }
        None
    }

    async fn commit(&self, started_at: DateTime<Utc>, resolution: Resolution) -> RateSnapshot {
        // Someone sharing the store finished a newer resolution first
        if let Some(cached) = self.load_cached().await {
            if cached.fetched_at > started_at {
                debug!(
                    cached_at = %cached.fetched_at,
                    %started_at,
                    "Discarding result older than the cached snapshot"
                );
                self.publish(cached.clone(), None);
                return cached;
            }
        }

        match resolution {
            Resolution::Live { quotes, degraded } => {
                let snapshot = RateSnapshot {
                    quotes,
                    fetched_at: self.next_timestamp(),
                    degraded,
                };
                put_json(
                    self.store.as_ref(),
                    RATES_KEY,
                    &StoredRates::from(&snapshot),
                )
                .await;
                info!(
                    usd = quotes.usd,
                    gbp = quotes.gbp,
                    eur = quotes.eur,
                    "Bitcoin prices updated"
                );
                self.publish(snapshot.clone(), None);
                snapshot
            }
            Resolution::Exhausted => {
                warn!("All rate sources failed, using fallback rates");
                let snapshot = RateSnapshot {
                    quotes: FALLBACK_QUOTES,
                    fetched_at: self.next_timestamp(),
                    degraded: true,
                };
                self.publish(snapshot.clone(), Some(FALLBACK_MESSAGE.to_string()));
                snapshot
            }
        }
    }

    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = truncate_millis(self.clock.now());
        match self.current_snapshot() {
            Some(previous) if previous.fetched_at > now => previous.fetched_at,
            _ => now,
        }
    }

    fn publish(&self, snapshot: RateSnapshot, error: Option<String>) {
        self.state.send_if_modified(|state| {
            let changed = state.snapshot.as_ref() != Some(&snapshot) || state.error != error;
            state.snapshot = Some(snapshot);
            state.error = error;
            changed
        });
    }
}

/// Owns the periodic refresh task; stopping or dropping it cancels the task.
pub struct RefreshHandle {
    task: JoinHandle<()>,
}

impl RefreshHandle {
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
