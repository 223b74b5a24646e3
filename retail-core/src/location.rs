//! Location store.
//!
//! State machine:
//!
//! ```text
//! Unknown -> Acquiring -> { Valid | Denied | Unavailable | TimedOut }
//! Valid   -> Expired      (validity window elapsed)
//! any     -> Acquiring    (explicit re-request)
//! ```
//!
//! The store owns the `user_location` key. A background tracker reports the
//! sample to the backend on a fixed interval while both a session and a valid
//! sample exist.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::TrackingReport;
use crate::config::LocationConfig;
use crate::geocode::ReverseGeocoder;
use crate::geolocation::{Geolocator, LocationError, PositionOptions};
use crate::models::{LocationSample, Session};
use crate::session::SessionStore;
use crate::storage::KeyValueStore;

pub const LOCATION_KEY: &str = "user_location";

pub const ACTIVITY_BROWSE: &str = "browse";
pub const ACTIVITY_BACKGROUND: &str = "background";
pub const ACTIVITY_LOCATION_UPDATE: &str = "location_update";

#[derive(Debug, Clone, PartialEq)]
pub enum LocationState {
    Unknown,
    Acquiring,
    Valid(LocationSample),
    Expired,
    Denied(String),
    Unavailable(String),
    TimedOut(String),
}

impl LocationState {
    pub fn sample(&self) -> Option<&LocationSample> {
        match self {
            LocationState::Valid(sample) => Some(sample),
            _ => None,
        }
    }

    /// User-facing message for the failure states.
    pub fn error(&self) -> Option<&str> {
        match self {
            LocationState::Denied(m) | LocationState::Unavailable(m) | LocationState::TimedOut(m) => {
                Some(m)
            }
            _ => None,
        }
    }

    fn from_error(error: LocationError) -> Self {
        let message = error.to_string();
        match error {
            LocationError::PermissionDenied => LocationState::Denied(message),
            LocationError::Timeout => LocationState::TimedOut(message),
            LocationError::PositionUnavailable | LocationError::Unsupported => {
                LocationState::Unavailable(message)
            }
        }
    }
}

struct Tracker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct LocationStore {
    config: LocationConfig,
    sessions: Arc<SessionStore>,
    storage: Arc<dyn KeyValueStore>,
    geolocator: Arc<dyn Geolocator>,
    geocoder: Arc<dyn ReverseGeocoder>,
    state: watch::Sender<LocationState>,
    tracker: Mutex<Option<Tracker>>,
}

impl LocationStore {
    pub fn new(
        config: LocationConfig,
        sessions: Arc<SessionStore>,
        storage: Arc<dyn KeyValueStore>,
        geolocator: Arc<dyn Geolocator>,
        geocoder: Arc<dyn ReverseGeocoder>,
    ) -> Self {
        let (state, _) = watch::channel(LocationState::Unknown);
        Self {
            config,
            sessions,
            storage,
            geolocator,
            geocoder,
            state,
            tracker: Mutex::new(None),
        }
    }

    /// Current state. A sample that has outlived its window is expired first,
    /// so a stale `Valid` is never returned.
    pub fn state(&self) -> LocationState {
        self.current();
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LocationState> {
        self.state.subscribe()
    }

    /// Startup: load the persisted sample (stale ones are deleted), start the
    /// background tracker, and acquire a fix once if a session is active but
    /// no valid sample exists.
    pub async fn init(self: &Arc<Self>) {
        self.load_persisted(Utc::now());
        self.start_tracker();

        if self.current().is_none() && self.sessions.is_signed_in() {
            tracing::info!("No valid location on startup, requesting one");
            self.request_location().await;
        }
    }

    /// Stop the background tracker and wait for it to exit.
    pub async fn teardown(&self) {
        let tracker = match self.tracker.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(tracker) = tracker {
            tracker.cancel.cancel();
            let _ = tracker.handle.await;
            tracing::debug!("Location tracker stopped");
        }
    }

    pub fn is_tracker_running(&self) -> bool {
        self.tracker
            .lock()
            .map(|guard| guard.as_ref().is_some_and(|t| !t.handle.is_finished()))
            .unwrap_or(false)
    }

    /// Load the persisted sample without starting the tracker.
    pub fn restore(&self) -> Option<LocationSample> {
        self.load_persisted(Utc::now());
        self.current()
    }

    fn load_persisted(&self, now: DateTime<Utc>) {
        let raw = match self.storage.get(LOCATION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read persisted location");
                return;
            }
        };

        match serde_json::from_str::<LocationSample>(&raw) {
            Ok(sample) if sample.is_valid_at(now, self.config.validity()) => {
                self.state.send_replace(LocationState::Valid(sample));
            }
            Ok(_) => {
                tracing::info!("Persisted location is stale, discarding");
                self.remove_persisted();
                self.state.send_replace(LocationState::Expired);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Invalid persisted location, discarding");
                self.remove_persisted();
            }
        }
    }

    fn remove_persisted(&self) {
        if let Err(e) = self.storage.remove(LOCATION_KEY) {
            tracing::error!(error = %e, "Failed to remove persisted location");
        }
    }

    /// Acquire a fix, enrich it, persist it. Returns the resulting state.
    pub async fn request_location(&self) -> LocationState {
        if !self.geolocator.is_supported() {
            return self.fail(LocationError::Unsupported);
        }

        self.state.send_replace(LocationState::Acquiring);

        let options = PositionOptions::from(&self.config);
        let position = match self.geolocator.current_position(options).await {
            Ok(position) => position,
            Err(e) => {
                tracing::warn!(code = ?e.code, message = %e.message, "Geolocation error");
                return self.fail(LocationError::from(&e));
            }
        };

        let mut sample = LocationSample::new(
            position.latitude,
            position.longitude,
            position.accuracy,
            Utc::now(),
        );

        match self.geocoder.reverse(sample.latitude, sample.longitude).await {
            Ok(place) => sample.enrich(place),
            Err(e) => {
                tracing::warn!(geocoder = self.geocoder.name(), error = %e, "Failed to get location details")
            }
        }

        match serde_json::to_string(&sample) {
            Ok(json) => {
                if let Err(e) = self.storage.set(LOCATION_KEY, json) {
                    tracing::error!(error = %e, "Failed to persist location");
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to serialize location"),
        }

        tracing::info!(
            latitude = sample.latitude,
            longitude = sample.longitude,
            city = ?sample.city,
            "Location acquired"
        );

        let state = LocationState::Valid(sample);
        self.state.send_replace(state.clone());

        if self.sessions.is_signed_in() {
            self.report_activity(ACTIVITY_LOCATION_UPDATE).await;
        }

        state
    }

    /// A failed acquisition drops the previous sample from memory and disk
    /// alike, so a reload never resurrects it.
    fn fail(&self, error: LocationError) -> LocationState {
        self.remove_persisted();
        let state = LocationState::from_error(error);
        self.state.send_replace(state.clone());
        state
    }

    pub fn clear_location(&self) {
        self.remove_persisted();
        self.state.send_replace(LocationState::Unknown);
    }

    pub fn current(&self) -> Option<LocationSample> {
        self.current_at(Utc::now())
    }

    /// The sample if it is still valid at `now`. An expired sample is deleted
    /// and the state moves to `Expired`.
    pub fn current_at(&self, now: DateTime<Utc>) -> Option<LocationSample> {
        let sample = self.state.borrow().sample().cloned()?;
        if sample.is_valid_at(now, self.config.validity()) {
            return Some(sample);
        }
        self.expire(&sample);
        None
    }

    fn expire(&self, sample: &LocationSample) {
        let expired = self.state.send_if_modified(|state| match state {
            LocationState::Valid(current) if current == sample => {
                *state = LocationState::Expired;
                true
            }
            _ => false,
        });
        if expired {
            tracing::info!("Location sample expired");
            self.remove_persisted();
        }
    }

    /// Best-effort telemetry. Does nothing without both a session and a valid
    /// sample; failures are logged only.
    pub async fn report_activity(&self, activity: &str) {
        let Some(session) = self.sessions.current() else {
            return;
        };
        let Some(sample) = self.current() else {
            return;
        };

        let report = TrackingReport {
            retailer_id: session.subject_id,
            latitude: sample.latitude,
            longitude: sample.longitude,
            activity: activity.to_string(),
        };

        let response = self.sessions.api().track_location(&report).await;
        if response.success {
            tracing::debug!(activity = %activity, "Location tracked");
        } else {
            tracing::warn!(activity = %activity, error = ?response.error, "Failed to track location");
        }
    }

    fn start_tracker(self: &Arc<Self>) {
        let mut guard = match self.tracker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_tracker(
            Arc::downgrade(self),
            self.sessions.subscribe(),
            self.state.subscribe(),
            self.config.tracking_interval(),
            self.config.validity(),
            cancel.clone(),
        ));

        *guard = Some(Tracker { cancel, handle });
    }
}

/// Background tracker. Arms an expiry timer for every valid sample and, while
/// a session is active, a reporting interval. Any session or location change
/// drops both and the loop re-evaluates, so at most one interval is alive.
async fn run_tracker(
    store: Weak<LocationStore>,
    mut sessions: watch::Receiver<Option<Session>>,
    mut states: watch::Receiver<LocationState>,
    interval: Duration,
    validity: chrono::Duration,
    cancel: CancellationToken,
) {
    tracing::debug!(interval_ms = interval.as_millis() as u64, "Location tracker started");

    loop {
        let signed_in = sessions.borrow_and_update().is_some();
        let sample = states.borrow_and_update().sample().cloned();

        let Some(sample) = sample else {
            tokio::select! {
                _ = cancel.cancelled() => return,
                changed = sessions.changed() => {
                    if changed.is_err() { return; }
                }
                changed = states.changed() => {
                    if changed.is_err() { return; }
                }
            }
            continue;
        };

        let mut ticker = signed_in.then(|| {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });
        if ticker.is_some() {
            tracing::debug!("Background tracking active");
        }

        let until_expiry = (sample.expires_at(validity) - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let expiry = tokio::time::sleep(until_expiry);
        tokio::pin!(expiry);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = next_tick(&mut ticker) => {
                    let Some(store) = store.upgrade() else { return };
                    store.report_activity(ACTIVITY_BACKGROUND).await;
                }
                _ = &mut expiry => {
                    let Some(store) = store.upgrade() else { return };
                    store.current();
                    break;
                }
                changed = sessions.changed() => {
                    if changed.is_err() { return; }
                    break;
                }
                changed = states.changed() => {
                    if changed.is_err() { return; }
                    break;
                }
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
