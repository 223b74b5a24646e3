//! Wiring for hosts: one call builds the vault, gateway and both stores
//! around a shared storage backend.

use std::sync::Arc;

use crate::api::ApiClient;
use crate::config::RetailConfig;
use crate::credentials::CredentialVault;
use crate::error::RetailError;
use crate::geocode::{create_geocoder, ReverseGeocoder};
use crate::geolocation::Geolocator;
use crate::location::LocationStore;
use crate::session::SessionStore;
use crate::storage::KeyValueStore;

pub struct Stores {
    pub api: Arc<ApiClient>,
    pub sessions: Arc<SessionStore>,
    pub locations: Arc<LocationStore>,
}

impl Stores {
    pub fn build(
        config: &RetailConfig,
        storage: Arc<dyn KeyValueStore>,
        geolocator: Arc<dyn Geolocator>,
    ) -> Result<Self, RetailError> {
        let geocoder: Arc<dyn ReverseGeocoder> = Arc::from(
            create_geocoder(&config.geocoding).map_err(|e| RetailError::Other(e.to_string()))?,
        );
        Self::with_geocoder(config, storage, geolocator, geocoder)
    }

    pub fn with_geocoder(
        config: &RetailConfig,
        storage: Arc<dyn KeyValueStore>,
        geolocator: Arc<dyn Geolocator>,
        geocoder: Arc<dyn ReverseGeocoder>,
    ) -> Result<Self, RetailError> {
        let vault = Arc::new(CredentialVault::new(storage.clone()));
        let api = Arc::new(ApiClient::new(&config.api, vault)?);
        let sessions = Arc::new(SessionStore::new(api.clone()));
        let locations = Arc::new(LocationStore::new(
            config.location.clone(),
            sessions.clone(),
            storage,
            geolocator,
            geocoder,
        ));

        Ok(Self {
            api,
            sessions,
            locations,
        })
    }

    /// Startup sequence: optimistic session restore, verification in the
    /// background, then location init.
    pub async fn init(&self) {
        let (cached, _verification) = self.sessions.spawn_restore();
        if let Some(session) = cached {
            tracing::info!(subject_id = %session.subject_id, "Restored cached session");
        }
        self.locations.init().await;
    }

    pub async fn teardown(&self) {
        self.locations.teardown().await;
    }
}
