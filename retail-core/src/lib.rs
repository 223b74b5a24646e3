pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod geocode;
pub mod geolocation;
pub mod location;
pub mod models;
pub mod session;
pub mod storage;
pub mod stores;

pub use api::{ApiClient, ApiResponse, BatchRequest, TrackingReport};
pub use config::RetailConfig;
pub use credentials::{CredentialVault, SessionEvent};
pub use error::RetailError;
pub use geocode::{create_geocoder, BigDataCloudGeocoder, DisabledGeocoder, ReverseGeocoder};
pub use geolocation::{FixedGeolocator, Geolocator, LocationError, UnsupportedGeolocator};
pub use location::{LocationState, LocationStore};
pub use models::{LocationSample, Place, Registration, Session, UserProfile};
pub use session::{AuthError, SessionStore};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use stores::Stores;
