//! retail-cli: drive the storefront session and location stores from a shell
//!
//! State (token, profile, last location) lives in the JSON file named by
//! `storage.path`, so consecutive invocations behave like page reloads.
//!
//! # Subcommands
//! - `login` / `register` / `logout` / `whoami`
//! - `locate --lat <deg> --lon <deg>`: record a fix
//! - `location` / `clear-location`
//! - `track [--activity <name>]`: send location telemetry
//! - `health`: backend health check
//! - `watch`: run the stores until Ctrl+C

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use retail_core::location::ACTIVITY_BROWSE;
use retail_core::{
    FileStore, FixedGeolocator, Geolocator, KeyValueStore, LocationState, Registration,
    RetailConfig, Session, Stores, UnsupportedGeolocator,
};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "retail-cli", version, about = "Retail storefront session and location client")]
struct Cli {
    #[arg(short, long, default_value = "retail.toml")]
    config: String,

    /// Backend base URL (overrides api.base_url)
    #[arg(long, env = "RETAIL_API_URL")]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sign in and persist the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Create an account, then sign in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        phone: Option<String>,
    },

    /// Sign out and drop the persisted session
    Logout,

    /// Restore and verify the persisted session
    Whoami,

    /// Record a location fix at the given coordinates
    Locate {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Accuracy radius in meters
        #[arg(long)]
        accuracy: Option<f64>,
    },

    /// Show the persisted location if still valid
    Location,

    /// Forget the persisted location
    ClearLocation,

    /// Report the current location with an activity tag
    Track {
        #[arg(long, default_value = ACTIVITY_BROWSE)]
        activity: String,
    },

    /// Check backend health
    Health,

    /// Run the stores with background tracking until Ctrl+C
    Watch {
        #[arg(long, allow_hyphen_values = true, requires = "lon")]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lon: Option<f64>,
    },
}

// ============================================================================
// Formatting
// ============================================================================

pub fn describe_session(session: &Session) -> String {
    format!(
        "{} <{}> (subject {})",
        session.display_name, session.email, session.subject_id
    )
}

pub fn describe_state(state: &LocationState) -> String {
    match state {
        LocationState::Unknown => "no location".to_string(),
        LocationState::Acquiring => "acquiring location...".to_string(),
        LocationState::Expired => "location expired".to_string(),
        LocationState::Valid(sample) => {
            let place = [&sample.city, &sample.region, &sample.country]
                .into_iter()
                .flatten()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            let mut out = format!("{:.4}, {:.4}", sample.latitude, sample.longitude);
            if let Some(accuracy) = sample.accuracy {
                out.push_str(&format!(" (±{:.0} m)", accuracy));
            }
            if !place.is_empty() {
                out.push_str(&format!(" in {}", place));
            }
            out.push_str(&format!(" captured {}", sample.captured_at.to_rfc3339()));
            out
        }
        LocationState::Denied(message)
        | LocationState::Unavailable(message)
        | LocationState::TimedOut(message) => format!("error: {}", message),
    }
}

pub fn geolocator_for(coordinates: Option<(f64, f64)>, accuracy: Option<f64>) -> Arc<dyn Geolocator> {
    match coordinates {
        Some((lat, lon)) => Arc::new(FixedGeolocator::new(lat, lon, accuracy)),
        None => Arc::new(UnsupportedGeolocator),
    }
}

/// `RUST_LOG` when set, else the configured `logging.level`.
pub fn env_filter(config: &RetailConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = RetailConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config))?;
    if let Some(server) = cli.server.clone() {
        config.api.base_url = server;
    }

    fmt()
        .with_env_filter(env_filter(&config))
        .with_writer(std::io::stderr)
        .init();

    let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(config.storage.resolved_path()));

    let geolocator = match &cli.command {
        Commands::Locate { lat, lon, accuracy } => geolocator_for(Some((*lat, *lon)), *accuracy),
        Commands::Watch {
            lat: Some(lat),
            lon: Some(lon),
        } => geolocator_for(Some((*lat, *lon)), None),
        _ => geolocator_for(None, None),
    };

    let stores = Stores::build(&config, storage, geolocator)?;
    run(cli.command, &stores).await
}

async fn run(command: Commands, stores: &Stores) -> Result<()> {
    match command {
        Commands::Login { email, password } => {
            let session = stores.sessions.sign_in(&email, &password).await?;
            println!("Signed in as {}", describe_session(&session));
        }

        Commands::Register {
            name,
            email,
            password,
            phone,
        } => {
            let session = stores
                .sessions
                .register(Registration {
                    name,
                    email,
                    password,
                    phone,
                })
                .await?;
            println!("Registered and signed in as {}", describe_session(&session));
        }

        Commands::Logout => {
            stores.sessions.sign_out().await;
            println!("Signed out");
        }

        Commands::Whoami => match stores.sessions.restore_session().await {
            Some(session) => println!("{}", describe_session(&session)),
            None => println!("Not signed in"),
        },

        Commands::Locate { .. } => {
            stores.sessions.restore_cached();
            let state = stores.locations.request_location().await;
            println!("{}", describe_state(&state));
            if let Some(message) = state.error() {
                anyhow::bail!("{}", message);
            }
        }

        Commands::Location => {
            stores.locations.restore();
            println!("{}", describe_state(&stores.locations.state()));
        }

        Commands::ClearLocation => {
            stores.locations.clear_location();
            println!("Location cleared");
        }

        Commands::Track { activity } => {
            if stores.sessions.restore_cached().is_none() {
                anyhow::bail!("Not signed in");
            }
            if stores.locations.restore().is_none() {
                anyhow::bail!("No valid location; run `retail-cli locate` first");
            }
            stores.locations.report_activity(&activity).await;
            println!("Reported activity '{}'", activity);
        }

        Commands::Health => {
            let response = stores.api.health_check().await;
            if response.success {
                let body = response.data.unwrap_or_default();
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                anyhow::bail!("Backend unhealthy: {}", response.error_or("unknown error"));
            }
        }

        Commands::Watch { .. } => watch(stores).await?,
    }

    Ok(())
}

async fn watch(stores: &Stores) -> Result<()> {
    stores.init().await;

    let mut states = stores.locations.subscribe();
    let mut events = stores.sessions.events();

    match stores.sessions.current() {
        Some(session) => println!("Session: {}", describe_session(&session)),
        None => println!("Session: signed out"),
    }
    println!("Location: {}", describe_state(&stores.locations.state()));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Shutdown signal received");
                break;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                println!("Location: {}", describe_state(&state));
            }
            event = events.recv() => match event {
                Ok(event) => println!("Session event: {:?}", event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Missed {} session events", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    stores.teardown().await;
    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use retail_core::LocationSample;

    fn sample(city: Option<&str>) -> LocationSample {
        let mut sample = LocationSample::new(
            12.9716,
            77.5946,
            Some(25.0),
            "2026-03-01T10:00:00Z".parse().unwrap(),
        );
        sample.city = city.map(str::to_string);
        sample
    }

    #[test]
    fn test_parse_locate_with_negative_longitude() {
        let cli = Cli::try_parse_from([
            "retail-cli", "locate", "--lat", "40.7128", "--lon", "-74.006",
        ])
        .unwrap();
        match cli.command {
            Commands::Locate { lat, lon, accuracy } => {
                assert_eq!(lat, 40.7128);
                assert_eq!(lon, -74.006);
                assert_eq!(accuracy, None);
            }
            other => panic!("Expected Locate, got {:?}", other),
        }
    }

    #[test]
    fn test_track_defaults_to_browse() {
        let cli = Cli::try_parse_from(["retail-cli", "track"]).unwrap();
        match cli.command {
            Commands::Track { activity } => assert_eq!(activity, "browse"),
            other => panic!("Expected Track, got {:?}", other),
        }
    }

    #[test]
    fn test_watch_requires_both_coordinates() {
        assert!(Cli::try_parse_from(["retail-cli", "watch", "--lat", "1.0"]).is_err());
        assert!(Cli::try_parse_from(["retail-cli", "watch"]).is_ok());
    }

    #[test]
    fn test_describe_valid_state_includes_place() {
        let text = describe_state(&LocationState::Valid(sample(Some("Bengaluru"))));
        assert!(text.starts_with("12.9716, 77.5946"));
        assert!(text.contains("±25 m"));
        assert!(text.contains("Bengaluru"));
    }

    #[test]
    fn test_describe_error_state_uses_message() {
        let state = LocationState::Denied(
            "Location access denied. Please enable location services.".to_string(),
        );
        assert_eq!(
            describe_state(&state),
            "error: Location access denied. Please enable location services."
        );
    }

    #[test]
    fn test_log_filter_follows_configured_level() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = RetailConfig::from_toml("[logging]\nlevel = \"debug\"\n").unwrap();
        assert_eq!(
            env_filter(&config).max_level_hint(),
            Some(tracing::level_filters::LevelFilter::DEBUG)
        );

        let quiet = RetailConfig::from_toml("[logging]\nlevel = \"error\"\n").unwrap();
        assert_eq!(
            env_filter(&quiet).max_level_hint(),
            Some(tracing::level_filters::LevelFilter::ERROR)
        );
    }

    #[test]
    fn test_geolocator_without_coordinates_is_unsupported() {
        assert!(!geolocator_for(None, None).is_supported());
        assert!(geolocator_for(Some((0.0, 0.0)), None).is_supported());
    }
}
