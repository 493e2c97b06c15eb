//! Location Lookup
//!
//! Resolves the coordinates weather is fetched for: either a fixed
//! location from the settings or a best-effort IP geolocation lookup.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::providers::http::{HttpTransport, TransportError};
use crate::storage::config::SettingsStore;

/// IP geolocation endpoint answering with `{"loc": "lat,lon", ...}`.
pub const IPINFO_URL: &str = "https://ipinfo.io/json";

/// Latitude and longitude in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Parse `"lat,lon"`, rejecting values outside the valid ranges.
    pub fn parse(text: &str) -> Option<Self> {
        let (lat, lon) = text.split_once(',')?;
        let coords = Self::new(lat.trim().parse().ok()?, lon.trim().parse().ok()?);
        coords.is_valid().then_some(coords)
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Location lookup errors.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Location lookup failed: {0}")]
    Lookup(#[from] TransportError),

    #[error("Location service returned status {0}")]
    Status(u16),

    #[error("Location service returned no usable coordinates: {0}")]
    Malformed(String),

    #[error("Invalid coordinates for location '{0}'")]
    InvalidCoordinates(String),
}

/// Supplies the coordinates of the active location.
pub trait LocationProvider: Send + Sync {
    fn coordinates(&self) -> BoxFuture<'_, Result<Coordinates, LocationError>>;
}

/// Always the same coordinates.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinates);

impl LocationProvider for FixedLocation {
    fn coordinates(&self) -> BoxFuture<'_, Result<Coordinates, LocationError>> {
        let coords = self.0;
        Box::pin(async move { Ok(coords) })
    }
}

#[derive(Debug, Deserialize)]
struct IpInfo {
    loc: Option<String>,
}

/// IP geolocation with a time-limited cache.
pub struct IpLocator {
    transport: Arc<dyn HttpTransport>,
    cached: Mutex<Option<(Instant, Coordinates)>>,
}

impl IpLocator {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            cached: Mutex::new(None),
        }
    }

    /// Coordinates of this machine's public IP, reusing a lookup younger
    /// than `max_age`.
    pub async fn locate(&self, max_age: Duration) -> Result<Coordinates, LocationError> {
        let mut cached = self.cached.lock().await;
        if let Some((at, coords)) = *cached {
            if at.elapsed() < max_age {
                return Ok(coords);
            }
        }

        tracing::debug!("Looking up location from IP address");
        let response = self.transport.get_json(IPINFO_URL, &[]).await?;
        if !response.is_success() {
            return Err(LocationError::Status(response.status));
        }

        let info = IpInfo::deserialize(&response.body)
            .map_err(|e| LocationError::Malformed(e.to_string()))?;
        let loc = info.loc.unwrap_or_default();
        let coords = Coordinates::parse(&loc).ok_or(LocationError::Malformed(loc))?;

        tracing::info!("Located at {:.4}, {:.4}", coords.latitude, coords.longitude);
        *cached = Some((Instant::now(), coords));
        Ok(coords)
    }
}

/// Resolves the location selected in the settings.
///
/// Entries without coordinates, or an empty location list, mean
/// "my location" and go through [`IpLocator`].
pub struct LocationResolver {
    settings: Arc<SettingsStore>,
    locator: IpLocator,
}

impl LocationResolver {
    pub fn new(settings: Arc<SettingsStore>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            settings,
            locator: IpLocator::new(transport),
        }
    }

    async fn resolve(&self) -> Result<Coordinates, LocationError> {
        let settings = self.settings.snapshot();

        match settings.active_location() {
            Some(entry) => match entry.coordinates {
                Some(coords) if coords.is_valid() => Ok(coords),
                Some(_) => Err(LocationError::InvalidCoordinates(entry.name.clone())),
                None => self.locator.locate(settings.location_refresh_interval()).await,
            },
            None => self.locator.locate(settings.location_refresh_interval()).await,
        }
    }
}

impl LocationProvider for LocationResolver {
    fn coordinates(&self) -> BoxFuture<'_, Result<Coordinates, LocationError>> {
        Box::pin(self.resolve())
    }
}
