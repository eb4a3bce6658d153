// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Resolution of free-text addresses into [GeoPoints](GeoPoint).

use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use serde::Deserialize;

use crate::GeoPoint;

/// Error conditions which may occur when geocoding an address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeocodeError {
    /// The address is empty, no lookup was attempted.
    #[error("address must not be empty")]
    EmptyAddress,

    /// The geocoding service did not respond in time.
    #[error("geocoding timed out: {0}")]
    Timeout(String),

    /// The geocoding service is unavailable or returned a malformed response.
    #[error("geocoding service error: {0}")]
    Service(String),

    /// The address does not resolve to any location.
    #[error("address not found: {0}")]
    NotFound(String),
}

/// Resolves addresses into positions.
pub trait Geocoder: Send + Sync {
    fn geocode(&self, address: &str) -> Result<GeoPoint, GeocodeError>;
}

/// Returns the trimmed address, or [GeocodeError::EmptyAddress] if nothing is left.
pub fn validate_address(address: &str) -> Result<&str, GeocodeError> {
    let address = address.trim();
    if address.is_empty() {
        Err(GeocodeError::EmptyAddress)
    } else {
        Ok(address)
    }
}

#[derive(Debug, Clone)]
pub struct NominatimConfig {
    pub base_url: String,

    /// Sent with every request, as required by the
    /// [Nominatim usage policy](https://operations.osmfoundation.org/policies/nominatim/).
    pub user_agent: String,

    pub timeout_secs: u64,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("riskroute/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 10,
        }
    }
}

/// [Geocoder] backed by a [Nominatim](https://nominatim.org/) search API.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    config: NominatimConfig,
    client: reqwest::blocking::Client,
}

impl NominatimGeocoder {
    pub fn new(config: NominatimConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { config, client })
    }

    fn search(&self, address: &str) -> Result<Vec<NominatimPlace>, reqwest::Error> {
        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));
        self.client
            .get(url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<Vec<NominatimPlace>>())
    }
}

impl Geocoder for NominatimGeocoder {
    fn geocode(&self, address: &str) -> Result<GeoPoint, GeocodeError> {
        let address = validate_address(address)?;
        log::debug!("Geocoding {:?} with {}", address, self.config.base_url);

        let places = self.search(address).map_err(|err| {
            if err.is_timeout() {
                GeocodeError::Timeout(format!(
                    "no response for {:?} within {} s",
                    address, self.config.timeout_secs
                ))
            } else {
                GeocodeError::Service(err.to_string())
            }
        })?;

        first_place_position(address, &places)
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

/// Picks the position of the best (first) search result.
fn first_place_position(
    address: &str,
    places: &[NominatimPlace],
) -> Result<GeoPoint, GeocodeError> {
    let place = places
        .first()
        .ok_or_else(|| GeocodeError::NotFound(address.to_string()))?;

    let parse = |value: &str| {
        value
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .ok_or_else(|| GeocodeError::Service(format!("invalid coordinate {:?}", value)))
    };

    Ok(GeoPoint::new(parse(&place.lat)?, parse(&place.lon)?))
}

/// Number of addresses remembered by [CachingGeocoder::new].
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct GeocodeCache {
    positions: HashMap<String, GeoPoint>,

    /// Cached addresses, oldest first.
    order: VecDeque<String>,
}

/// Memoizes successful lookups of the wrapped [Geocoder].
/// Failures are never cached, so a retry always reaches the wrapped geocoder.
///
/// At most `capacity` addresses are remembered; the oldest one is forgotten first.
#[derive(Debug)]
pub struct CachingGeocoder<G> {
    inner: G,
    capacity: usize,
    cache: RwLock<GeocodeCache>,
}

impl<G: Geocoder> CachingGeocoder<G> {
    pub fn new(inner: G) -> Self {
        Self::with_capacity(inner, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(inner: G, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            cache: RwLock::default(),
        }
    }

    fn remember(&self, address: &str, point: GeoPoint) {
        if self.capacity == 0 {
            return;
        }

        let mut guard = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let cache = &mut *guard;
        if cache.positions.insert(address.to_string(), point).is_some() {
            return;
        }

        cache.order.push_back(address.to_string());
        while cache.order.len() > self.capacity {
            if let Some(oldest) = cache.order.pop_front() {
                cache.positions.remove(&oldest);
            }
        }
    }
}

impl<G: Geocoder> Geocoder for CachingGeocoder<G> {
    fn geocode(&self, address: &str) -> Result<GeoPoint, GeocodeError> {
        let address = validate_address(address)?;

        if let Some(&point) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .positions
            .get(address)
        {
            log::debug!("Cache hit for geocode: {}", address);
            return Ok(point);
        }

        log::debug!("Cache miss for geocode: {}", address);
        let point = self.inner.geocode(address)?;
        self.remember(address, point);
        Ok(point)
    }
}
