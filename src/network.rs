// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Loading and caching of the drivable road network of a region.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::osm::{self, FileFormat, CAR_PROFILE};
use crate::{GeoPoint, Graph, KDTree};

/// Error conditions which may occur when obtaining a road network.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// The road network of the region has no nodes.
    #[error("no road network data for {0}")]
    NoGraphData(String),

    #[error("failed to load OSM data for {region}: {source}")]
    Osm {
        region: String,
        #[source]
        source: osm::Error,
    },

    #[error("failed to download OSM data for {region}: {source}")]
    Http {
        region: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Geographic area covered by a road network. The name identifies the region in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region {
    pub name: String,
}

impl Region {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Provides the raw road [Graph] of a region.
pub trait GraphSource: Send + Sync {
    fn fetch(&self, region: &Region) -> Result<Graph, NetworkError>;
}

/// [GraphSource] reading an OSM XML file from disk.
#[derive(Debug, Clone)]
pub struct OsmFileSource {
    path: PathBuf,
    format: FileFormat,
}

impl OsmFileSource {
    pub fn new(path: impl Into<PathBuf>, format: FileFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }
}

impl GraphSource for OsmFileSource {
    fn fetch(&self, region: &Region) -> Result<Graph, NetworkError> {
        log::info!("Loading road network of {} from {}", region, self.path.display());

        let mut g = Graph::default();
        let options = osm::Options {
            profile: &CAR_PROFILE,
            file_format: self.format,
            bbox: [0.0; 4],
        };
        osm::add_features_from_file(&mut g, &options, &self.path).map_err(|source| {
            NetworkError::Osm {
                region: region.name.clone(),
                source,
            }
        })?;
        Ok(g)
    }
}

/// [GraphSource] downloading all roads within a bounding box
/// from an [Overpass API](https://wiki.openstreetmap.org/wiki/Overpass_API) instance.
#[derive(Debug, Clone)]
pub struct OverpassSource {
    url: String,

    /// In order: left (min lon), bottom (min lat), right (max lon), top (max lat).
    bbox: [f64; 4],

    client: reqwest::blocking::Client,
}

impl OverpassSource {
    pub const DEFAULT_URL: &'static str = "https://overpass-api.de/api/interpreter";

    pub fn new(
        url: impl Into<String>,
        bbox: [f64; 4],
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            url: url.into(),
            bbox,
            client,
        })
    }

    /// Overpass QL query selecting all highways in the bounding box, together with their nodes.
    fn query(&self) -> String {
        let [min_lon, min_lat, max_lon, max_lat] = self.bbox;
        format!(
            "[out:xml][timeout:180];(way[\"highway\"]({},{},{},{});>;);out body;",
            min_lat, min_lon, max_lat, max_lon
        )
    }
}

impl GraphSource for OverpassSource {
    fn fetch(&self, region: &Region) -> Result<Graph, NetworkError> {
        log::info!("Downloading road network of {} from {}", region, self.url);

        let http_error = |source: reqwest::Error| NetworkError::Http {
            region: region.name.clone(),
            source,
        };

        let body = self
            .client
            .post(&self.url)
            .form(&[("data", self.query())])
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.bytes())
            .map_err(http_error)?;

        let mut g = Graph::default();
        let options = osm::Options {
            profile: &CAR_PROFILE,
            file_format: FileFormat::Xml,
            bbox: self.bbox,
        };
        osm::add_features_from_buffer(&mut g, &options, &body).map_err(|source| {
            NetworkError::Osm {
                region: region.name.clone(),
                source,
            }
        })?;
        Ok(g)
    }
}

/// Drivable road [Graph] of a region together with an index for nearest-node lookups.
#[derive(Debug)]
pub struct RoadNetwork {
    region: Region,
    graph: Graph,
    index: Option<KDTree>,
}

impl RoadNetwork {
    pub fn new(region: Region, graph: Graph) -> Self {
        let index = KDTree::from_nodes(graph.iter().cloned());
        Self {
            region,
            graph,
            index,
        }
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Returns the id of the node closest to the given position.
    pub fn nearest_node(&self, point: GeoPoint) -> Result<i64, NetworkError> {
        self.index
            .as_ref()
            .map(|index| index.find_nearest_node(point).id)
            .ok_or_else(|| NetworkError::NoGraphData(self.region.name.clone()))
    }
}

#[derive(Debug)]
struct CacheEntry {
    network: Arc<RoadNetwork>,
    fetched_at: Instant,
}

/// Provides the [RoadNetwork] of a single region, fetching it from a [GraphSource]
/// at most once per cache window.
///
/// The cache may be read from multiple threads at once. Fetching happens outside of any lock:
/// concurrent requests for a stale region may fetch it more than once, in which case
/// the last fetched network is kept.
pub struct NetworkProvider {
    region: Region,
    source: Box<dyn GraphSource>,
    ttl: Duration,
    cache: RwLock<HashMap<Region, CacheEntry>>,
}

impl NetworkProvider {
    pub fn new(region: Region, source: Box<dyn GraphSource>, ttl: Duration) -> Self {
        Self {
            region,
            source,
            ttl,
            cache: RwLock::default(),
        }
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Returns the road network of the configured region,
    /// fetching it if it isn't cached or the cached copy is older than the cache window.
    pub fn network(&self) -> Result<Arc<RoadNetwork>, NetworkError> {
        if let Some(network) = self.cached() {
            log::debug!("Using cached road network of {}", self.region);
            return Ok(network);
        }

        let graph = self.source.fetch(&self.region)?;
        log::info!(
            "Road network of {}: {} nodes, {} edges",
            self.region,
            graph.len(),
            graph.edge_count()
        );
        let network = Arc::new(RoadNetwork::new(self.region.clone(), graph));

        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                self.region.clone(),
                CacheEntry {
                    network: network.clone(),
                    fetched_at: Instant::now(),
                },
            );
        Ok(network)
    }

    /// Drops the cached network, forcing the next [NetworkProvider::network] call to re-fetch it.
    pub fn invalidate(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.region);
    }

    fn cached(&self) -> Option<Arc<RoadNetwork>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&self.region)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.network.clone())
    }
}

impl std::fmt::Debug for NetworkProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkProvider")
            .field("region", &self.region)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
