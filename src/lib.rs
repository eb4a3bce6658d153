// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Driving routes over [OpenStreetMap](https://www.openstreetmap.org/) data,
//! annotated with per-road risk levels.
//!
//! A route request geocodes two addresses, snaps them onto a drivable road [Graph],
//! finds the shortest path by edge length, merges the path's edges into named
//! [road segments](RoadSegment) and classifies every segment against a
//! [risk table](RiskTable). The result can be rendered into a colored [map](RouteMap)
//! and a short textual summary.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! let geocoder = riskroute::NominatimGeocoder::new(riskroute::NominatimConfig::default())
//!     .expect("failed to build the geocoder");
//! let source = riskroute::OsmFileSource::new("breda.osm", riskroute::osm::FileFormat::Xml);
//! let network = riskroute::NetworkProvider::new(
//!     riskroute::Region::new("Breda, Netherlands"),
//!     Box::new(source),
//!     Duration::from_secs(3600),
//! );
//! let risk = riskroute::RiskStore::new(
//!     riskroute::RiskTable::from_path("model_data.csv").expect("failed to load the risk table"),
//! );
//!
//! let planner = riskroute::RoutePlanner::new(
//!     Box::new(geocoder),
//!     network,
//!     risk,
//!     riskroute::PlannerConfig::default(),
//! );
//! let route = planner
//!     .plan_route("Grote Markt, Breda", "Breda University of Applied Sciences")
//!     .expect("failed to plan the route");
//!
//! for line in route.summary_lines() {
//!     println!("{}", line);
//! }
//! ```

mod dijkstra;
mod distance;
pub mod geocode;
mod graph;
mod kd;
pub mod network;
pub mod osm;
mod planner;
pub mod refresh;
mod render;
pub mod risk;
mod segment;

pub use dijkstra::{find_route, PathError, DEFAULT_STEP_LIMIT};
pub use distance::earth_distance;
pub use geocode::{CachingGeocoder, GeocodeError, Geocoder, NominatimConfig, NominatimGeocoder};
pub use graph::Graph;
pub use kd::KDTree;
pub use network::{
    GraphSource, NetworkError, NetworkProvider, OsmFileSource, OverpassSource, Region, RoadNetwork,
};
pub use planner::{ClassifiedSegment, PlannerConfig, RouteError, RoutePlanner, RouteResult};
pub use refresh::{refresh_predictions, FeatureRow, LogisticModel, RefreshError, RiskModel};
pub use render::{render_route, Marker, MarkerKind, Polyline, RouteMap, DEFAULT_ZOOM};
pub use risk::{Classification, RiskColor, RiskRecord, RiskStore, RiskTable, DEFAULT_RISK_LEVEL};
pub use segment::{aggregate_segments, RoadSegment, SegmentError, Segments, UNNAMED_ROAD};

/// A position on Earth, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Returns the point halfway (in degrees) between `self` and `other`.
    pub fn midpoint(&self, other: &GeoPoint) -> GeoPoint {
        GeoPoint {
            lat: (self.lat + other.lat) / 2.0,
            lon: (self.lon + other.lon) / 2.0,
        }
    }
}

/// Represents an element of the [Graph].
///
/// Node identifiers are assigned by the data provider (OpenStreetMap node ids),
/// and are opaque to the rest of the crate. Nodes with `id == 0` are disallowed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
}

impl Node {
    #[inline]
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// Represents an outgoing (one-way) road connection from a specific [Node].
///
/// Both attributes are optional, as sparse source data is expected.
/// Consumers treat a missing `name` as [UNNAMED_ROAD] and a missing `length` as zero.
///
/// Due to implementation details, `to` might not exist in the [Graph].
/// Users must silently ignore such edges.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub to: i64,

    /// Name of the road this edge belongs to.
    pub name: Option<String>,

    /// Length of the edge, in meters.
    pub length: Option<f64>,
}

impl Edge {
    /// Length of the edge in meters, with missing lengths treated as zero.
    #[inline]
    pub fn length_or_zero(&self) -> f64 {
        self.length.unwrap_or(0.0)
    }

    /// Name of the road, with missing names replaced by [UNNAMED_ROAD].
    #[inline]
    pub fn name_or_default(&self) -> &str {
        self.name.as_deref().unwrap_or(UNNAMED_ROAD)
    }
}
