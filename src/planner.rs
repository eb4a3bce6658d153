// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::geocode::{validate_address, GeocodeError, Geocoder};
use crate::network::{NetworkError, NetworkProvider};
use crate::risk::{Classification, RiskStore};
use crate::segment::{aggregate_segments, RoadSegment, SegmentError};
use crate::{find_route, GeoPoint, PathError, DEFAULT_STEP_LIMIT};

/// Error conditions which may occur when planning a route.
///
/// Upstream failures keep their kind, so that callers can decide whether
/// it makes sense to ask the user for a retry.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("address must not be empty")]
    EmptyAddress,

    #[error("geocoding timed out, please retry: {0}")]
    GeocodeTimeout(String),

    #[error("geocoding service error, please try again later: {0}")]
    GeocodeServiceError(String),

    #[error("address not found: {0}")]
    GeocodeNotFound(String),

    #[error("no road network data for {0}")]
    NoGraphData(String),

    #[error("no route from {start:?} to {end:?}")]
    NoRoute { start: String, end: String },

    #[error("route search exceeded its step limit")]
    StepLimitExceeded,

    #[error(transparent)]
    Network(NetworkError),

    #[error("route search failed: {0}")]
    Path(PathError),

    #[error("inconsistent road network: {0}")]
    Segment(#[from] SegmentError),
}

impl From<GeocodeError> for RouteError {
    fn from(err: GeocodeError) -> Self {
        match err {
            GeocodeError::EmptyAddress => Self::EmptyAddress,
            GeocodeError::Timeout(msg) => Self::GeocodeTimeout(msg),
            GeocodeError::Service(msg) => Self::GeocodeServiceError(msg),
            GeocodeError::NotFound(address) => Self::GeocodeNotFound(address),
        }
    }
}

impl From<NetworkError> for RouteError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::NoGraphData(region) => Self::NoGraphData(region),
            other => Self::Network(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerConfig {
    /// Maximum number of nodes expanded by a single route search.
    pub step_limit: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }
}

/// [RoadSegment] together with its risk [Classification].
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedSegment {
    pub segment: RoadSegment,
    pub classification: Classification,
}

/// Outcome of a single route request.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteResult {
    /// Geocoded start address.
    pub start: GeoPoint,

    /// Geocoded end address.
    pub end: GeoPoint,

    /// Node ids of the route, starting at the node closest to `start`.
    pub path: Vec<i64>,

    /// Positions of all nodes of `path`.
    pub path_coords: Vec<GeoPoint>,

    /// Road segments in the order of their first appearance along the route.
    pub segments: Vec<ClassifiedSegment>,

    /// Total length of the route, in meters.
    pub total_length: f64,
}

/// Computes risk-annotated routes between addresses.
///
/// Every request is a function of the two addresses and of the current snapshots
/// of the road network and the risk table; the planner keeps no per-request state.
pub struct RoutePlanner {
    geocoder: Box<dyn Geocoder>,
    network: NetworkProvider,
    risk: RiskStore,
    config: PlannerConfig,
}

impl RoutePlanner {
    pub fn new(
        geocoder: Box<dyn Geocoder>,
        network: NetworkProvider,
        risk: RiskStore,
        config: PlannerConfig,
    ) -> Self {
        Self {
            geocoder,
            network,
            risk,
            config,
        }
    }

    /// Risk table used for classifying segments, shared with the prediction refresher.
    pub fn risk_store(&self) -> &RiskStore {
        &self.risk
    }

    pub fn network_provider(&self) -> &NetworkProvider {
        &self.network
    }

    /// Plans a route between two addresses and classifies every road along it.
    ///
    /// Both addresses are validated before any external service is contacted,
    /// and the road network is only requested after both addresses were geocoded.
    pub fn plan_route(
        &self,
        start_address: &str,
        end_address: &str,
    ) -> Result<RouteResult, RouteError> {
        let start_address = validate_address(start_address)?;
        let end_address = validate_address(end_address)?;

        let start = self.geocoder.geocode(start_address)?;
        let end = self.geocoder.geocode(end_address)?;
        log::debug!(
            "Geocoded {:?} to {:?} and {:?} to {:?}",
            start_address,
            start,
            end_address,
            end
        );

        let network = self.network.network()?;
        let start_node = network.nearest_node(start)?;
        let end_node = network.nearest_node(end)?;

        let path = find_route(network.graph(), start_node, end_node, self.config.step_limit)
            .map_err(|err| match err {
                PathError::NoRoute(_, _) => RouteError::NoRoute {
                    start: start_address.to_string(),
                    end: end_address.to_string(),
                },
                PathError::StepLimitExceeded => RouteError::StepLimitExceeded,
                other => RouteError::Path(other),
            })?;

        let segments = aggregate_segments(network.graph(), &path)?;
        let total_length = segments.total_length();

        let path_coords = path
            .iter()
            .filter_map(|&id| network.graph().get_node(id))
            .map(|node| node.position())
            .collect();

        let risk = self.risk.snapshot();
        let segments: Vec<ClassifiedSegment> = segments
            .into_iter()
            .map(|segment| ClassifiedSegment {
                classification: risk.classify(&segment.name),
                segment,
            })
            .collect();

        log::info!(
            "Route from {:?} to {:?}: {} nodes, {} roads, {:.2} km",
            start_address,
            end_address,
            path.len(),
            segments.len(),
            total_length / 1000.0
        );

        Ok(RouteResult {
            start,
            end,
            path,
            path_coords,
            segments,
            total_length,
        })
    }
}

impl std::fmt::Debug for RoutePlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutePlanner")
            .field("network", &self.network)
            .field("risk", &self.risk)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
