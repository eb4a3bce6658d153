// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use serde_json::{json, Value};

use crate::planner::RouteResult;
use crate::risk::RiskColor;
use crate::GeoPoint;

/// Initial zoom level of rendered maps.
pub const DEFAULT_ZOOM: u8 = 13;

/// Single colored line of a [RouteMap], drawn between two consecutive route nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    pub from: GeoPoint,
    pub to: GeoPoint,
    pub color: RiskColor,
    pub road_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Start,
    End,
}

impl MarkerKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::End => "End",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Start => "green",
            Self::End => "red",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub position: GeoPoint,
}

/// Renderer-independent description of a route map.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMap {
    pub center: GeoPoint,
    pub zoom: u8,
    pub polylines: Vec<Polyline>,
    pub markers: Vec<Marker>,
}

/// Converts a [RouteResult] into a [RouteMap].
///
/// The map is centered halfway between the geocoded addresses. Every segment contributes
/// one polyline per edge, in the color of its risk tier. Start and end markers are placed
/// on the first and last node of the route.
pub fn render_route(route: &RouteResult, zoom: u8) -> RouteMap {
    let polylines = route
        .segments
        .iter()
        .flat_map(|s| {
            s.segment.coords.iter().map(move |&(from, to)| Polyline {
                from,
                to,
                color: s.classification.color,
                road_name: s.segment.name.clone(),
            })
        })
        .collect();

    let mut markers = Vec::with_capacity(2);
    if let (Some(&first), Some(&last)) = (route.path_coords.first(), route.path_coords.last()) {
        markers.push(Marker {
            kind: MarkerKind::Start,
            position: first,
        });
        markers.push(Marker {
            kind: MarkerKind::End,
            position: last,
        });
    }

    RouteMap {
        center: route.start.midpoint(&route.end),
        zoom,
        polylines,
        markers,
    }
}

impl RouteMap {
    /// Returns the map as a GeoJSON FeatureCollection.
    ///
    /// Polylines become LineStrings with `road_name` and `color` properties,
    /// markers become Points with `marker`, `label` and `color` properties.
    pub fn to_geojson(&self) -> Value {
        let lines = self.polylines.iter().map(|l| {
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[l.from.lon, l.from.lat], [l.to.lon, l.to.lat]],
                },
                "properties": {
                    "road_name": l.road_name,
                    "color": l.color.as_str(),
                },
            })
        });

        let markers = self.markers.iter().map(|m| {
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [m.position.lon, m.position.lat],
                },
                "properties": {
                    "marker": m.kind.label().to_lowercase(),
                    "label": m.kind.label(),
                    "color": m.kind.color(),
                },
            })
        });

        json!({
            "type": "FeatureCollection",
            "features": lines.chain(markers).collect::<Vec<_>>(),
        })
    }

    /// Returns a standalone HTML page showing the map with [Leaflet](https://leafletjs.com/)
    /// over OpenStreetMap tiles.
    pub fn to_html(&self) -> String {
        // "</" can't appear inside a <script> element
        let geojson = self.to_geojson().to_string().replace("</", "<\\/");

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Route</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>html, body, #map {{ height: 100%; margin: 0; }}</style>
</head>
<body>
<div id="map"></div>
<script>
const map = L.map("map").setView([{lat}, {lon}], {zoom});
L.tileLayer("https://tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png", {{
  maxZoom: 19,
  attribution: "&copy; OpenStreetMap contributors",
}}).addTo(map);
L.geoJSON({geojson}, {{
  style: (f) => ({{ color: f.properties.color, weight: 5, opacity: 0.8 }}),
  pointToLayer: (f, latlng) => L.circleMarker(latlng, {{
    radius: 8, color: f.properties.color, fillColor: f.properties.color, fillOpacity: 0.9,
  }}),
  onEachFeature: (f, layer) => layer.bindPopup(
    f.properties.label || ("Road: " + f.properties.road_name)
  ),
}}).addTo(map);
</script>
</body>
</html>
"#,
            lat = self.center.lat,
            lon = self.center.lon,
            zoom = self.zoom,
            geojson = geojson,
        )
    }
}

impl RouteResult {
    /// Human-readable summary: one line per road segment, followed by the total route length.
    pub fn summary_lines(&self) -> Vec<String> {
        self.segments
            .iter()
            .map(|s| {
                format!(
                    "Road Name: {}, Risk Level: {}, Length: {:.2} meters",
                    s.segment.name, s.classification.level, s.segment.length
                )
            })
            .chain(std::iter::once(format!(
                "Total Route Length: {:.2} km",
                self.total_length / 1000.0
            )))
            .collect()
    }
}
