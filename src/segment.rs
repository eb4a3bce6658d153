// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

use crate::{GeoPoint, Graph};

/// Name given to edges without a road name.
pub const UNNAMED_ROAD: &str = "Unnamed Road";

/// Error conditions which may occur during [aggregate_segments].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SegmentError {
    /// A node of the path doesn't exist in the graph.
    #[error("invalid node: {0}")]
    InvalidReference(i64),

    /// Two consecutive nodes of the path are not connected by any edge.
    #[error("no edge from node {0} to node {1}")]
    MissingEdge(i64, i64),
}

/// All edges of a path sharing a single road name.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadSegment {
    pub name: String,

    /// Start and end position of every edge of this segment, in path order.
    pub coords: Vec<(GeoPoint, GeoPoint)>,

    /// Sum of the lengths of all edges of this segment, in meters.
    pub length: f64,
}

/// [RoadSegments](RoadSegment) of a path, keyed by road name
/// and ordered by the first occurrence of each name along the path.
///
/// Edges sharing a name are merged into one segment even if the road is left and
/// re-entered later on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segments {
    segments: Vec<RoadSegment>,
    by_name: HashMap<String, usize>,
}

impl Segments {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RoadSegment> {
        self.segments.iter()
    }

    pub fn get(&self, name: &str) -> Option<&RoadSegment> {
        self.by_name.get(name).map(|&idx| &self.segments[idx])
    }

    /// Sum of the lengths of all segments, in meters.
    pub fn total_length(&self) -> f64 {
        self.segments.iter().map(|s| s.length).sum()
    }

    fn add_edge(&mut self, name: &str, coords: (GeoPoint, GeoPoint), length: f64) {
        let idx = match self.by_name.get(name) {
            Some(&idx) => idx,
            None => {
                self.segments.push(RoadSegment {
                    name: name.to_string(),
                    coords: Vec::default(),
                    length: 0.0,
                });
                self.by_name.insert(name.to_string(), self.segments.len() - 1);
                self.segments.len() - 1
            }
        };

        let segment = &mut self.segments[idx];
        segment.coords.push(coords);
        segment.length += length;
    }
}

impl IntoIterator for Segments {
    type Item = RoadSegment;
    type IntoIter = std::vec::IntoIter<RoadSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.into_iter()
    }
}

impl<'a> IntoIterator for &'a Segments {
    type Item = &'a RoadSegment;
    type IntoIter = std::slice::Iter<'a, RoadSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

/// Walks every pair of consecutive nodes of a path and groups the edges
/// between them by road name.
///
/// If multiple edges connect a pair of nodes, the first one (as returned by
/// [Graph::get_edge]) is used. Edges without a name are grouped under [UNNAMED_ROAD],
/// and edges without a length contribute zero meters.
///
/// A path with a single node produces no segments.
pub fn aggregate_segments(g: &Graph, path: &[i64]) -> Result<Segments, SegmentError> {
    let mut segments = Segments::default();

    for pair in path.windows(2) {
        let (from_id, to_id) = (pair[0], pair[1]);
        let from = g
            .get_node(from_id)
            .ok_or(SegmentError::InvalidReference(from_id))?;
        let to = g
            .get_node(to_id)
            .ok_or(SegmentError::InvalidReference(to_id))?;
        let edge = g
            .get_edge(from_id, to_id)
            .ok_or(SegmentError::MissingEdge(from_id, to_id))?;

        segments.add_edge(
            edge.name_or_default(),
            (from.position(), to.position()),
            edge.length_or_zero(),
        );
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Edge, Node};

    macro_rules! assert_almost_eq {
        ($a:expr, $b:expr) => {
            assert!(
                (($a - $b).abs() < 1e-9),
                "assertion failed: {} ≈ {}",
                $a,
                $b
            )
        };
    }

    fn graph_with_edges(edges: &[(i64, i64, Option<&str>, Option<f64>)]) -> Graph {
        let mut g = Graph::new();
        for &(a, b, _, _) in edges {
            for id in [a, b] {
                g.set_node(Node {
                    id,
                    lat: 51.0 + id as f64 * 0.001,
                    lon: 4.0,
                });
            }
        }
        for &(a, b, name, length) in edges {
            g.add_edge(
                a,
                Edge {
                    to: b,
                    name: name.map(str::to_string),
                    length,
                },
            );
        }
        g
    }

    #[test]
    fn merges_edges_by_name() {
        let g = graph_with_edges(&[
            (1, 2, Some("Main St"), Some(100.0)),
            (2, 3, Some("Main St"), Some(50.0)),
            (3, 4, Some("Oak Ave"), Some(200.0)),
        ]);
        let segments = aggregate_segments(&g, &[1, 2, 3, 4]).unwrap();

        let names: Vec<&str> = segments.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Main St", "Oak Ave"]);

        let main = segments.get("Main St").unwrap();
        assert_almost_eq!(main.length, 150.0);
        assert_eq!(main.coords.len(), 2);
        assert_eq!(main.coords[0].0, g.get_node(1).unwrap().position());
        assert_eq!(main.coords[1].1, g.get_node(3).unwrap().position());

        assert_almost_eq!(segments.get("Oak Ave").unwrap().length, 200.0);
        assert_almost_eq!(segments.total_length(), 350.0);
    }

    #[test]
    fn single_node_path() {
        let g = graph_with_edges(&[(1, 2, Some("Main St"), Some(100.0))]);
        let segments = aggregate_segments(&g, &[1]).unwrap();
        assert!(segments.is_empty());
        assert_eq!(segments.total_length(), 0.0);
    }

    #[test]
    fn missing_attributes_use_defaults() {
        let g = graph_with_edges(&[
            (1, 2, None, Some(30.0)),
            (2, 3, Some("Main St"), None),
            (3, 4, None, Some(12.5)),
        ]);
        let segments = aggregate_segments(&g, &[1, 2, 3, 4]).unwrap();

        let unnamed = segments.get(UNNAMED_ROAD).unwrap();
        assert_almost_eq!(unnamed.length, 42.5);
        assert_eq!(unnamed.coords.len(), 2);
        assert_eq!(segments.get("Main St").unwrap().length, 0.0);
    }

    #[test]
    fn non_contiguous_names_are_merged() {
        let g = graph_with_edges(&[
            (1, 2, Some("Main St"), Some(10.0)),
            (2, 3, Some("Oak Ave"), Some(20.0)),
            (3, 4, Some("Main St"), Some(30.0)),
        ]);
        let segments = aggregate_segments(&g, &[1, 2, 3, 4]).unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments.iter().next().unwrap().name, "Main St");
        assert_almost_eq!(segments.get("Main St").unwrap().length, 40.0);
    }

    #[test]
    fn first_parallel_edge_wins() {
        let g = graph_with_edges(&[
            (1, 2, Some("Service Road"), Some(80.0)),
            (1, 2, Some("Main St"), Some(60.0)),
        ]);
        let segments = aggregate_segments(&g, &[1, 2]).unwrap();
        assert_eq!(segments.len(), 1);
        assert_almost_eq!(segments.get("Service Road").unwrap().length, 80.0);
    }

    #[test]
    fn total_equals_sum_of_edges() {
        let edges: Vec<(i64, i64, Option<&str>, Option<f64>)> = (1..20)
            .map(|i| {
                let name = ["A", "B", "C"][(i % 3) as usize];
                (i, i + 1, Some(name), Some(i as f64 * 1.1))
            })
            .collect();
        let g = graph_with_edges(&edges);
        let path: Vec<i64> = (1..=20).collect();
        let segments = aggregate_segments(&g, &path).unwrap();

        let expected: f64 = edges.iter().map(|e| e.3.unwrap()).sum();
        assert_almost_eq!(segments.total_length(), expected);

        for segment in &segments {
            let expected: f64 = edges
                .iter()
                .filter(|e| e.2 == Some(segment.name.as_str()))
                .map(|e| e.3.unwrap())
                .sum();
            assert_almost_eq!(segment.length, expected);
        }
    }

    #[test]
    fn broken_paths_are_errors() {
        let g = graph_with_edges(&[(1, 2, Some("Main St"), Some(10.0))]);
        assert_eq!(
            aggregate_segments(&g, &[2, 1]),
            Err(SegmentError::MissingEdge(2, 1))
        );
        assert_eq!(
            aggregate_segments(&g, &[1, 9]),
            Err(SegmentError::InvalidReference(9))
        );
    }
}
