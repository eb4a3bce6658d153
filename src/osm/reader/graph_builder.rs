// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::{HashMap, HashSet};

use crate::{earth_distance, Edge, Graph, Node};

use super::{model, Options};

/// Helper object used for storing state related to converting [OSM features](super::model::Feature)
/// into a road [Graph].
pub(super) struct GraphBuilder<'a> {
    g: &'a mut Graph,
    options: &'a Options<'a>,
    unused_nodes: HashSet<i64>,
    ignore_bbox: bool,
}

impl<'a> GraphBuilder<'a> {
    /// Create a new graph builder, adding features to the provided graph.
    pub(super) fn new(g: &'a mut Graph, options: &'a Options<'a>) -> Self {
        let ignore_bbox =
            options.bbox.iter().all(|&x| x == 0.0) || options.bbox.iter().any(|x| !x.is_finite());

        Self {
            g,
            options,
            unused_nodes: HashSet::default(),
            ignore_bbox,
        }
    }

    /// Add all features from the provided iterator, and then remove
    /// all nodes which are not part of any routable way.
    pub(super) fn add_features<I, E>(&mut self, features: I) -> Result<(), E>
    where
        I: Iterator<Item = Result<model::Feature, E>>,
    {
        for f in features {
            self.add_feature(f?);
        }
        self.cleanup();
        Ok(())
    }

    fn cleanup(&mut self) {
        log::debug!("Removing {} nodes outside of the road network", self.unused_nodes.len());
        for id in self.unused_nodes.drain() {
            self.g.delete_node(id);
        }
    }

    fn add_feature(&mut self, f: model::Feature) {
        match f {
            model::Feature::Node(n) => self.add_node(n),
            model::Feature::Way(w) => self.add_way(w),
        }
    }

    fn add_node(&mut self, n: Node) {
        if self.is_in_bbox(n.lat, n.lon) && self.g.get_node(n.id).is_none() {
            self.g.set_node(n);
            self.unused_nodes.insert(n.id);
        }
    }

    fn is_in_bbox(&self, lat: f64, lon: f64) -> bool {
        if self.ignore_bbox {
            return true;
        }
        let [min_lon, min_lat, max_lon, max_lat] = self.options.bbox;
        lat >= min_lat && lat <= max_lat && lon >= min_lon && lon <= max_lon
    }

    fn add_way(&mut self, w: model::Way) {
        if !self.options.profile.is_routable(&w.tags) {
            return;
        }

        let nodes = self.get_way_nodes(&w);
        if nodes.is_empty() {
            return;
        }

        let (forward, backward) = self.options.profile.way_direction(&w.tags);
        let name = Self::get_way_name(&w.tags);

        self.create_edges(&nodes, name, forward, backward);
        for node_id in &nodes {
            self.unused_nodes.remove(node_id);
        }
    }

    fn get_way_name(tags: &HashMap<String, String>) -> Option<String> {
        tags.get("name").filter(|name| !name.is_empty()).cloned()
    }

    fn get_way_nodes(&self, w: &model::Way) -> Vec<i64> {
        // Remove references to unknown nodes
        let nodes: Vec<i64> = w
            .nodes
            .iter()
            .cloned()
            .filter(|&node_id| self.g.get_node(node_id).is_some())
            .collect();

        if nodes.len() < 2 {
            log::debug!("Skipping way {}: fewer than 2 known nodes", w.id);
            vec![]
        } else {
            nodes
        }
    }

    fn create_edges(&mut self, nodes: &[i64], name: Option<String>, forward: bool, backward: bool) {
        debug_assert!(nodes.len() >= 2);

        for pair in nodes.windows(2) {
            let (Some(left), Some(right)) = (self.g.get_node(pair[0]), self.g.get_node(pair[1]))
            else {
                continue;
            };

            let length = earth_distance(left.position(), right.position());

            if forward {
                self.g.add_edge(
                    left.id,
                    Edge {
                        to: right.id,
                        name: name.clone(),
                        length: Some(length),
                    },
                );
            }
            if backward {
                self.g.add_edge(
                    right.id,
                    Edge {
                        to: left.id,
                        name: name.clone(),
                        length: Some(length),
                    },
                );
            }
        }
    }
}
