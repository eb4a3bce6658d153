// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::{BinaryHeap, HashMap};

use crate::Graph;

/// Recommended number of allowed node expansions in [find_route]
/// before [PathError::StepLimitExceeded] is returned.
pub const DEFAULT_STEP_LIMIT: usize = 1_000_000;

/// Error conditions which may occur during [find_route].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// The start or end nodes don't exist in a graph.
    #[error("invalid node: {0}")]
    InvalidReference(i64),

    /// Every node reachable from the start was expanded without reaching the end.
    #[error("no route between nodes {0} and {1}")]
    NoRoute(i64, i64),

    /// Route search has exceeded its limit of steps.
    #[error("step limit exceeded")]
    StepLimitExceeded,
}

#[derive(Debug, Clone, Copy)]
struct QueueItem {
    at: i64,
    cost: f64,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.cost.total_cmp(&other.cost).is_eq()
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // NOTE: We revert the order of comparison,
        // as lower costs are considered better ("higher"),
        // and Rust's BinaryHeap is a max-heap.
        other.cost.total_cmp(&self.cost)
    }
}

fn reconstruct_path(came_from: &HashMap<i64, i64>, mut last: i64) -> Vec<i64> {
    let mut path = vec![last];

    while let Some(&nd) = came_from.get(&last) {
        path.push(nd);
        last = nd;
    }

    path.reverse();
    path
}

/// Uses [Dijkstra's algorithm](https://en.wikipedia.org/wiki/Dijkstra%27s_algorithm)
/// to find the path between two nodes with the smallest total edge length.
/// Edges without a length count as zero meters.
///
/// The returned path always starts with `from_id` and ends with `to_id`;
/// if both are equal, the path has a single node.
///
/// `step_limit` limits how many nodes may be expanded during the search
/// before returning [PathError::StepLimitExceeded]. The recommended value is
/// [DEFAULT_STEP_LIMIT].
pub fn find_route(
    g: &Graph,
    from_id: i64,
    to_id: i64,
    step_limit: usize,
) -> Result<Vec<i64>, PathError> {
    g.get_node(from_id)
        .ok_or(PathError::InvalidReference(from_id))?;
    g.get_node(to_id).ok_or(PathError::InvalidReference(to_id))?;

    let mut queue: BinaryHeap<QueueItem> = BinaryHeap::default();
    let mut came_from: HashMap<i64, i64> = HashMap::default();
    let mut known_costs: HashMap<i64, f64> = HashMap::default();
    let mut steps: usize = 0;

    queue.push(QueueItem {
        at: from_id,
        cost: 0.0,
    });
    known_costs.insert(from_id, 0.0);

    while let Some(item) = queue.pop() {
        if item.at == to_id {
            return Ok(reconstruct_path(&came_from, to_id));
        }

        // Multiple items for the same node may be kept in the queue - skip outdated ones.
        if item.cost > known_costs.get(&item.at).cloned().unwrap_or(f64::INFINITY) {
            continue;
        }

        steps += 1;
        if steps > step_limit {
            return Err(PathError::StepLimitExceeded);
        }

        for edge in g.get_edges(item.at) {
            if g.get_node(edge.to).is_none() {
                continue;
            }

            let neighbor_cost = item.cost + edge.length_or_zero();
            if neighbor_cost
                >= known_costs
                    .get(&edge.to)
                    .cloned()
                    .unwrap_or(f64::INFINITY)
            {
                continue;
            }

            came_from.insert(edge.to, item.at);
            known_costs.insert(edge.to, neighbor_cost);
            queue.push(QueueItem {
                at: edge.to,
                cost: neighbor_cost,
            });
        }
    }

    Err(PathError::NoRoute(from_id, to_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Edge, Node};

    fn simple_graph() -> Graph {
        //   1 ──100── 2 ──100── 3
        //   │                   │
        //   └───50─── 4 ───50───┘     5 (isolated)
        let mut g = Graph::new();
        for (id, lat, lon) in [
            (1, 51.0, 4.0),
            (2, 51.0, 4.001),
            (3, 51.0, 4.002),
            (4, 50.999, 4.001),
            (5, 52.0, 5.0),
        ] {
            g.set_node(Node { id, lat, lon });
        }
        for (a, b, length) in [(1, 2, 100.0), (2, 3, 100.0), (1, 4, 50.0), (4, 3, 50.0)] {
            g.add_edge(
                a,
                Edge {
                    to: b,
                    name: None,
                    length: Some(length),
                },
            );
            g.add_edge(
                b,
                Edge {
                    to: a,
                    name: None,
                    length: Some(length),
                },
            );
        }
        g
    }

    #[test]
    fn shortest_by_length() {
        let g = simple_graph();
        assert_eq!(find_route(&g, 1, 3, DEFAULT_STEP_LIMIT), Ok(vec![1, 4, 3]));
        assert_eq!(find_route(&g, 3, 1, DEFAULT_STEP_LIMIT), Ok(vec![3, 4, 1]));
    }

    #[test]
    fn same_start_and_end() {
        let g = simple_graph();
        assert_eq!(find_route(&g, 2, 2, DEFAULT_STEP_LIMIT), Ok(vec![2]));
    }

    #[test]
    fn disconnected() {
        let g = simple_graph();
        assert_eq!(
            find_route(&g, 1, 5, DEFAULT_STEP_LIMIT),
            Err(PathError::NoRoute(1, 5))
        );
    }

    #[test]
    fn invalid_reference() {
        let g = simple_graph();
        assert_eq!(
            find_route(&g, 1, 42, DEFAULT_STEP_LIMIT),
            Err(PathError::InvalidReference(42))
        );
        assert_eq!(
            find_route(&g, 42, 1, DEFAULT_STEP_LIMIT),
            Err(PathError::InvalidReference(42))
        );
    }

    #[test]
    fn step_limit() {
        let g = simple_graph();
        assert_eq!(
            find_route(&g, 1, 3, 1),
            Err(PathError::StepLimitExceeded)
        );
    }

    #[test]
    fn missing_lengths_count_as_zero() {
        let mut g = simple_graph();
        g.add_edge(
            2,
            Edge {
                to: 4,
                name: None,
                length: None,
            },
        );
        assert_eq!(find_route(&g, 2, 3, DEFAULT_STEP_LIMIT), Ok(vec![2, 4, 3]));
    }
}
