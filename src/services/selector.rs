use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::models::Endpoint;
use crate::services::graph::DependencyGraph;

/// An ordered endpoint sequence proposed as the backbone of one test case
#[derive(Debug, Clone)]
pub struct ChainCandidate {
    pub endpoint_ids: Vec<Uuid>,
}

impl ChainCandidate {
    pub fn len(&self) -> usize {
        self.endpoint_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoint_ids.is_empty()
    }
}

/// Walks the dependency graph to propose chain orderings: roots first,
/// longest paths preferred, bounded by a maximum depth.
pub struct ChainCandidateSelector {
    max_depth: usize,
}

impl ChainCandidateSelector {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Propose one candidate per root, keeping the best path found from
    /// that root. Between paths of equal length the one touching more
    /// distinct resources wins. Endpoints unreachable from any root
    /// (cycle members) each get a single-endpoint candidate so they are
    /// still exercised.
    pub fn select(
        &self,
        graph: &DependencyGraph,
        endpoints: &[Endpoint],
    ) -> Vec<ChainCandidate> {
        let by_id: HashMap<Uuid, &Endpoint> =
            endpoints.iter().map(|e| (e.id, e)).collect();

        let mut candidates = Vec::new();
        let mut covered: HashSet<Uuid> = HashSet::new();

        for root in graph.roots() {
            let mut best: Vec<Uuid> = Vec::new();
            let mut path = vec![root];
            let mut on_path: HashSet<Uuid> = [root].into();
            self.dfs_longest(graph, &by_id, &mut path, &mut on_path, &mut best);

            if self.respects_edges(graph, &best) {
                covered.extend(&best);
                candidates.push(ChainCandidate { endpoint_ids: best });
            }
        }

        // Cycle members have no root; propose them standalone rather than
        // dropping them
        for endpoint in endpoints {
            if !covered.contains(&endpoint.id) && graph.in_degree(endpoint.id) > 0 {
                let reachable = candidates
                    .iter()
                    .any(|c| c.endpoint_ids.contains(&endpoint.id));
                if !reachable {
                    candidates.push(ChainCandidate {
                        endpoint_ids: vec![endpoint.id],
                    });
                }
            }
        }

        // Longer chains first
        candidates.sort_by(|a, b| b.len().cmp(&a.len()));
        candidates
    }

    fn dfs_longest(
        &self,
        graph: &DependencyGraph,
        by_id: &HashMap<Uuid, &Endpoint>,
        path: &mut Vec<Uuid>,
        on_path: &mut HashSet<Uuid>,
        best: &mut Vec<Uuid>,
    ) {
        if self.better(by_id, path, best) {
            *best = path.clone();
        }
        if path.len() >= self.max_depth {
            return;
        }

        let Some(&last) = path.last() else { return };
        for &next in graph.dependents_of(last) {
            if on_path.contains(&next) {
                continue;
            }
            path.push(next);
            on_path.insert(next);
            self.dfs_longest(graph, by_id, path, on_path, best);
            path.pop();
            on_path.remove(&next);
        }
    }

    fn better(
        &self,
        by_id: &HashMap<Uuid, &Endpoint>,
        candidate: &[Uuid],
        best: &[Uuid],
    ) -> bool {
        if candidate.len() != best.len() {
            return candidate.len() > best.len();
        }
        Self::distinct_resources(by_id, candidate) > Self::distinct_resources(by_id, best)
    }

    /// Number of distinct first path segments a chain touches
    fn distinct_resources(by_id: &HashMap<Uuid, &Endpoint>, ids: &[Uuid]) -> usize {
        ids.iter()
            .filter_map(|id| by_id.get(id))
            .filter_map(|e| e.path.trim_start_matches('/').split('/').next())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Hard guarantee: an emitted ordering never places a dependent
    /// before its dependency
    fn respects_edges(&self, graph: &DependencyGraph, ordering: &[Uuid]) -> bool {
        for (i, &later) in ordering.iter().enumerate() {
            for &earlier in &ordering[..i] {
                if graph.has_edge(later, earlier) && !graph.has_edge(earlier, later) {
                    return false;
                }
            }
        }
        true
    }
}
