use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::models::Endpoint;

/// Directed graph over endpoints: an edge A -> B means A must be called
/// before B (B consumes something A produces).
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// All endpoint ids in the graph, in catalog order
    pub nodes: Vec<Uuid>,
    /// edges[a] = endpoints depending on a
    pub edges: HashMap<Uuid, Vec<Uuid>>,
    /// Reverse adjacency, for in-degree queries
    pub reverse_edges: HashMap<Uuid, Vec<Uuid>>,
    /// Cycles found during construction. Flagged, never silently pruned;
    /// the selector decides what to do with them.
    pub cycles: Vec<Vec<Uuid>>,
}

impl DependencyGraph {
    pub fn dependents_of(&self, id: Uuid) -> &[Uuid] {
        self.edges.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn in_degree(&self, id: Uuid) -> usize {
        self.reverse_edges.get(&id).map(Vec::len).unwrap_or(0)
    }

    /// Endpoints with no unresolved dependency
    pub fn roots(&self) -> Vec<Uuid> {
        self.nodes
            .iter()
            .copied()
            .filter(|id| self.in_degree(*id) == 0)
            .collect()
    }

    pub fn has_edge(&self, from: Uuid, to: Uuid) -> bool {
        self.dependents_of(from).contains(&to)
    }
}

/// Infers dependency edges between endpoints from path-parameter
/// correlation and CRUD-lifecycle heuristics.
///
/// The inference is approximate by design: name matching can both miss
/// real dependencies and invent spurious ones.
pub struct DependencyGraphBuilder;

impl DependencyGraphBuilder {
    pub fn build(endpoints: &[Endpoint]) -> DependencyGraph {
        let mut graph = DependencyGraph {
            nodes: endpoints.iter().map(|e| e.id).collect(),
            ..DependencyGraph::default()
        };

        for producer in endpoints {
            let response_fields: Vec<String> = producer
                .response_fields()
                .iter()
                .map(|f| f.to_lowercase())
                .collect();

            for consumer in endpoints {
                if producer.id == consumer.id {
                    continue;
                }
                if Self::param_satisfied_by(consumer, &response_fields)
                    || Self::crud_lifecycle(producer, consumer)
                {
                    Self::add_edge(&mut graph, producer.id, consumer.id);
                }
            }
        }

        graph.cycles = Self::find_cycles(&graph);
        for cycle in &graph.cycles {
            tracing::warn!(?cycle, "Cyclic dependency between endpoints");
        }
        graph
    }

    /// B's path contains a parameter plausibly satisfied by a field of
    /// A's response (same name modulo casing)
    fn param_satisfied_by(consumer: &Endpoint, response_fields: &[String]) -> bool {
        consumer
            .path_params()
            .iter()
            .any(|p| response_fields.contains(&p.to_lowercase()))
    }

    /// A POST on a collection path feeds GET/PUT/DELETE on `{path}/{id}`
    fn crud_lifecycle(producer: &Endpoint, consumer: &Endpoint) -> bool {
        if producer.method != "POST" || producer.path.ends_with('}') {
            return false;
        }
        if !matches!(consumer.method.as_str(), "GET" | "PUT" | "DELETE" | "PATCH") {
            return false;
        }
        let Some(rest) = consumer.path.strip_prefix(producer.path.as_str()) else {
            return false;
        };
        // Exactly one trailing path-parameter segment
        rest.starts_with("/{") && rest.ends_with('}') && rest.matches('/').count() == 1
    }

    fn add_edge(graph: &mut DependencyGraph, from: Uuid, to: Uuid) {
        let deps = graph.edges.entry(from).or_default();
        if !deps.contains(&to) {
            deps.push(to);
            graph.reverse_edges.entry(to).or_default().push(from);
        }
    }

    /// DFS-based cycle detection over the adjacency structure
    fn find_cycles(graph: &DependencyGraph) -> Vec<Vec<Uuid>> {
        let mut cycles = Vec::new();
        let mut visited = HashSet::new();

        for &start in &graph.nodes {
            if visited.contains(&start) {
                continue;
            }
            let mut stack = Vec::new();
            let mut on_path = HashSet::new();
            Self::dfs_cycles(graph, start, &mut visited, &mut stack, &mut on_path, &mut cycles);
        }
        cycles
    }

    fn dfs_cycles(
        graph: &DependencyGraph,
        node: Uuid,
        visited: &mut HashSet<Uuid>,
        stack: &mut Vec<Uuid>,
        on_path: &mut HashSet<Uuid>,
        cycles: &mut Vec<Vec<Uuid>>,
    ) {
        visited.insert(node);
        stack.push(node);
        on_path.insert(node);

        for &next in graph.dependents_of(node) {
            if on_path.contains(&next) {
                // Slice of the current path from `next` onward is a cycle
                if let Some(pos) = stack.iter().position(|&n| n == next) {
                    cycles.push(stack[pos..].to_vec());
                }
            } else if !visited.contains(&next) {
                Self::dfs_cycles(graph, next, visited, stack, on_path, cycles);
            }
        }

        stack.pop();
        on_path.remove(&node);
    }
}
