//! DAG builder for constructing dependency graphs from phase definitions.
//!
//! The builder takes a list of phases with their dependencies and constructs
//! a directed acyclic graph that the resolver and coordinator plan over.
//! Validation uses Kahn's algorithm; when it finds a cycle, a DFS with a
//! recursion stack extracts the concrete cycle for the error.

use crate::errors::{OrchestratorError, Result};
use crate::phase::PhaseDef;
use std::collections::{HashMap, HashSet};

/// Index into the phase list.
pub type PhaseIndex = usize;

/// A validated directed acyclic graph of phases.
#[derive(Debug, Clone)]
pub struct PhaseGraph {
    /// Phases indexed by their position
    phases: Vec<PhaseDef>,
    /// Map from phase id to index
    index_map: HashMap<String, PhaseIndex>,
    /// Forward edges: index -> phases that depend on it
    forward_edges: Vec<Vec<PhaseIndex>>,
    /// Reverse edges: index -> phases it depends on
    reverse_edges: Vec<Vec<PhaseIndex>>,
    /// Transitive prerequisites per phase
    ancestors: Vec<HashSet<PhaseIndex>>,
}

impl PhaseGraph {
    /// Get the number of phases in the graph.
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Get a phase by its index.
    pub fn get_phase(&self, index: PhaseIndex) -> Option<&PhaseDef> {
        self.phases.get(index)
    }

    /// Get a phase by its id.
    pub fn get_phase_by_id(&self, id: &str) -> Option<&PhaseDef> {
        self.index_map.get(id).and_then(|&i| self.phases.get(i))
    }

    /// Get the index for a phase id.
    pub fn get_index(&self, id: &str) -> Option<PhaseIndex> {
        self.index_map.get(id).copied()
    }

    /// Get all phases.
    pub fn phases(&self) -> &[PhaseDef] {
        &self.phases
    }

    /// Get phases that depend on the given phase (forward edges).
    pub fn dependents(&self, index: PhaseIndex) -> &[PhaseIndex] {
        self.forward_edges.get(index).map_or(&[], |v| v.as_slice())
    }

    /// Get phases that the given phase depends on (reverse edges).
    pub fn dependencies(&self, index: PhaseIndex) -> &[PhaseIndex] {
        self.reverse_edges.get(index).map_or(&[], |v| v.as_slice())
    }

    /// Get phases with no dependencies (entry points).
    pub fn root_phases(&self) -> Vec<PhaseIndex> {
        self.reverse_edges
            .iter()
            .enumerate()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(i, _)| i)
            .collect()
    }

    /// Check if all dependencies of a phase are satisfied.
    pub fn dependencies_satisfied(
        &self,
        index: PhaseIndex,
        completed: &HashSet<PhaseIndex>,
    ) -> bool {
        self.dependencies(index)
            .iter()
            .all(|dep| completed.contains(dep))
    }

    /// Whether `ancestor` is a transitive prerequisite of `index`.
    pub fn is_ancestor(&self, ancestor: PhaseIndex, index: PhaseIndex) -> bool {
        self.ancestors
            .get(index)
            .is_some_and(|set| set.contains(&ancestor))
    }

    /// Whether either phase transitively depends on the other.
    pub fn related(&self, a: &str, b: &str) -> bool {
        match (self.get_index(a), self.get_index(b)) {
            (Some(a), Some(b)) => self.is_ancestor(a, b) || self.is_ancestor(b, a),
            _ => false,
        }
    }
}

/// Builder for constructing phase graphs.
pub struct DagBuilder {
    phases: Vec<PhaseDef>,
}

impl DagBuilder {
    /// Create a new builder with the given phases.
    pub fn new(phases: Vec<PhaseDef>) -> Self {
        Self { phases }
    }

    /// Build the phase graph.
    ///
    /// This validates the graph structure:
    /// - Phase ids must be unique
    /// - All dependencies must reference existing phases
    /// - No cycles are allowed
    pub fn build(self) -> Result<PhaseGraph> {
        let mut index_map = HashMap::new();
        for (i, phase) in self.phases.iter().enumerate() {
            if index_map.insert(phase.id.clone(), i).is_some() {
                return Err(OrchestratorError::DuplicatePhase(phase.id.clone()));
            }
        }

        let mut forward_edges: Vec<Vec<PhaseIndex>> = vec![Vec::new(); self.phases.len()];
        let mut reverse_edges: Vec<Vec<PhaseIndex>> = vec![Vec::new(); self.phases.len()];

        for (to_idx, phase) in self.phases.iter().enumerate() {
            for dep in &phase.depends_on {
                let from_idx = *index_map.get(dep).ok_or_else(|| {
                    OrchestratorError::UnknownDependency {
                        phase: phase.id.clone(),
                        dependency: dep.clone(),
                    }
                })?;

                // Repeated entries in depends_on collapse into one edge
                if !reverse_edges[to_idx].contains(&from_idx) {
                    forward_edges[from_idx].push(to_idx);
                    reverse_edges[to_idx].push(from_idx);
                }
            }
        }

        let mut graph = PhaseGraph {
            phases: self.phases,
            index_map,
            forward_edges,
            reverse_edges,
            ancestors: Vec::new(),
        };

        let order = Self::topological_order(&graph)?;
        graph.ancestors = Self::compute_ancestors(&graph, &order);

        Ok(graph)
    }

    /// Kahn's algorithm. On a cycle, fails with the cycle named in order.
    fn topological_order(graph: &PhaseGraph) -> Result<Vec<PhaseIndex>> {
        let mut in_degree: Vec<usize> = graph.reverse_edges.iter().map(|deps| deps.len()).collect();

        let mut queue: Vec<PhaseIndex> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, deg)| *deg == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(graph.len());

        while let Some(node) = queue.pop() {
            order.push(node);

            for &dependent in graph.dependents(node) {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push(dependent);
                }
            }
        }

        if order.len() != graph.len() {
            let remaining: HashSet<PhaseIndex> = in_degree
                .iter()
                .enumerate()
                .filter(|&(_, deg)| *deg > 0)
                .map(|(i, _)| i)
                .collect();
            let cycle = Self::find_cycle(graph, &remaining)
                .into_iter()
                .map(|i| graph.phases[i].id.clone())
                .collect();
            return Err(OrchestratorError::CycleDetected { cycle });
        }

        Ok(order)
    }

    /// DFS with a recursion stack over the nodes Kahn could not drain.
    ///
    /// Returns the cycle as `[a, b, ..., a]` following dependency edges
    /// (each phase is a prerequisite of the next).
    fn find_cycle(graph: &PhaseGraph, remaining: &HashSet<PhaseIndex>) -> Vec<PhaseIndex> {
        let mut visited: HashSet<PhaseIndex> = HashSet::new();
        let mut starts: Vec<PhaseIndex> = remaining.iter().copied().collect();
        starts.sort_unstable();

        for start in starts {
            if visited.contains(&start) {
                continue;
            }
            // Iterative DFS: stack of (node, next child position)
            let mut stack: Vec<(PhaseIndex, usize)> = vec![(start, 0)];
            let mut on_stack: Vec<PhaseIndex> = vec![start];
            visited.insert(start);

            while let Some(top) = stack.last_mut() {
                let children = graph.dependents(top.0);
                if top.1 < children.len() {
                    let child = children[top.1];
                    top.1 += 1;
                    if !remaining.contains(&child) {
                        continue;
                    }
                    if let Some(at) = on_stack.iter().position(|&n| n == child) {
                        let mut cycle = on_stack[at..].to_vec();
                        cycle.push(child);
                        return cycle;
                    }
                    if visited.insert(child) {
                        stack.push((child, 0));
                        on_stack.push(child);
                    }
                } else {
                    stack.pop();
                    on_stack.pop();
                }
            }
        }

        // Kahn left nodes behind, so one of the searches above finds a back edge
        remaining.iter().copied().take(1).collect()
    }

    fn compute_ancestors(graph: &PhaseGraph, order: &[PhaseIndex]) -> Vec<HashSet<PhaseIndex>> {
        let mut ancestors: Vec<HashSet<PhaseIndex>> = vec![HashSet::new(); graph.len()];
        for &node in order {
            let mut set = HashSet::new();
            for &dep in graph.dependencies(node) {
                set.insert(dep);
                set.extend(ancestors[dep].iter().copied());
            }
            ancestors[node] = set;
        }
        ancestors
    }
}
