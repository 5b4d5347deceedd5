use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

/// Dependency graph over the nodes of one activity, indexed by declaration position.
#[derive(Debug, Clone)]
pub(crate) struct DependencyGraph {
    /// dependents[x] = nodes that must come after x
    dependents: Vec<BTreeSet<usize>>,
    /// dependencies[x] = nodes that must come before x
    dependencies: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            dependents: vec![BTreeSet::new(); size],
            dependencies: vec![BTreeSet::new(); size],
        }
    }

    /// Records that `before` must be ordered strictly before `after`.
    pub(crate) fn add_edge(&mut self, before: usize, after: usize) {
        self.dependents[before].insert(after);
        self.dependencies[after].insert(before);
    }

    /// Whether `to` can be reached from `from` along one or more edges.
    pub(crate) fn reaches(&self, from: usize, to: usize) -> bool {
        let mut visited = vec![false; self.dependents.len()];
        let mut stack: Vec<usize> = self.dependents[from].iter().copied().collect();
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if !visited[node] {
                visited[node] = true;
                stack.extend(self.dependents[node].iter().copied());
            }
        }
        false
    }

    /// Kahn's algorithm. Among the nodes whose dependencies are all placed, the one
    /// declared first is placed next, so an unchanged graph always yields the same order.
    ///
    /// On a cycle, returns the nodes that could not be placed, ascending.
    pub(crate) fn topological_order(&self) -> Result<Vec<usize>, Vec<usize>> {
        let mut in_degree: Vec<usize> = self.dependencies.iter().map(BTreeSet::len).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, deg)| **deg == 0)
            .map(|(node, _)| Reverse(node))
            .collect();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for &dependent in &self.dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() == in_degree.len() {
            Ok(order)
        } else {
            Err(in_degree
                .iter()
                .enumerate()
                .filter(|(_, deg)| **deg > 0)
                .map(|(node, _)| node)
                .collect())
        }
    }
}
