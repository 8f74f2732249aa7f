use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Directed handoff edges between agents for one originating task.
///
/// Kept acyclic: [`HandoffGraph::try_add`] refuses any edge whose target can
/// already reach its source.
#[derive(Debug, Clone, Default)]
pub struct HandoffGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl HandoffGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether adding `from -> to` would close a cycle.
    pub fn would_cycle(&self, from: &str, to: &str) -> bool {
        from == to || self.reaches(to, from)
    }

    /// Add `from -> to` unless it would close a cycle.
    ///
    /// Returns `Ok(true)` if the edge is new, `Ok(false)` if it already
    /// existed, `Err(())` on a cycle.
    #[allow(clippy::result_unit_err)]
    pub fn try_add(&mut self, from: &str, to: &str) -> Result<bool, ()> {
        if self.would_cycle(from, to) {
            return Err(());
        }
        Ok(self
            .edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string()))
    }

    /// Remove `from -> to`. Used to roll back an edge whose dispatch failed.
    pub fn remove(&mut self, from: &str, to: &str) -> bool {
        let Some(targets) = self.edges.get_mut(from) else {
            return false;
        };
        let removed = targets.remove(to);
        if targets.is_empty() {
            self.edges.remove(from);
        }
        removed
    }

    /// Whether `target` is reachable from `start` along existing edges.
    pub fn reaches(&self, start: &str, target: &str) -> bool {
        let mut stack = vec![start];
        let mut seen = BTreeSet::new();
        while let Some(node) = stack.pop() {
            if node == target {
                return true;
            }
            if !seen.insert(node) {
                continue;
            }
            if let Some(next) = self.edges.get(node) {
                stack.extend(next.iter().map(String::as_str));
            }
        }
        false
    }

    /// Full-graph cycle check. Always false for graphs built via `try_add`.
    pub fn has_cycle(&self) -> bool {
        let mut visited = HashMap::new();
        self.edges
            .keys()
            .any(|node| self.dfs_cycle(node, &mut visited))
    }

    fn dfs_cycle<'a>(&'a self, node: &'a str, visited: &mut HashMap<&'a str, u8>) -> bool {
        match visited.get(node) {
            Some(1) => return true,  // back edge
            Some(2) => return false, // done
            _ => {}
        }
        visited.insert(node, 1);
        if let Some(next) = self.edges.get(node) {
            for n in next {
                if self.dfs_cycle(n, visited) {
                    return true;
                }
            }
        }
        visited.insert(node, 2);
        false
    }

    /// All edges as `(from, to)` pairs in name order.
    pub fn edges(&self) -> Vec<(String, String)> {
        self.edges
            .iter()
            .flat_map(|(from, tos)| tos.iter().map(move |to| (from.clone(), to.clone())))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
