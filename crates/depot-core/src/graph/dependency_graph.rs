//! Forward/reverse adjacency between entities
//!
//! Edge `a -> b` means "a depends on b". `forward[a]` holds `b` exactly when
//! `reverse[b]` holds `a`; every mutation updates both sides together.
//! Nodes need not be registered: an entity may name a dependency that does
//! not exist yet. Forward edges keep the order they were declared in.

use std::collections::{BTreeSet, HashMap, HashSet};

use indexmap::IndexSet;

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    forward: HashMap<String, IndexSet<String>>,
    reverse: HashMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `from -> to`; returns false if the edge already existed
    pub fn add_edge(&mut self, from: &str, to: &str) -> bool {
        let added = self
            .forward
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        self.reverse
            .entry(to.to_string())
            .or_default()
            .insert(from.to_string());
        added
    }

    /// Remove `from -> to`; returns false if there was no such edge
    pub fn remove_edge(&mut self, from: &str, to: &str) -> bool {
        let Some(deps) = self.forward.get_mut(from) else {
            return false;
        };
        let removed = deps.shift_remove(to);
        if deps.is_empty() {
            self.forward.remove(from);
        }
        remove_from(&mut self.reverse, to, from);
        removed
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.forward.get(from).is_some_and(|deps| deps.contains(to))
    }

    /// Replace every outgoing edge of `id` with `deps`
    pub fn set_dependencies<'a, I>(&mut self, id: &str, deps: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        self.remove_outgoing(id);
        for dep in deps {
            self.add_edge(id, dep);
        }
    }

    /// Drop every outgoing edge of `id`
    ///
    /// Incoming edges are kept: entities that still list `id` as a
    /// dependency continue to do so.
    pub fn remove_outgoing(&mut self, id: &str) {
        if let Some(deps) = self.forward.remove(id) {
            for dep in deps {
                remove_from(&mut self.reverse, &dep, id);
            }
        }
    }

    /// Direct dependencies, in declaration order
    pub fn dependencies(&self, id: &str) -> Vec<String> {
        direct(&self.forward, id)
    }

    /// Direct dependents, sorted
    pub fn dependents(&self, id: &str) -> Vec<String> {
        direct(&self.reverse, id)
    }

    /// Every id reachable from `id` along forward edges, excluding `id`
    pub fn dependencies_recursive(&self, id: &str) -> Vec<String> {
        reachable(&self.forward, id)
    }

    /// Every id that reaches `id` along forward edges, excluding `id`
    pub fn dependents_recursive(&self, id: &str) -> Vec<String> {
        reachable(&self.reverse, id)
    }

    /// Whether adding `from -> to` would close a cycle
    pub fn would_create_cycle(&self, from: &str, to: &str) -> bool {
        from == to || self.reaches(to, from)
    }

    /// Whether `to` is reachable from `from` along forward edges
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        let mut stack = vec![from];
        let mut seen: HashSet<&str> = HashSet::new();
        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }
            if let Some(next) = self.forward.get(node) {
                for n in next {
                    if n == to {
                        return true;
                    }
                    stack.push(n);
                }
            }
        }
        false
    }

    /// Every cycle found by a depth-first walk of the whole graph
    ///
    /// Each cycle is reported as a closed path `[a, b, ..., a]`. Start nodes
    /// are visited in sorted order so the result is deterministic.
    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        let mut nodes: Vec<&String> = self.forward.keys().collect();
        nodes.sort();

        let mut visited: HashSet<&str> = HashSet::new();
        let mut cycles = Vec::new();
        for node in nodes {
            if !visited.contains(node.as_str()) {
                let mut path = Vec::new();
                let mut on_path = HashSet::new();
                self.cycle_walk(node, &mut visited, &mut on_path, &mut path, &mut cycles);
            }
        }
        cycles
    }

    fn cycle_walk<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        on_path: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        visited.insert(node);
        on_path.insert(node);
        path.push(node);

        if let Some(next) = self.forward.get(node) {
            for dep in next {
                let dep = dep.as_str();
                if on_path.contains(dep) {
                    if let Some(start) = path.iter().position(|n| *n == dep) {
                        let mut cycle: Vec<String> =
                            path[start..].iter().map(|s| s.to_string()).collect();
                        cycle.push(dep.to_string());
                        cycles.push(cycle);
                    }
                } else if !visited.contains(dep) {
                    self.cycle_walk(dep, visited, on_path, path, cycles);
                }
            }
        }

        path.pop();
        on_path.remove(node);
    }

    /// Ids that have at least one outgoing edge
    pub fn nodes_with_dependencies(&self) -> usize {
        self.forward.values().filter(|d| !d.is_empty()).count()
    }

    pub fn edge_count(&self) -> usize {
        self.forward.values().map(IndexSet::len).sum()
    }

    /// Forward and reverse maps describe the same edge set
    pub fn is_symmetric(&self) -> bool {
        let forward_edges = self
            .forward
            .iter()
            .flat_map(|(from, tos)| tos.iter().map(move |to| (from.as_str(), to.as_str())));
        let reverse_edges = self
            .reverse
            .iter()
            .flat_map(|(to, froms)| froms.iter().map(move |from| (from.as_str(), to.as_str())));
        let f: HashSet<(&str, &str)> = forward_edges.collect();
        let r: HashSet<(&str, &str)> = reverse_edges.collect();
        f == r
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }
}

fn remove_from(map: &mut HashMap<String, BTreeSet<String>>, key: &str, value: &str) -> bool {
    let Some(set) = map.get_mut(key) else {
        return false;
    };
    let removed = set.remove(value);
    if set.is_empty() {
        map.remove(key);
    }
    removed
}

fn direct<'a, S>(map: &'a HashMap<String, S>, id: &str) -> Vec<String>
where
    &'a S: IntoIterator<Item = &'a String>,
{
    map.get(id)
        .map(|set| set.into_iter().cloned().collect())
        .unwrap_or_default()
}

fn reachable<'a, S>(map: &'a HashMap<String, S>, id: &str) -> Vec<String>
where
    &'a S: IntoIterator<Item = &'a String>,
{
    let mut visited: BTreeSet<String> = BTreeSet::new();
    let mut stack: Vec<&str> = vec![id];
    while let Some(node) = stack.pop() {
        if let Some(next) = map.get(node) {
            for n in next {
                if n != id && visited.insert(n.clone()) {
                    stack.push(n);
                }
            }
        }
    }
    visited.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> DependencyGraph {
        // a -> b -> c, a -> d
        let mut g = DependencyGraph::new();
        g.add_edge("a", "b");
        g.add_edge("b", "c");
        g.add_edge("a", "d");
        g
    }

    #[test]
    fn test_edges_are_mirrored() {
        let g = chain();
        assert_eq!(g.dependencies("a"), vec!["b", "d"]);
        assert_eq!(g.dependents("b"), vec!["a"]);
        assert_eq!(g.dependents("c"), vec!["b"]);
        assert!(g.is_symmetric());
    }

    #[test]
    fn test_recursive_lookups() {
        let g = chain();
        assert_eq!(g.dependencies_recursive("a"), vec!["b", "c", "d"]);
        assert_eq!(g.dependents_recursive("c"), vec!["a", "b"]);
        assert!(g.dependencies_recursive("c").is_empty());
    }

    #[test]
    fn test_remove_edge_prunes_both_sides() {
        let mut g = chain();
        assert!(g.remove_edge("a", "d"));
        assert!(!g.remove_edge("a", "d"));
        assert!(g.dependents("d").is_empty());
        assert!(g.is_symmetric());
    }

    #[test]
    fn test_remove_outgoing_keeps_incoming() {
        let mut g = chain();
        g.remove_outgoing("b");

        assert!(g.dependencies("b").is_empty());
        assert!(g.dependents("c").is_empty());
        assert_eq!(g.dependents("b"), vec!["a"]);
        assert!(g.is_symmetric());
    }

    #[test]
    fn test_would_create_cycle() {
        let g = chain();
        assert!(g.would_create_cycle("c", "a"));
        assert!(g.would_create_cycle("a", "a"));
        assert!(!g.would_create_cycle("d", "c"));
    }

    #[test]
    fn test_detect_cycles_reports_closed_paths() {
        let mut g = DependencyGraph::new();
        g.add_edge("a", "b");
        g.add_edge("b", "c");
        g.add_edge("c", "a");
        g.add_edge("x", "y");

        let cycles = g.detect_cycles();
        assert_eq!(cycles, vec![vec!["a", "b", "c", "a"]]);
    }

    #[test]
    fn test_detect_self_loop() {
        let mut g = DependencyGraph::new();
        g.add_edge("s", "s");
        assert_eq!(g.detect_cycles(), vec![vec!["s", "s"]]);
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        assert!(chain().detect_cycles().is_empty());
    }

    #[test]
    fn test_dependencies_keep_declaration_order() {
        let mut g = DependencyGraph::new();
        g.add_edge("e", "z");
        g.add_edge("e", "a");
        g.add_edge("e", "m");
        g.add_edge("e", "z");
        assert_eq!(g.dependencies("e"), vec!["z", "a", "m"]);

        g.remove_edge("e", "a");
        assert_eq!(g.dependencies("e"), vec!["z", "m"]);
        assert_eq!(g.edge_count(), 2);
        assert!(g.is_symmetric());
    }

    #[test]
    fn test_set_dependencies_rewires() {
        let mut g = chain();
        let deps = vec!["c".to_string()];
        g.set_dependencies("a", &deps);

        assert_eq!(g.dependencies("a"), vec!["c"]);
        assert!(g.dependents("d").is_empty());
        assert_eq!(g.dependents("c"), vec!["a", "b"]);
    }
}
