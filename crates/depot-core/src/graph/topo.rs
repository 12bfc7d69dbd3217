//! Dependency ordering for batches

use std::collections::HashMap;

use crate::errors::{DepotError, Result};

/// Anything that has an id and names the ids it depends on
pub trait Dependent {
    fn dependent_id(&self) -> &str;
    fn dependency_ids(&self) -> &[String];
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

/// Order items so every dependency precedes its dependents
///
/// Depth-first with three-state marking. Dependencies that are not in
/// `items` are ignored. Ties keep input order. If two items share an id, the
/// first one is the one others depend on.
///
/// # Errors
///
/// Returns `CycleDetected` naming the first entity found on a cycle; no
/// partial order is returned.
pub fn sort_by_dependencies<T: Dependent>(items: Vec<T>) -> Result<Vec<T>> {
    let mut position: HashMap<&str, usize> = HashMap::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        position.entry(item.dependent_id()).or_insert(i);
    }

    let mut marks = vec![Mark::Unvisited; items.len()];
    let mut order: Vec<usize> = Vec::with_capacity(items.len());
    for start in 0..items.len() {
        visit(start, &items, &position, &mut marks, &mut order)?;
    }
    drop(position);

    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|i| slots.get_mut(i).and_then(Option::take))
        .collect())
}

fn visit<T: Dependent>(
    index: usize,
    items: &[T],
    position: &HashMap<&str, usize>,
    marks: &mut [Mark],
    order: &mut Vec<usize>,
) -> Result<()> {
    match marks[index] {
        Mark::Visited => return Ok(()),
        Mark::Visiting => {
            return Err(DepotError::CycleDetected {
                entity_id: items[index].dependent_id().to_string(),
            })
        }
        Mark::Unvisited => {}
    }

    marks[index] = Mark::Visiting;
    for dep in items[index].dependency_ids() {
        if let Some(&dep_index) = position.get(dep.as_str()) {
            visit(dep_index, items, position, marks, order)?;
        }
    }
    marks[index] = Mark::Visited;
    order.push(index);
    Ok(())
}

/// Safe removal order: dependents before their dependencies
///
/// # Errors
///
/// Returns `CycleDetected` if the items contain a cycle.
pub fn teardown_order<T: Dependent>(items: Vec<T>) -> Result<Vec<T>> {
    let mut sorted = sort_by_dependencies(items)?;
    sorted.reverse();
    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Node(String, Vec<String>);

    impl Dependent for Node {
        fn dependent_id(&self) -> &str {
            &self.0
        }
        fn dependency_ids(&self) -> &[String] {
            &self.1
        }
    }

    fn node(id: &str, deps: &[&str]) -> Node {
        Node(id.to_string(), deps.iter().map(|d| d.to_string()).collect())
    }

    fn ids(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|n| n.0.as_str()).collect()
    }

    #[test]
    fn test_dependencies_come_first() {
        let sorted =
            sort_by_dependencies(vec![node("app", &["db", "cache"]), node("cache", &["db"]), node("db", &[])])
                .unwrap();
        assert_eq!(ids(&sorted), vec!["db", "cache", "app"]);
    }

    #[test]
    fn test_outside_dependencies_ignored() {
        let sorted = sort_by_dependencies(vec![node("a", &["external"]), node("b", &["a"])]).unwrap();
        assert_eq!(ids(&sorted), vec!["a", "b"]);
    }

    #[test]
    fn test_cycle_is_an_error() {
        let result = sort_by_dependencies(vec![node("A", &["B"]), node("B", &["A"])]);
        assert!(matches!(result, Err(DepotError::CycleDetected { .. })));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let result = sort_by_dependencies(vec![node("A", &["A"])]);
        assert!(matches!(
            result,
            Err(DepotError::CycleDetected { entity_id }) if entity_id == "A"
        ));
    }

    #[test]
    fn test_teardown_is_reverse() {
        let sorted = teardown_order(vec![node("b", &["a"]), node("a", &[])]).unwrap();
        assert_eq!(ids(&sorted), vec!["b", "a"]);
    }

    #[test]
    fn test_independent_items_keep_input_order() {
        let sorted = sort_by_dependencies(vec![node("z", &[]), node("y", &[]), node("x", &[])]).unwrap();
        assert_eq!(ids(&sorted), vec!["z", "y", "x"]);
    }
}
