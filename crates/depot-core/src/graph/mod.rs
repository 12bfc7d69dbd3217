pub mod dependency_graph;
pub mod topo;

pub use dependency_graph::DependencyGraph;
pub use topo::{sort_by_dependencies, teardown_order, Dependent};
