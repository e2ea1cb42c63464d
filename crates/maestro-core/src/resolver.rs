//! Initialization-order resolution over the module dependency graph.
//!
//! Uses `petgraph` to model declared dependencies as a directed graph.
//! Topological sort yields an order in which every module appears after all
//! of its dependencies, and detects cycles instead of recursing forever.

use std::collections::HashMap;
use std::sync::Arc;

use maestro_types::error::ResolveError;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use crate::module::Module;

/// Compute a safe initialization order for the given modules.
///
/// Builds a `DiGraph` with module names as nodes and dependency -> dependent
/// edges, then topologically sorts it. Fails with:
/// - [`ResolveError::UnknownDependency`] when a module declares a dependency
///   that is not in the set;
/// - [`ResolveError::CycleDetected`] when the graph has a cycle, naming one
///   involved module.
pub fn resolve_init_order(modules: &[Arc<Module>]) -> Result<Vec<String>, ResolveError> {
    let mut graph = DiGraph::<&str, ()>::new();
    let mut name_to_idx = HashMap::new();
    for module in modules {
        name_to_idx.insert(module.name(), graph.add_node(module.name()));
    }

    for module in modules {
        let to_idx = name_to_idx[module.name()];
        for dep in module.dependencies() {
            let from_idx = name_to_idx.get(dep.as_str()).ok_or_else(|| {
                ResolveError::UnknownDependency {
                    module: module.name().to_string(),
                    dependency: dep.clone(),
                }
            })?;
            graph.add_edge(*from_idx, to_idx, ());
        }
    }

    let sorted = toposort(&graph, None)
        .map_err(|cycle| ResolveError::CycleDetected(graph[cycle.node_id()].to_string()))?;

    Ok(sorted.into_iter().map(|idx| graph[idx].to_string()).collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
