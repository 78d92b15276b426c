//! Graph output guarded by input availability

use serde::Serialize;

use crate::catalog::ResourceCatalog;
use crate::flow_graph::{BuildOptions, FlowGraph, FlowGraphBuilder};
use crate::models::ProductionLineSolution;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowGraphView {
    pub graph: FlowGraph,
    /// True while an input is still missing; do not render until false
    pub processing: bool,
}

/// Build the graph once both the solution and the catalog are available.
/// Until then the view is empty and `processing` stays set.
pub fn prepare_view(
    solution: Option<&ProductionLineSolution>,
    catalog: Option<&ResourceCatalog>,
    options: BuildOptions,
) -> FlowGraphView {
    match (solution, catalog) {
        (Some(solution), Some(catalog)) if !solution.is_empty() => FlowGraphView {
            graph: FlowGraphBuilder::new(options)
                .with_catalog(catalog)
                .build(solution),
            processing: false,
        },
        _ => FlowGraphView {
            graph: FlowGraph::default(),
            processing: true,
        },
    }
}
