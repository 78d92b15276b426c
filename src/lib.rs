//! Flow-graph compiler for production line planner solutions
//!
//! Turns a flat optimizer solution (active recipes with scale factors, raw
//! resource totals and requested outputs) into a directed material-flow graph,
//! plus the relative gauges and resource bars the planner UI draws.

pub mod adapters;
pub mod allocation;
pub mod catalog;
pub mod db;
pub mod flow_graph;
pub mod models;
pub mod net_output;
pub mod recompute;
pub mod resource_usage;
pub mod throughput;
pub mod view;

pub use catalog::{RawResourceMeta, ResourceCatalog};
pub use flow_graph::{
    BuildOptions, FlowEdge, FlowGraph, FlowGraphBuilder, FlowNode, NodeKey, RawBypass, Warning,
};
pub use models::{
    ActiveRecipe, CycleDuration, ItemAmount, ItemId, ProductionLineSolution, RecipeDefinition,
    RecipeId,
};
pub use throughput::{GroupGauge, GroupSelection, RecipeGroup};

/// Errors that abort a computation. Recoverable issues are reported as
/// [`Warning`]s on the graph instead.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("solution has no production_line map")]
    MissingProductionLine,

    #[error("invalid cycle duration {0:?}: must be a positive number of seconds")]
    InvalidCycleDuration(String),

    #[error("invalid colour {0:?}: expected #rrggbb")]
    InvalidColor(String),

    #[error(transparent)]
    Regex(#[from] regex::Error),

    #[error("malformed solution JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, PlannerError>;
