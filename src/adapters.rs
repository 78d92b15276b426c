//! Renderer-facing shapes derived from a [`FlowGraph`]

use serde::Serialize;

use crate::flow_graph::FlowGraph;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SankeyNode {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SankeyLink {
    pub source: String,
    pub target: String,
    pub value: f64,
}

/// Input for a Sankey layout; nodes are named `"<kind>:<id>"`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SankeyInput {
    pub nodes: Vec<SankeyNode>,
    pub links: Vec<SankeyLink>,
}

impl SankeyInput {
    pub fn from_graph(graph: &FlowGraph) -> Self {
        Self {
            nodes: graph
                .nodes
                .iter()
                .map(|n| SankeyNode {
                    name: n.key().to_string(),
                })
                .collect(),
            links: graph
                .edges
                .iter()
                .map(|e| SankeyLink {
                    source: e.source.to_string(),
                    target: e.target.to_string(),
                    value: round3(e.quantity),
                })
                .collect(),
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow_graph::FlowGraphBuilder;
    use crate::models::{CycleDuration, ProductionLineSolution, RecipeDefinition};

    #[test]
    fn names_nodes_by_kind_and_id() {
        let solution = ProductionLineSolution::default()
            .with_recipe(
                RecipeDefinition::new(10, "Ingot", CycleDuration::new(3.0).unwrap())
                    .ingredient(155, 1.0)
                    .product(10, 1.0),
                1.0 / 3.0,
            )
            .with_raw(155, 6.667)
            .with_target(10, 6.667);

        let graph = FlowGraphBuilder::default().build(&solution);
        let sankey = SankeyInput::from_graph(&graph);

        let names: Vec<_> = sankey.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["raw:155", "product:10", "recipe:10"]);
        assert_eq!(
            sankey.links[0],
            SankeyLink {
                source: "raw:155".to_string(),
                target: "recipe:10".to_string(),
                value: 6.667,
            }
        );
        assert_eq!(sankey.links[1].target, "product:10");
    }
}
