//! Flow-graph compiler
//!
//! Builds the node/edge material-flow graph that every visualization draws
//! from. The graph is recomputed from scratch for each solution and never
//! edited in place.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, warn};

use crate::allocation::allocate;
use crate::catalog::ResourceCatalog;
use crate::models::{ItemId, ProductionLineSolution, RecipeId};
use crate::net_output::{self, NetOutputOptions, OutputClass};

/// Node identity. Item and recipe ids may be numerically equal, so the kind
/// is always part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "kebab-case")]
pub enum NodeKey {
    Raw(ItemId),
    Recipe(RecipeId),
    TargetOutput(ItemId),
    ByProduct(ItemId),
}

impl NodeKey {
    pub fn kind(&self) -> &'static str {
        match self {
            NodeKey::Raw(_) => "raw",
            NodeKey::Recipe(_) => "recipe",
            NodeKey::TargetOutput(_) => "product",
            NodeKey::ByProduct(_) => "by-product",
        }
    }

    pub fn id(&self) -> u32 {
        match self {
            NodeKey::Raw(item) | NodeKey::TargetOutput(item) | NodeKey::ByProduct(item) => item.0,
            NodeKey::Recipe(recipe) => recipe.0,
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FlowNode {
    Raw {
        item: ItemId,
        /// Units per minute drawn from the environment
        quantity: f64,
        name: String,
        global_limit: Option<f64>,
        gradient: Option<[String; 3]>,
    },
    Recipe {
        recipe: RecipeId,
        scale: f64,
        name: String,
        building: Option<String>,
    },
    TargetOutput {
        item: ItemId,
        /// Requested units per minute
        amount: f64,
        name: String,
    },
    ByProduct {
        item: ItemId,
        /// Units per minute left over across all producers
        quantity: f64,
        name: String,
        gradient: Option<[String; 3]>,
    },
}

impl FlowNode {
    pub fn key(&self) -> NodeKey {
        match self {
            FlowNode::Raw { item, .. } => NodeKey::Raw(*item),
            FlowNode::Recipe { recipe, .. } => NodeKey::Recipe(*recipe),
            FlowNode::TargetOutput { item, .. } => NodeKey::TargetOutput(*item),
            FlowNode::ByProduct { item, .. } => NodeKey::ByProduct(*item),
        }
    }

    /// Scale for recipe nodes, quantity per minute for item nodes
    pub fn rate(&self) -> f64 {
        match self {
            FlowNode::Raw { quantity, .. } | FlowNode::ByProduct { quantity, .. } => *quantity,
            FlowNode::Recipe { scale, .. } => *scale,
            FlowNode::TargetOutput { amount, .. } => *amount,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FlowNode::Raw { name, .. }
            | FlowNode::Recipe { name, .. }
            | FlowNode::TargetOutput { name, .. }
            | FlowNode::ByProduct { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowEdge {
    pub source: NodeKey,
    pub target: NodeKey,
    pub item: ItemId,
    /// Units per minute, finite and non-negative
    pub quantity: f64,
}

/// Non-fatal problems found while building a graph
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Warning {
    MissingProducer {
        consumer: RecipeId,
        item: ItemId,
        required: f64,
    },
    ZeroGrossProduction {
        consumer: RecipeId,
        item: ItemId,
        producers: Vec<RecipeId>,
    },
    InvalidCycleDuration {
        recipe: RecipeId,
        duration: String,
    },
    NegativeLeftover {
        producer: RecipeId,
        item: ItemId,
        produced: f64,
        consumed: f64,
    },
    InvalidScale {
        recipe: RecipeId,
        scale: f64,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingProducer {
                consumer,
                item,
                required,
            } => write!(
                f,
                "{consumer} needs {required:.3}/min of {item} but nothing supplies it"
            ),
            Warning::ZeroGrossProduction {
                consumer,
                item,
                producers,
            } => write!(
                f,
                "{consumer} needs {item}; its {} producer(s) report zero output",
                producers.len()
            ),
            Warning::InvalidCycleDuration { recipe, duration } => {
                write!(f, "{recipe} has unusable cycle duration {duration:?}; treated as idle")
            }
            Warning::NegativeLeftover {
                producer,
                item,
                produced,
                consumed,
            } => write!(
                f,
                "{producer} makes {produced:.3}/min of {item} but {consumed:.3}/min is drawn from it"
            ),
            Warning::InvalidScale { recipe, scale } => {
                write!(f, "{recipe} has unusable scale {scale}; treated as idle")
            }
        }
    }
}

/// How a consumer's need for an item that is both raw-available and made
/// in-line is satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RawBypass {
    /// Drawn entirely from the raw node; in-line producers are not split for it
    #[default]
    Exclusive,
    /// Split among in-line producers and drawn in full from the raw node too
    Additive,
}

impl FromStr for RawBypass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exclusive" => Ok(RawBypass::Exclusive),
            "additive" => Ok(RawBypass::Additive),
            other => Err(format!("unknown raw bypass policy '{other}' (exclusive|additive)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildOptions {
    pub leftover_threshold: f64,
    pub conservation_tolerance: f64,
    pub raw_bypass: RawBypass,
}

impl Default for BuildOptions {
    fn default() -> Self {
        let net = NetOutputOptions::default();
        Self {
            leftover_threshold: net.leftover_threshold,
            conservation_tolerance: net.conservation_tolerance,
            raw_bypass: RawBypass::default(),
        }
    }
}

impl BuildOptions {
    fn net_output(&self) -> NetOutputOptions {
        NetOutputOptions {
            leftover_threshold: self.leftover_threshold,
            conservation_tolerance: self.conservation_tolerance,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
    pub warnings: Vec<Warning>,
}

impl FlowGraph {
    pub fn node(&self, key: NodeKey) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.key() == key)
    }

    pub fn node_keys(&self) -> HashSet<NodeKey> {
        self.nodes.iter().map(FlowNode::key).collect()
    }

    pub fn edges_from(&self, key: NodeKey) -> impl Iterator<Item = &FlowEdge> {
        self.edges.iter().filter(move |e| e.source == key)
    }

    pub fn edges_into(&self, key: NodeKey) -> impl Iterator<Item = &FlowEdge> {
        self.edges.iter().filter(move |e| e.target == key)
    }

    /// Edge quantity by (source, target, item); compare graphs through this
    /// rather than edge order
    pub fn edge_quantities(&self) -> HashMap<(NodeKey, NodeKey, ItemId), f64> {
        self.edges
            .iter()
            .map(|e| ((e.source, e.target, e.item), e.quantity))
            .collect()
    }

    pub fn edge(&self, source: NodeKey, target: NodeKey, item: ItemId) -> Option<&FlowEdge> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target && e.item == item)
    }

    /// Total quantity of `item` leaving `key`
    pub fn outflow(&self, key: NodeKey, item: ItemId) -> f64 {
        self.edges_from(key)
            .filter(|e| e.item == item)
            .map(|e| e.quantity)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Compiles a [`ProductionLineSolution`] into a [`FlowGraph`]
#[derive(Debug, Clone, Default)]
pub struct FlowGraphBuilder<'a> {
    options: BuildOptions,
    catalog: Option<&'a ResourceCatalog>,
}

impl<'a> FlowGraphBuilder<'a> {
    pub fn new(options: BuildOptions) -> Self {
        Self {
            options,
            catalog: None,
        }
    }

    pub fn with_catalog(mut self, catalog: &'a ResourceCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn build(&self, solution: &ProductionLineSolution) -> FlowGraph {
        let mut acc = Accumulator::default();

        let raw_items: HashSet<ItemId> = solution.raw_usage().iter().map(|r| r.item).collect();
        let target_items: HashSet<ItemId> = solution.targets().iter().map(|t| t.item).collect();

        for raw in solution.raw_usage() {
            let meta = self.catalog.and_then(|c| c.get(raw.item));
            acc.add_node(FlowNode::Raw {
                item: raw.item,
                quantity: raw.total_quantity,
                name: self.item_name(solution, raw.item),
                global_limit: meta.map(|m| m.global_limit),
                gradient: meta.map(|m| m.gradient.clone()),
            });
        }

        for target in solution.targets() {
            acc.add_node(FlowNode::TargetOutput {
                item: target.item,
                amount: target.amount,
                name: self.item_name(solution, target.item),
            });
        }

        for active in solution.recipes() {
            acc.add_node(FlowNode::Recipe {
                recipe: active.id(),
                scale: active.scale,
                name: active.recipe.display_name.clone(),
                building: active.recipe.building.clone(),
            });
            if !usable_scale(active.scale) {
                acc.warn(Warning::InvalidScale {
                    recipe: active.id(),
                    scale: active.scale,
                });
            }
        }

        for rejected in solution.rejected_recipes() {
            acc.add_node(FlowNode::Recipe {
                recipe: rejected.id,
                scale: rejected.scale,
                name: rejected.display_name.clone(),
                building: rejected.building.clone(),
            });
            acc.warn(Warning::InvalidCycleDuration {
                recipe: rejected.id,
                duration: rejected.duration.clone(),
            });
        }

        // Consumption: every ingredient of every recipe, drawn from in-line
        // producers and/or the raw pool
        for consumer in solution.recipes().filter(|r| usable_scale(r.scale)) {
            for ingredient in &consumer.recipe.ingredients {
                let item = ingredient.item;
                let required = consumer.per_minute(ingredient.amount);
                if !required.is_finite() || required <= 0.0 {
                    continue;
                }

                let is_raw = raw_items.contains(&item);
                let producers: Vec<(RecipeId, f64)> = solution
                    .recipes()
                    .filter(|p| p.recipe.produces(item))
                    .map(|p| (p.id(), p.gross_output(item)))
                    .collect();

                let draw_in_line = !is_raw || self.options.raw_bypass == RawBypass::Additive;
                if draw_in_line && !producers.is_empty() {
                    let allocations = allocate(required, &producers);
                    if allocations.is_empty() && !is_raw {
                        acc.warn_unsupplied(Warning::ZeroGrossProduction {
                            consumer: consumer.id(),
                            item,
                            producers: producers.iter().map(|(id, _)| *id).collect(),
                        });
                    }
                    for allocation in allocations {
                        acc.add_edge(
                            NodeKey::Recipe(allocation.producer),
                            NodeKey::Recipe(consumer.id()),
                            item,
                            allocation.rate,
                        );
                        *acc.consumed.entry((allocation.producer, item)).or_default() +=
                            allocation.rate;
                    }
                }

                if is_raw {
                    acc.add_edge(NodeKey::Raw(item), NodeKey::Recipe(consumer.id()), item, required);
                } else if producers.is_empty() {
                    acc.warn_unsupplied(Warning::MissingProducer {
                        consumer: consumer.id(),
                        item,
                        required,
                    });
                }
            }
        }

        // Net output: whatever each recipe makes beyond what was drawn from it
        let net_options = self.options.net_output();
        for producer in solution.recipes().filter(|r| usable_scale(r.scale)) {
            let mut seen = HashSet::new();
            for product in &producer.recipe.products {
                let item = product.item;
                if !seen.insert(item) {
                    continue;
                }

                let gross = producer.gross_output(item);
                let consumed = acc
                    .consumed
                    .get(&(producer.id(), item))
                    .copied()
                    .unwrap_or_default();
                let net = net_output::resolve(gross, consumed, target_items.contains(&item), &net_options);

                if net.overdrawn.is_some() {
                    acc.warn(Warning::NegativeLeftover {
                        producer: producer.id(),
                        item,
                        produced: gross,
                        consumed,
                    });
                }

                let source = NodeKey::Recipe(producer.id());
                match net.class {
                    OutputClass::TargetOutput => {
                        acc.add_edge(source, NodeKey::TargetOutput(item), item, net.leftover);
                    }
                    OutputClass::ByProduct => {
                        let key = NodeKey::ByProduct(item);
                        if !acc.index.contains_key(&key) {
                            let meta = self.catalog.and_then(|c| c.get(item));
                            acc.add_node(FlowNode::ByProduct {
                                item,
                                quantity: 0.0,
                                name: self.item_name(solution, item),
                                gradient: meta.map(|m| m.gradient.clone()),
                            });
                        }
                        if let Some(FlowNode::ByProduct { quantity, .. }) = acc.node_mut(key) {
                            *quantity += net.leftover;
                        }
                        acc.add_edge(source, key, item, net.leftover);
                    }
                    OutputClass::FullyConsumed => {}
                }
            }
        }

        let graph = acc.finish();
        debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            warnings = graph.warnings.len(),
            "built flow graph"
        );
        graph
    }

    fn item_name(&self, solution: &ProductionLineSolution, item: ItemId) -> String {
        self.catalog
            .and_then(|c| c.get(item))
            .map(|m| m.display_name.clone())
            .or_else(|| solution.item_name(item).map(str::to_string))
            .unwrap_or_else(|| format!("Item {}", item.0))
    }
}

/// Negative or non-finite scales are reported and treated as idle
fn usable_scale(scale: f64) -> bool {
    scale.is_finite() && scale >= 0.0
}

#[derive(Default)]
struct Accumulator {
    nodes: Vec<FlowNode>,
    index: HashMap<NodeKey, usize>,
    edges: Vec<FlowEdge>,
    edge_index: HashMap<(NodeKey, NodeKey, ItemId), usize>,
    warnings: Vec<Warning>,
    /// Unsupplied (consumer, item) pairs, pointing into `warnings`
    unsupplied: HashMap<(RecipeId, ItemId), usize>,
    consumed: HashMap<(RecipeId, ItemId), f64>,
}

impl Accumulator {
    fn add_node(&mut self, node: FlowNode) {
        let key = node.key();
        if !self.index.contains_key(&key) {
            self.index.insert(key, self.nodes.len());
            self.nodes.push(node);
        }
    }

    fn node_mut(&mut self, key: NodeKey) -> Option<&mut FlowNode> {
        let idx = *self.index.get(&key)?;
        self.nodes.get_mut(idx)
    }

    /// Parallel edges for the same item are merged
    fn add_edge(&mut self, source: NodeKey, target: NodeKey, item: ItemId, quantity: f64) {
        if !quantity.is_finite() || quantity <= 0.0 {
            return;
        }
        match self.edge_index.get(&(source, target, item)) {
            Some(&idx) => self.edges[idx].quantity += quantity,
            None => {
                self.edge_index
                    .insert((source, target, item), self.edges.len());
                self.edges.push(FlowEdge {
                    source,
                    target,
                    item,
                    quantity,
                });
            }
        }
    }

    fn warn(&mut self, warning: Warning) {
        warn!(%warning, "flow graph");
        self.warnings.push(warning);
    }

    /// One warning per (consumer, item); repeated ingredient entries add
    /// their requirement to the first
    fn warn_unsupplied(&mut self, warning: Warning) {
        let pair = match &warning {
            Warning::MissingProducer { consumer, item, .. }
            | Warning::ZeroGrossProduction { consumer, item, .. } => Some((*consumer, *item)),
            _ => None,
        };
        let Some(pair) = pair else {
            return self.warn(warning);
        };
        match self.unsupplied.get(&pair) {
            Some(&idx) => {
                if let (
                    Some(Warning::MissingProducer { required, .. }),
                    Warning::MissingProducer { required: more, .. },
                ) = (self.warnings.get_mut(idx), &warning)
                {
                    *required += more;
                }
            }
            None => {
                self.unsupplied.insert(pair, self.warnings.len());
                self.warn(warning);
            }
        }
    }

    fn finish(self) -> FlowGraph {
        FlowGraph {
            nodes: self.nodes,
            edges: self.edges,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CycleDuration, RecipeDefinition};

    fn per_minute() -> CycleDuration {
        CycleDuration::new(60.0).unwrap()
    }

    fn build(solution: &ProductionLineSolution) -> FlowGraph {
        FlowGraphBuilder::default().build(solution)
    }

    fn qty(graph: &FlowGraph, source: NodeKey, target: NodeKey, item: u32) -> f64 {
        graph
            .edge(source, target, ItemId(item))
            .map(|e| e.quantity)
            .unwrap_or_else(|| panic!("no edge {source} -> {target} for item {item}"))
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn single_recipe_from_raw_to_target() {
        let solution = ProductionLineSolution::default()
            .with_recipe(
                RecipeDefinition::new(1, "Iron Ingot", per_minute())
                    .ingredient(155, 30.0)
                    .product(10, 30.0),
                1.0,
            )
            .with_raw(155, 30.0)
            .with_target(10, 30.0);

        let graph = build(&solution);

        assert!(close(
            qty(&graph, NodeKey::Raw(ItemId(155)), NodeKey::Recipe(RecipeId(1)), 155),
            30.0
        ));
        assert!(close(
            qty(&graph, NodeKey::Recipe(RecipeId(1)), NodeKey::TargetOutput(ItemId(10)), 10),
            30.0
        ));
        assert_eq!(graph.edges.len(), 2);
        assert!(!graph.nodes.iter().any(|n| matches!(n, FlowNode::ByProduct { .. })));
        assert!(graph.warnings.is_empty());
    }

    #[test]
    fn demand_split_across_producers() {
        let solution = ProductionLineSolution::default()
            .with_recipe(RecipeDefinition::new(1, "P1", per_minute()).product(50, 40.0), 1.0)
            .with_recipe(RecipeDefinition::new(2, "P2", per_minute()).product(50, 10.0), 1.0)
            .with_recipe(RecipeDefinition::new(3, "C", per_minute()).ingredient(50, 25.0), 1.0);

        let graph = build(&solution);
        let consumer = NodeKey::Recipe(RecipeId(3));

        assert!(close(qty(&graph, NodeKey::Recipe(RecipeId(1)), consumer, 50), 20.0));
        assert!(close(qty(&graph, NodeKey::Recipe(RecipeId(2)), consumer, 50), 5.0));

        // remaining output of both producers lands on one shared by-product node
        let by_product = graph.node(NodeKey::ByProduct(ItemId(50))).unwrap();
        assert!(close(by_product.rate(), 25.0));
        assert_eq!(graph.edges_into(NodeKey::ByProduct(ItemId(50))).count(), 2);
    }

    #[test]
    fn unconsumed_output_becomes_by_product() {
        let solution = ProductionLineSolution::default()
            .with_recipe(RecipeDefinition::new(1, "Maker", per_minute()).product(20, 100.0), 1.0)
            .with_recipe(RecipeDefinition::new(2, "User", per_minute()).ingredient(20, 60.0), 1.0);

        let graph = build(&solution);

        assert!(close(
            qty(&graph, NodeKey::Recipe(RecipeId(1)), NodeKey::Recipe(RecipeId(2)), 20),
            60.0
        ));
        assert!(close(
            qty(&graph, NodeKey::Recipe(RecipeId(1)), NodeKey::ByProduct(ItemId(20)), 20),
            40.0
        ));
    }

    #[test]
    fn missing_producer_is_a_warning_not_a_failure() {
        let solution = ProductionLineSolution::default()
            .with_recipe(
                RecipeDefinition::new(1, "Assembler", per_minute())
                    .ingredient(155, 10.0)
                    .ingredient(99, 5.0)
                    .product(10, 1.0),
                2.0,
            )
            .with_raw(155, 20.0)
            .with_target(10, 2.0);

        let graph = build(&solution);

        assert_eq!(
            graph.warnings,
            vec![Warning::MissingProducer {
                consumer: RecipeId(1),
                item: ItemId(99),
                required: 10.0,
            }]
        );
        assert!(!graph.edges.iter().any(|e| e.item == ItemId(99)));
        assert!(close(
            qty(&graph, NodeKey::Raw(ItemId(155)), NodeKey::Recipe(RecipeId(1)), 155),
            20.0
        ));
        assert!(close(
            qty(&graph, NodeKey::Recipe(RecipeId(1)), NodeKey::TargetOutput(ItemId(10)), 10),
            2.0
        ));
    }

    fn bypass_solution() -> ProductionLineSolution {
        // item 157 is both pumped raw and produced as a side output
        ProductionLineSolution::default()
            .with_recipe(
                RecipeDefinition::new(1, "Refinery", per_minute())
                    .product(30, 10.0)
                    .product(157, 20.0),
                1.0,
            )
            .with_recipe(
                RecipeDefinition::new(2, "Washer", per_minute())
                    .ingredient(157, 50.0)
                    .product(31, 5.0),
                1.0,
            )
            .with_raw(157, 50.0)
            .with_target(30, 10.0)
            .with_target(31, 5.0)
    }

    #[test]
    fn raw_available_items_bypass_in_line_producers() {
        let graph = build(&bypass_solution());

        let washer = NodeKey::Recipe(RecipeId(2));
        assert!(close(qty(&graph, NodeKey::Raw(ItemId(157)), washer, 157), 50.0));
        assert!(graph.edge(NodeKey::Recipe(RecipeId(1)), washer, ItemId(157)).is_none());

        // the refinery's water is untouched, so it is all left over
        assert!(close(
            qty(&graph, NodeKey::Recipe(RecipeId(1)), NodeKey::ByProduct(ItemId(157)), 157),
            20.0
        ));
    }

    #[test]
    fn additive_bypass_splits_and_draws_raw() {
        let options = BuildOptions {
            raw_bypass: RawBypass::Additive,
            ..BuildOptions::default()
        };
        let graph = FlowGraphBuilder::new(options).build(&bypass_solution());

        let washer = NodeKey::Recipe(RecipeId(2));
        assert!(close(qty(&graph, NodeKey::Raw(ItemId(157)), washer, 157), 50.0));
        assert!(close(qty(&graph, NodeKey::Recipe(RecipeId(1)), washer, 157), 50.0));
        // 20 produced, 50 allocated: overdraw reported, no negative edge
        assert!(graph
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::NegativeLeftover { producer: RecipeId(1), .. })));
        assert!(graph.edges.iter().all(|e| e.quantity >= 0.0));
        assert!(graph.node(NodeKey::ByProduct(ItemId(157))).is_none());
    }

    #[test]
    fn colliding_item_and_recipe_ids_stay_distinct() {
        let solution = ProductionLineSolution::default()
            .with_recipe(
                RecipeDefinition::new(5, "Five", per_minute())
                    .ingredient(5, 1.0)
                    .product(6, 1.0),
                1.0,
            )
            .with_raw(5, 1.0)
            .with_target(6, 1.0);

        let graph = build(&solution);
        let keys = graph.node_keys();

        assert!(keys.contains(&NodeKey::Raw(ItemId(5))));
        assert!(keys.contains(&NodeKey::Recipe(RecipeId(5))));
        assert_eq!(graph.nodes.len(), 3);
        assert!(graph
            .edge(NodeKey::Raw(ItemId(5)), NodeKey::Recipe(RecipeId(5)), ItemId(5))
            .is_some());
    }

    #[test]
    fn leftover_is_resolved_per_recipe_and_item() {
        // recipe 1 sends item 40 to the target while its item 41 is fully
        // consumed by recipe 3
        let solution = ProductionLineSolution::default()
            .with_recipe(
                RecipeDefinition::new(1, "A", per_minute())
                    .product(40, 10.0)
                    .product(41, 10.0),
                1.0,
            )
            .with_recipe(RecipeDefinition::new(2, "B", per_minute()).product(40, 10.0), 1.0)
            .with_recipe(RecipeDefinition::new(3, "C", per_minute()).ingredient(41, 10.0), 1.0)
            .with_target(40, 20.0);

        let graph = build(&solution);
        let target = NodeKey::TargetOutput(ItemId(40));

        assert!(close(qty(&graph, NodeKey::Recipe(RecipeId(1)), target, 40), 10.0));
        assert!(close(qty(&graph, NodeKey::Recipe(RecipeId(2)), target, 40), 10.0));
        assert!(graph
            .edge(NodeKey::Recipe(RecipeId(1)), NodeKey::ByProduct(ItemId(41)), ItemId(41))
            .is_none());
    }

    #[test]
    fn rejected_recipe_keeps_a_node_and_warns() {
        let json = r#"{
            "production_line": {
                "3": {"recipe_data": {"id": 3, "display_name": "Odd", "manufactoring_duration": "n/a",
                      "products": [{"id": 70, "amount": 1}]}, "scale": 2.0},
                "4": {"recipe_data": {"id": 4, "display_name": "User", "manufactoring_duration": "60",
                      "ingredients": [{"id": 70, "amount": 1}]}, "scale": 1.0}
            },
            "raw_resource_usage": [],
            "target_output": []
        }"#;
        let solution = ProductionLineSolution::from_json_str(json).unwrap();
        let graph = build(&solution);

        assert!(graph.node(NodeKey::Recipe(RecipeId(3))).is_some());
        assert!(graph
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::InvalidCycleDuration { recipe: RecipeId(3), .. })));
        assert!(graph
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::MissingProducer { consumer: RecipeId(4), .. })));
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn idle_producer_reports_zero_gross() {
        let solution = ProductionLineSolution::default()
            .with_recipe(RecipeDefinition::new(1, "Idle", per_minute()).product(8, 5.0), 0.0)
            .with_recipe(RecipeDefinition::new(2, "User", per_minute()).ingredient(8, 5.0), 1.0);

        let graph = build(&solution);

        assert_eq!(
            graph.warnings,
            vec![Warning::ZeroGrossProduction {
                consumer: RecipeId(2),
                item: ItemId(8),
                producers: vec![RecipeId(1)],
            }]
        );
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn repeated_missing_ingredient_warns_once() {
        let solution = ProductionLineSolution::default()
            .with_recipe(
                RecipeDefinition::new(1, "Assembler", per_minute())
                    .ingredient(99, 5.0)
                    .ingredient(99, 5.0)
                    .product(10, 1.0),
                2.0,
            )
            .with_target(10, 2.0);

        let graph = build(&solution);

        assert_eq!(
            graph.warnings,
            vec![Warning::MissingProducer {
                consumer: RecipeId(1),
                item: ItemId(99),
                required: 20.0,
            }]
        );
    }

    #[test]
    fn unusable_scale_is_reported_and_idle() {
        let solution = ProductionLineSolution::default()
            .with_recipe(
                RecipeDefinition::new(1, "Ingot", per_minute())
                    .ingredient(155, 10.0)
                    .product(10, 10.0),
                -1.0,
            )
            .with_recipe(
                RecipeDefinition::new(2, "Plate", per_minute())
                    .ingredient(155, 1.0)
                    .product(11, 1.0),
                f64::NAN,
            )
            .with_raw(155, 10.0)
            .with_target(10, 10.0);

        let graph = build(&solution);

        assert_eq!(graph.warnings.len(), 2);
        assert!(graph.warnings.contains(&Warning::InvalidScale {
            recipe: RecipeId(1),
            scale: -1.0,
        }));
        assert!(graph
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::InvalidScale { recipe: RecipeId(2), scale } if scale.is_nan())));
        assert!(graph.node(NodeKey::Recipe(RecipeId(1))).is_some());
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn catalog_decorates_raw_nodes() {
        let catalog = ResourceCatalog::builtin().unwrap();
        let solution = ProductionLineSolution::default()
            .with_recipe(
                RecipeDefinition::new(1, "Smelt", per_minute())
                    .ingredient(155, 1.0)
                    .product(10, 1.0),
                1.0,
            )
            .with_raw(155, 1.0)
            .with_target(10, 1.0)
            .with_item_name(10, "Iron Ingot");

        let graph = FlowGraphBuilder::default()
            .with_catalog(&catalog)
            .build(&solution);

        match graph.node(NodeKey::Raw(ItemId(155))).unwrap() {
            FlowNode::Raw {
                name, global_limit, ..
            } => {
                assert_eq!(name, "Iron Ore");
                assert_eq!(*global_limit, Some(92_100.0));
            }
            other => panic!("unexpected node {other:?}"),
        }
        assert_eq!(
            graph.node(NodeKey::TargetOutput(ItemId(10))).unwrap().name(),
            "Iron Ingot"
        );
    }

    #[test]
    fn identical_input_gives_equal_graphs() {
        let solution = bypass_solution();
        let first = build(&solution);
        let second = build(&solution);
        assert_eq!(first.node_keys(), second.node_keys());
        assert_eq!(first.edge_quantities(), second.edge_quantities());
    }

    #[test]
    fn node_key_display_uses_kind_prefix() {
        assert_eq!(NodeKey::TargetOutput(ItemId(10)).to_string(), "product:10");
        assert_eq!(NodeKey::ByProduct(ItemId(3)).to_string(), "by-product:3");
        assert_eq!("Additive".parse::<RawBypass>(), Ok(RawBypass::Additive));
        assert!("sometimes".parse::<RawBypass>().is_err());
    }
}
