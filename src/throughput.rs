//! Relative throughput gauges for groups of interchangeable recipes
//!
//! Gauges are relative to the busiest group in the displayed solution, so
//! every raw value is computed first and then divided by the largest one.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{ItemId, ProductionLineSolution, RecipeId};

/// Recipes that make the same primary product; one standard recipe plus
/// any number of alternates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeGroup {
    pub name: String,
    #[serde(default)]
    pub standard: Option<RecipeId>,
    #[serde(default)]
    pub alternates: Vec<RecipeId>,
}

impl RecipeGroup {
    pub fn members(&self) -> impl Iterator<Item = RecipeId> + '_ {
        self.standard.into_iter().chain(self.alternates.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSelection {
    pub group: String,
    pub recipe: RecipeId,
    /// Other members of the group the user could switch to
    pub alternatives: Vec<RecipeId>,
}

/// First-pass values, relative to the whole solution's throughput
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawGauge {
    pub group: String,
    pub recipe: RecipeId,
    pub primary_item: Option<ItemId>,
    pub total_throughput: f64,
    pub output_throughput: f64,
    pub throughput_raw: f64,
    pub output_raw: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupGauge {
    pub group: String,
    pub recipe: RecipeId,
    pub primary_item: Option<ItemId>,
    pub total_throughput: f64,
    pub output_throughput: f64,
    /// Share of the primary product feeding other recipes, in 0..=1
    pub throughput_gauge: f64,
    /// Share of the primary product delivered as a requested output, in 0..=1
    pub output_gauge: f64,
}

/// Pair each active recipe with the group it belongs to. Standard membership
/// wins over alternate membership; recipes in no group are skipped.
pub fn select_active(solution: &ProductionLineSolution, groups: &[RecipeGroup]) -> Vec<GroupSelection> {
    let mut selections = Vec::new();

    for active in solution.recipes() {
        let id = active.id();
        let group = groups
            .iter()
            .find(|g| g.standard == Some(id))
            .or_else(|| groups.iter().find(|g| g.alternates.contains(&id)));

        let Some(group) = group else {
            warn!(recipe = id.0, "no recipe group found for active recipe");
            continue;
        };

        selections.push(GroupSelection {
            group: group.name.clone(),
            recipe: id,
            alternatives: group.members().filter(|m| *m != id).collect(),
        });
    }

    selections
}

/// Largest per-minute product of the selected recipe. On exact ties the
/// first product listed wins.
fn primary_product(solution: &ProductionLineSolution, recipe: RecipeId) -> Option<(ItemId, f64)> {
    let active = solution.recipe(recipe)?;
    let mut best: Option<(ItemId, f64)> = None;
    for product in &active.recipe.products {
        let rate = active.per_minute(product.amount);
        match best {
            Some((_, best_rate)) if rate <= best_rate => {}
            _ => best = Some((product.item, rate)),
        }
    }
    best
}

/// First pass: throughput of each selection as a share of everything moving
/// through the solution
pub fn raw_gauges(solution: &ProductionLineSolution, selections: &[GroupSelection]) -> Vec<RawGauge> {
    let primaries: Vec<Option<(ItemId, f64)>> = selections
        .iter()
        .map(|s| primary_product(solution, s.recipe))
        .collect();

    let total_raw: f64 = solution.raw_usage().iter().map(|r| r.total_quantity).sum();
    let denominator: f64 = primaries
        .iter()
        .map(|p| p.map(|(_, rate)| rate).unwrap_or_default())
        .sum::<f64>()
        + total_raw;

    selections
        .iter()
        .zip(primaries)
        .map(|(selection, primary)| {
            let (primary_item, total) = match primary {
                Some((item, rate)) => (Some(item), rate),
                None => (None, 0.0),
            };
            let output = primary_item
                .and_then(|item| solution.target_amount(item))
                .unwrap_or_default()
                .clamp(0.0, total);

            let (throughput_raw, output_raw) = if denominator > 0.0 {
                ((total - output) / denominator, output / denominator)
            } else {
                (0.0, 0.0)
            };

            RawGauge {
                group: selection.group.clone(),
                recipe: selection.recipe,
                primary_item,
                total_throughput: total,
                output_throughput: output,
                throughput_raw,
                output_raw,
            }
        })
        .collect()
}

/// Second pass: scale every group so the single largest raw value becomes 1
pub fn normalize_raw(raw: Vec<RawGauge>) -> Vec<GroupGauge> {
    let max_raw = raw
        .iter()
        .flat_map(|g| [g.throughput_raw, g.output_raw])
        .fold(0.0f64, f64::max);

    let scale = |value: f64| if max_raw > 0.0 { value / max_raw } else { 0.0 };

    raw.into_iter()
        .map(|g| GroupGauge {
            throughput_gauge: scale(g.throughput_raw),
            output_gauge: scale(g.output_raw),
            group: g.group,
            recipe: g.recipe,
            primary_item: g.primary_item,
            total_throughput: g.total_throughput,
            output_throughput: g.output_throughput,
        })
        .collect()
}

/// Gauges for every selection, busiest group first
pub fn normalize(solution: &ProductionLineSolution, selections: &[GroupSelection]) -> Vec<GroupGauge> {
    let mut gauges = normalize_raw(raw_gauges(solution, selections));
    gauges.sort_by(|a, b| b.total_throughput.total_cmp(&a.total_throughput));
    gauges
}
