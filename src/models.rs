//! Data models for optimizer solutions and the recipes they select

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{PlannerError, Result};

/// Item identifier. Item and recipe ids share a numeric space but are never
/// interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item {}", self.0)
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "recipe {}", self.0)
    }
}

/// Seconds per recipe cycle, always finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct CycleDuration(f64);

impl CycleDuration {
    pub fn new(secs: f64) -> Result<Self> {
        if secs.is_finite() && secs > 0.0 {
            Ok(Self(secs))
        } else {
            Err(PlannerError::InvalidCycleDuration(secs.to_string()))
        }
    }

    /// Parse durations as the recipe database stores them: `"6.00s"`, `"4"`,
    /// `"12.5 s"`.
    pub fn parse(text: &str) -> Result<Self> {
        let re = Regex::new(r"^\s*(\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?\s*s?\s*$")?;
        let Some(cap) = re.captures(text) else {
            return Err(PlannerError::InvalidCycleDuration(text.to_string()));
        };
        let number = cap[0].trim().trim_end_matches('s').trim_end();
        let secs = number
            .parse::<f64>()
            .map_err(|_| PlannerError::InvalidCycleDuration(text.to_string()))?;
        Self::new(secs).map_err(|_| PlannerError::InvalidCycleDuration(text.to_string()))
    }

    pub fn secs(self) -> f64 {
        self.0
    }

    pub fn cycles_per_minute(self) -> f64 {
        60.0 / self.0
    }
}

impl FromStr for CycleDuration {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemAmount {
    pub item: ItemId,
    /// Units per cycle
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeDefinition {
    pub id: RecipeId,
    pub display_name: String,
    pub building: Option<String>,
    pub ingredients: Vec<ItemAmount>,
    pub products: Vec<ItemAmount>,
    pub cycle: CycleDuration,
}

impl RecipeDefinition {
    pub fn new(id: u32, display_name: impl Into<String>, cycle: CycleDuration) -> Self {
        Self {
            id: RecipeId(id),
            display_name: display_name.into(),
            building: None,
            ingredients: Vec::new(),
            products: Vec::new(),
            cycle,
        }
    }

    pub fn ingredient(mut self, item: u32, amount: f64) -> Self {
        self.ingredients.push(ItemAmount {
            item: ItemId(item),
            amount,
        });
        self
    }

    pub fn product(mut self, item: u32, amount: f64) -> Self {
        self.products.push(ItemAmount {
            item: ItemId(item),
            amount,
        });
        self
    }

    pub fn built_in(mut self, building: impl Into<String>) -> Self {
        self.building = Some(building.into());
        self
    }

    pub fn produces(&self, item: ItemId) -> bool {
        self.products.iter().any(|p| p.item == item)
    }
}

/// A recipe the optimizer selected, with how many parallel instances it runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveRecipe {
    pub recipe: RecipeDefinition,
    pub scale: f64,
}

impl ActiveRecipe {
    pub fn id(&self) -> RecipeId {
        self.recipe.id
    }

    /// Convert a per-cycle amount into units per minute at this scale
    pub fn per_minute(&self, amount: f64) -> f64 {
        amount * self.scale * self.recipe.cycle.cycles_per_minute()
    }

    /// Gross per-minute output of `item`, summed over every product entry
    pub fn gross_output(&self, item: ItemId) -> f64 {
        self.recipe
            .products
            .iter()
            .filter(|p| p.item == item)
            .map(|p| self.per_minute(p.amount))
            .sum()
    }
}

/// A recipe the optimizer selected but whose cycle duration is unusable.
/// It still shows up as a node; it contributes no flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRecipe {
    pub id: RecipeId,
    pub display_name: String,
    pub building: Option<String>,
    pub scale: f64,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawResourceUsage {
    pub item: ItemId,
    pub total_quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetOutput {
    pub item: ItemId,
    pub amount: f64,
}

/// The optimizer's answer for one production line
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductionLineSolution {
    recipes: BTreeMap<RecipeId, ActiveRecipe>,
    rejected: Vec<RejectedRecipe>,
    raw_usage: Vec<RawResourceUsage>,
    targets: Vec<TargetOutput>,
    item_names: BTreeMap<ItemId, String>,
}

impl ProductionLineSolution {
    pub fn with_recipe(mut self, recipe: RecipeDefinition, scale: f64) -> Self {
        self.recipes.insert(recipe.id, ActiveRecipe { recipe, scale });
        self
    }

    pub fn with_raw(mut self, item: u32, total_quantity: f64) -> Self {
        self.add_raw(ItemId(item), total_quantity);
        self
    }

    pub fn with_target(mut self, item: u32, amount: f64) -> Self {
        self.add_target(ItemId(item), amount);
        self
    }

    pub fn with_item_name(mut self, item: u32, name: impl Into<String>) -> Self {
        self.item_names.insert(ItemId(item), name.into());
        self
    }

    fn add_raw(&mut self, item: ItemId, total_quantity: f64) {
        match self.raw_usage.iter_mut().find(|r| r.item == item) {
            Some(existing) => existing.total_quantity += total_quantity,
            None => self.raw_usage.push(RawResourceUsage {
                item,
                total_quantity,
            }),
        }
    }

    fn add_target(&mut self, item: ItemId, amount: f64) {
        match self.targets.iter_mut().find(|t| t.item == item) {
            Some(existing) => existing.amount += amount,
            None => self.targets.push(TargetOutput { item, amount }),
        }
    }

    pub fn recipes(&self) -> impl Iterator<Item = &ActiveRecipe> {
        self.recipes.values()
    }

    pub fn recipe(&self, id: RecipeId) -> Option<&ActiveRecipe> {
        self.recipes.get(&id)
    }

    pub fn rejected_recipes(&self) -> &[RejectedRecipe] {
        &self.rejected
    }

    pub fn raw_usage(&self) -> &[RawResourceUsage] {
        &self.raw_usage
    }

    pub fn targets(&self) -> &[TargetOutput] {
        &self.targets
    }

    pub fn raw_quantity(&self, item: ItemId) -> Option<f64> {
        self.raw_usage
            .iter()
            .find(|r| r.item == item)
            .map(|r| r.total_quantity)
    }

    pub fn target_amount(&self, item: ItemId) -> Option<f64> {
        self.targets
            .iter()
            .find(|t| t.item == item)
            .map(|t| t.amount)
    }

    pub fn item_name(&self, item: ItemId) -> Option<&str> {
        self.item_names.get(&item).map(String::as_str)
    }

    /// True when the optimizer returned nothing to draw: no recipes, no raw
    /// usage and no targets
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
            && self.rejected.is_empty()
            && self.raw_usage.is_empty()
            && self.targets.is_empty()
    }

    /// Build a solution from the optimizer's JSON payload.
    ///
    /// Recipes with an unusable cycle duration are kept aside in
    /// [`rejected_recipes`](Self::rejected_recipes) rather than failing the
    /// whole solution.
    pub fn from_payload(payload: SolutionPayload) -> Result<Self> {
        let production_line = payload
            .production_line
            .ok_or(PlannerError::MissingProductionLine)?;

        let mut solution = Self::default();

        for (_, entry) in production_line {
            let data = entry.recipe_data;
            let id = RecipeId(data.id);
            let building = data
                .produced_in
                .unwrap_or_default()
                .into_iter()
                .next()
                .map(|b| b.display_name);

            for io in data.ingredients.iter().chain(data.products.iter()).flatten() {
                if let Some(name) = &io.display_name {
                    solution
                        .item_names
                        .entry(ItemId(io.id))
                        .or_insert_with(|| name.clone());
                }
            }

            let cycle = match &data.manufactoring_duration {
                Some(serde_json::Value::Number(n)) => n
                    .as_f64()
                    .ok_or_else(|| PlannerError::InvalidCycleDuration(n.to_string()))
                    .and_then(CycleDuration::new),
                Some(serde_json::Value::String(s)) => CycleDuration::parse(s),
                Some(other) => Err(PlannerError::InvalidCycleDuration(other.to_string())),
                None => Err(PlannerError::InvalidCycleDuration("missing".to_string())),
            };

            match cycle {
                Ok(cycle) => {
                    let to_amounts = |list: Option<Vec<ItemAmountPayload>>| {
                        list.unwrap_or_default()
                            .into_iter()
                            .map(|io| ItemAmount {
                                item: ItemId(io.id),
                                amount: io.amount,
                            })
                            .collect()
                    };
                    let recipe = RecipeDefinition {
                        id,
                        display_name: data.display_name,
                        building,
                        ingredients: to_amounts(data.ingredients),
                        products: to_amounts(data.products),
                        cycle,
                    };
                    solution.recipes.insert(
                        id,
                        ActiveRecipe {
                            recipe,
                            scale: entry.scale,
                        },
                    );
                }
                Err(_) => solution.rejected.push(RejectedRecipe {
                    id,
                    display_name: data.display_name,
                    building,
                    scale: entry.scale,
                    duration: data
                        .manufactoring_duration
                        .map(|v| v.to_string())
                        .unwrap_or_default(),
                }),
            }
        }

        for raw in payload.raw_resource_usage {
            solution.add_raw(ItemId(raw.item_id), raw.total_quantity);
        }
        for target in payload.target_output {
            solution.add_target(ItemId(target.item_id), target.amount);
        }

        Ok(solution)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let payload: SolutionPayload = serde_json::from_str(json)?;
        Self::from_payload(payload)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Optimizer response body, as delivered over the wire
#[derive(Debug, Deserialize)]
pub struct SolutionPayload {
    #[serde(default)]
    pub production_line: Option<BTreeMap<String, ActiveRecipePayload>>,
    #[serde(default)]
    pub raw_resource_usage: Vec<RawUsagePayload>,
    #[serde(default)]
    pub target_output: Vec<TargetPayload>,
}

#[derive(Debug, Deserialize)]
pub struct ActiveRecipePayload {
    pub recipe_data: RecipePayload,
    pub scale: f64,
}

#[derive(Debug, Deserialize)]
pub struct RecipePayload {
    pub id: u32,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, alias = "manufacturing_duration", alias = "cycle_duration")]
    pub manufactoring_duration: Option<serde_json::Value>,
    #[serde(default)]
    pub produced_in: Option<Vec<BuildingPayload>>,
    #[serde(default)]
    pub ingredients: Option<Vec<ItemAmountPayload>>,
    #[serde(default)]
    pub products: Option<Vec<ItemAmountPayload>>,
}

#[derive(Debug, Deserialize)]
pub struct BuildingPayload {
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ItemAmountPayload {
    #[serde(alias = "item_id")]
    pub id: u32,
    #[serde(default, alias = "item_display_name")]
    pub display_name: Option<String>,
    pub amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct RawUsagePayload {
    pub item_id: u32,
    pub total_quantity: f64,
}

#[derive(Debug, Deserialize)]
pub struct TargetPayload {
    pub item_id: u32,
    pub amount: f64,
}
