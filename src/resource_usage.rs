//! Raw resource usage against global extraction ceilings

use serde::Serialize;

use crate::catalog::{ResourceCatalog, WATER};
use crate::models::{ItemId, ProductionLineSolution};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceBar {
    pub item: ItemId,
    pub name: String,
    pub quantity: f64,
    pub limit: f64,
    /// `quantity / limit`, or 0 when the ceiling is unknown
    pub fraction: f64,
    pub gradient: Option<[String; 3]>,
}

/// One bar per raw resource the solution draws, largest first. Water has no
/// meaningful ceiling and is left out.
pub fn resource_usage(solution: &ProductionLineSolution, catalog: &ResourceCatalog) -> Vec<ResourceBar> {
    let mut bars: Vec<ResourceBar> = solution
        .raw_usage()
        .iter()
        .filter(|r| r.item != WATER)
        .map(|r| {
            let meta = catalog.get(r.item);
            let limit = meta.map(|m| m.global_limit).unwrap_or_default();
            ResourceBar {
                item: r.item,
                name: meta
                    .map(|m| m.display_name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                quantity: r.total_quantity,
                limit,
                fraction: if limit > 0.0 { r.total_quantity / limit } else { 0.0 },
                gradient: meta.map(|m| m.gradient.clone()),
            }
        })
        .collect();

    bars.sort_by(|a, b| b.quantity.total_cmp(&a.quantity));
    bars
}
