//! Presentation metadata for raw resources
//!
//! Names, global extraction ceilings and colours. Nothing here affects graph
//! structure; it only decorates raw and by-product nodes.

use std::collections::HashMap;

use regex::Regex;

use crate::models::ItemId;
use crate::{PlannerError, Result};

pub const WATER: ItemId = ItemId(157);

#[derive(Debug, Clone, PartialEq)]
pub struct RawResourceMeta {
    pub display_name: String,
    pub global_limit: f64,
    pub color: String,
    /// Lighter, central and darker shade of `color`
    pub gradient: [String; 3],
}

impl RawResourceMeta {
    pub fn new(display_name: impl Into<String>, global_limit: f64, color: &str) -> Result<Self> {
        Ok(Self {
            display_name: display_name.into(),
            global_limit,
            color: color.to_string(),
            gradient: three_stop_gradient(color, 1.4, 0.8)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceCatalog {
    raw: HashMap<ItemId, RawResourceMeta>,
}

impl ResourceCatalog {
    pub fn insert(&mut self, item: ItemId, meta: RawResourceMeta) {
        self.raw.insert(item, meta);
    }

    pub fn get(&self, item: ItemId) -> Option<&RawResourceMeta> {
        self.raw.get(&item)
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Entries sorted by item id
    pub fn entries(&self) -> Vec<(ItemId, &RawResourceMeta)> {
        let mut entries: Vec<_> = self.raw.iter().map(|(id, meta)| (*id, meta)).collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }

    /// The raw resources of the shipped game data
    pub fn builtin() -> Result<Self> {
        let mut catalog = Self::default();
        for (id, name, limit, color) in BUILTIN_RAW_RESOURCES {
            catalog.insert(ItemId(*id), RawResourceMeta::new(*name, *limit, color)?);
        }
        Ok(catalog)
    }
}

// Water is pumped without a global ceiling
const UNLIMITED: f64 = 9_007_199_254_740_991.0;

pub(crate) const BUILTIN_RAW_RESOURCES: &[(u32, &str, f64, &str)] = &[
    (155, "Iron Ore", 92_100.0, "#9994A6"),
    (156, "Coal", 42_300.0, "#272733"),
    (157, "Water", UNLIMITED, "#2563AD"),
    (158, "Nitrogen Gas", 12_000.0, "#F7FAD7"),
    (159, "Sulfur", 10_800.0, "#FCDC48"),
    (160, "Sam Ore", 10_200.0, "#d946ef"),
    (161, "Bauxite", 12_300.0, "#CD7660"),
    (162, "Caterium Ore", 15_000.0, "#E2B148"),
    (163, "Copper Ore", 36_900.0, "#BD4C39"),
    (164, "Raw Quartz", 13_500.0, "#F177B5"),
    (165, "Limestone", 69_900.0, "#C8BFA7"),
    (166, "Uranium", 2_100.0, "#88D288"),
    (167, "Cure Oil", 12_600.0, "#7D0F9C"),
];

/// Derive a lighter and a darker shade around `hex` (`#rrggbb`).
///
/// Channels are scaled by the factors, rounded and clamped to 0..=255.
pub fn three_stop_gradient(hex: &str, lighten: f64, darken: f64) -> Result<[String; 3]> {
    let re = Regex::new(r"^#([0-9a-fA-F]{2})([0-9a-fA-F]{2})([0-9a-fA-F]{2})$")?;
    let cap = re
        .captures(hex)
        .ok_or_else(|| PlannerError::InvalidColor(hex.to_string()))?;

    let mut rgb = [0.0f64; 3];
    for (slot, group) in rgb.iter_mut().zip(1..=3) {
        *slot = u8::from_str_radix(&cap[group], 16)
            .map_err(|_| PlannerError::InvalidColor(hex.to_string()))? as f64;
    }

    let shade = |factor: f64| {
        let channels: Vec<String> = rgb
            .iter()
            .map(|c| format!("{:02x}", (c * factor).round().clamp(0.0, 255.0) as u8))
            .collect();
        format!("#{}", channels.concat())
    };

    Ok([shade(lighten), hex.to_string(), shade(darken)])
}
