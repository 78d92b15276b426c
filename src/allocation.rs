//! Proportional split of a consumer's demand among producers of one item

use crate::models::RecipeId;

/// Share of a consumer's demand assigned to one producer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Allocation {
    pub producer: RecipeId,
    pub rate: f64,
}

/// Split `required` among `producers` in proportion to their gross rates.
///
/// Each producer receives `required * gross / Σgross`. Producers reporting a
/// zero, negative or non-finite gross rate take no share. When nothing is left
/// to divide by, the allocation is empty and the caller decides what to do.
pub fn allocate(required: f64, producers: &[(RecipeId, f64)]) -> Vec<Allocation> {
    if !required.is_finite() || required <= 0.0 {
        return Vec::new();
    }

    let usable = || {
        producers
            .iter()
            .filter(|(_, gross)| gross.is_finite() && *gross > 0.0)
    };

    let total: f64 = usable().map(|(_, gross)| gross).sum();
    if total <= 0.0 {
        return Vec::new();
    }

    usable()
        .map(|&(producer, gross)| Allocation {
            producer,
            rate: required * gross / total,
        })
        .collect()
}
