//! Detect whether a routine drifted from the snapshot of its last analysis.
//!
//! All comparisons are order-sensitive: step order is part of the routine
//! (cleanse before moisturize), so a reorder counts as a change.

use crate::routine::{Product, RoutineSnapshot};

/// Snapshot fields compared by [`diff_snapshots`], in comparison order.
pub const DAY_PRODUCTS: &str = "day_products";
pub const NIGHT_PRODUCTS: &str = "night_products";
pub const SKIN_TYPE: &str = "skin_type";
pub const SKIN_CONCERNS: &str = "skin_concerns";
pub const CLIMATE: &str = "climate";

/// Returns true when the routine needs a fresh analysis.
///
/// With no previous snapshot there is nothing to compare against, so the
/// answer is always true.
pub fn has_changed(current: &RoutineSnapshot, previous: Option<&RoutineSnapshot>) -> bool {
    match previous {
        Some(previous) => !diff_snapshots(current, previous).is_empty(),
        None => true,
    }
}

/// Names of the snapshot fields that differ between `current` and `previous`.
pub fn diff_snapshots(current: &RoutineSnapshot, previous: &RoutineSnapshot) -> Vec<&'static str> {
    let checks = [
        (
            DAY_PRODUCTS,
            products_equal(&current.day_products, &previous.day_products),
        ),
        (
            NIGHT_PRODUCTS,
            products_equal(&current.night_products, &previous.night_products),
        ),
        (SKIN_TYPE, current.skin_type == previous.skin_type),
        (SKIN_CONCERNS, current.skin_concerns == previous.skin_concerns),
        (CLIMATE, current.climate == previous.climate),
    ];

    checks
        .into_iter()
        .filter(|(_, equal)| !equal)
        .map(|(field, _)| field)
        .collect()
}

/// Same length and same identity at every index. Ingredients are ignored.
fn products_equal(a: &[Product], b: &[Product]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_identity(y))
}
