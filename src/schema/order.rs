//! Dependency ordering for tables and transform steps.

use std::collections::HashMap;
use std::hash::Hash;

use crate::warehouse::{Result, WarehouseError};

/// Something that must run after the items it depends on.
pub trait Dependent: Copy + Eq + Hash + std::fmt::Debug + 'static {
    fn depends_on(&self) -> &'static [Self];
}

/// Order `items` so every item comes after its dependencies.
///
/// The sort is stable: among items whose dependencies are satisfied, the one
/// listed first in `items` goes first. Dependencies not present in `items`
/// are ignored.
pub fn dependency_order<T: Dependent>(items: &[T]) -> Result<Vec<T>> {
    let mut pending: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !pending.contains(item) {
            pending.push(*item);
        }
    }

    let mut remaining: HashMap<T, usize> = pending
        .iter()
        .map(|item| {
            let count = item
                .depends_on()
                .iter()
                .filter(|dep| pending.contains(dep))
                .count();
            (*item, count)
        })
        .collect();

    let mut ordered = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let Some(index) = pending.iter().position(|item| remaining[item] == 0) else {
            return Err(WarehouseError::DependencyCycle(format!("{:?}", pending)));
        };
        let next = pending.remove(index);
        for item in &pending {
            if item.depends_on().contains(&next) {
                if let Some(count) = remaining.get_mut(item) {
                    *count -= 1;
                }
            }
        }
        ordered.push(next);
    }

    Ok(ordered)
}
