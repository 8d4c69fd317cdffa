//! Last-writer-wins merge of plain entity lists.

use std::collections::BTreeMap;

use crate::model::Entity;

/// Union two lists by id. A remote entity replaces the local one only when
/// its `modified` is strictly newer. The result is ordered by id.
pub fn lww_merge<T: Entity>(local: Vec<T>, remote: Vec<T>) -> Vec<T> {
    let mut merged: BTreeMap<String, T> = local
        .into_iter()
        .map(|entity| (entity.id().to_string(), entity))
        .collect();

    for theirs in remote {
        match merged.get(theirs.id()) {
            Some(ours) if ours.modified() >= theirs.modified() => {}
            _ => {
                merged.insert(theirs.id().to_string(), theirs);
            }
        }
    }

    merged.into_values().collect()
}
