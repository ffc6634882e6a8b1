//! Metadata conflict resolution across the sources of one component.
//!
//! Sources arrive sorted by `(repository_id, node_id)`; every policy is a
//! pure function of that order, so repeated merges are identical.

use std::collections::BTreeSet;

use rollup_core::models::{ConflictResolution, FieldConflict, NestedMergePolicy};
use rollup_core::{Metadata, NodeKey};
use serde_json::{Map, Value};

/// Resolution of one component's metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(Metadata),
    /// `error` policy found disagreeing fields.
    Conflict(Vec<FieldConflict>),
}

/// Keys present in any source, in sorted order.
fn all_keys<'a>(sources: &[(&'a NodeKey, &'a Metadata)]) -> BTreeSet<&'a String> {
    sources.iter().flat_map(|(_, m)| m.keys()).collect()
}

pub fn resolve(
    policy: ConflictResolution,
    nested: NestedMergePolicy,
    sources: &[(&NodeKey, &Metadata)],
) -> Resolution {
    let mut resolved = Metadata::new();
    let mut conflicts = Vec::new();

    for key in all_keys(sources) {
        let present: Vec<(&NodeKey, &Value)> = sources
            .iter()
            .filter_map(|(k, m)| m.get(key).map(|v| (*k, v)))
            .collect();
        let values: Vec<&Value> = present.iter().map(|(_, v)| *v).collect();

        let value = match policy {
            ConflictResolution::First => values[0].clone(),
            ConflictResolution::Last => values[values.len() - 1].clone(),
            ConflictResolution::Merge => merge_values(&values, nested),
            ConflictResolution::Error => {
                if values.iter().any(|v| *v != values[0]) {
                    conflicts.push(FieldConflict {
                        field: key.clone(),
                        values: present
                            .iter()
                            .map(|(k, v)| ((*k).clone(), (*v).clone()))
                            .collect(),
                    });
                    continue;
                }
                values[0].clone()
            }
        };
        resolved.insert(key.clone(), value);
    }

    if conflicts.is_empty() {
        Resolution::Resolved(resolved)
    } else {
        Resolution::Conflict(conflicts)
    }
}

/// `merge` policy for one field. `values` is non-empty and in source order.
///
/// Arrays union with de-duplication (first occurrence order). Objects merge
/// field by field: with `FirstWins` the first present value of each nested
/// field is kept as-is; with `Deep` the same rules recurse. Anything else,
/// including mixed kinds, takes the first value.
pub fn merge_values(values: &[&Value], nested: NestedMergePolicy) -> Value {
    if values.iter().all(|v| v.is_array()) {
        let mut merged: Vec<Value> = Vec::new();
        for item in values.iter().filter_map(|v| v.as_array()).flatten() {
            if !merged.contains(item) {
                merged.push(item.clone());
            }
        }
        return Value::Array(merged);
    }

    if values.iter().all(|v| v.is_object()) {
        let objects: Vec<&Map<String, Value>> = values.iter().filter_map(|v| v.as_object()).collect();
        let keys: BTreeSet<&String> = objects.iter().flat_map(|o| o.keys()).collect();
        let mut merged = Map::new();
        for key in keys {
            let field_values: Vec<&Value> = objects.iter().filter_map(|o| o.get(key)).collect();
            let value = match nested {
                NestedMergePolicy::FirstWins => field_values[0].clone(),
                NestedMergePolicy::Deep => merge_values(&field_values, nested),
            };
            merged.insert(key.clone(), value);
        }
        return Value::Object(merged);
    }

    values[0].clone()
}
