//! Connected components of the match graph, via petgraph's union-find.
//!
//! A chain A↔B, B↔C yields one component {A, B, C} even though A and C were
//! never compared directly.

use petgraph::unionfind::UnionFind;
use rollup_core::models::MatchResult;
use rollup_core::{FxHashMap, NodeKey};

/// Components with at least two members. Members are sorted by
/// `(repository_id, node_id)`; components are sorted by their first member.
pub fn matched_components(keys: &[NodeKey], matches: &[MatchResult]) -> Vec<Vec<usize>> {
    let index: FxHashMap<&NodeKey, usize> = keys.iter().enumerate().map(|(i, k)| (k, i)).collect();
    let mut sets = UnionFind::<usize>::new(keys.len());

    for m in matches {
        let (Some(&a), Some(&b)) = (index.get(&m.source_key()), index.get(&m.target_key())) else {
            continue;
        };
        sets.union(a, b);
    }

    let mut grouped: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
    for i in 0..keys.len() {
        grouped.entry(sets.find(i)).or_default().push(i);
    }

    let mut components: Vec<Vec<usize>> = grouped
        .into_values()
        .filter(|members| members.len() >= 2)
        .map(|mut members| {
            members.sort_by(|a, b| keys[*a].cmp(&keys[*b]));
            members
        })
        .collect();
    components.sort_by(|a, b| keys[a[0]].cmp(&keys[b[0]]));
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_core::models::MatchStrategy;

    fn link(a: (&str, &str), b: (&str, &str)) -> MatchResult {
        MatchResult {
            source_node_id: a.1.into(),
            source_repository_id: a.0.into(),
            target_node_id: b.1.into(),
            target_repository_id: b.0.into(),
            strategy: MatchStrategy::Name,
            confidence: 100,
            matched_attribute: "name".into(),
            source_value: String::new(),
            target_value: String::new(),
        }
    }

    #[test]
    fn chains_are_transitive() {
        let keys = vec![
            NodeKey::new("r1", "a"),
            NodeKey::new("r2", "b"),
            NodeKey::new("r3", "c"),
            NodeKey::new("r3", "lonely"),
        ];
        let matches = vec![link(("r1", "a"), ("r2", "b")), link(("r2", "b"), ("r3", "c"))];
        let components = matched_components(&keys, &matches);
        assert_eq!(components, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn matches_on_unknown_nodes_are_ignored() {
        let keys = vec![NodeKey::new("r1", "a"), NodeKey::new("r2", "b")];
        let matches = vec![link(("r1", "a"), ("r9", "gone"))];
        assert!(matched_components(&keys, &matches).is_empty());
    }
}
