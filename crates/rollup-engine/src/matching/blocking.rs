//! Candidate blocking: only nodes sharing a coarse key, from different
//! repositories, are ever compared.

use std::collections::BTreeMap;

use rollup_core::ScopedNode;

use super::resource_id::effective_resource_type;

/// Block key: node type, resource type, provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockKey {
    pub node_type: String,
    pub resource_type: String,
    pub provider: String,
}

impl BlockKey {
    pub fn of(node: &ScopedNode) -> Self {
        Self {
            node_type: node.node.node_type.clone(),
            resource_type: effective_resource_type(&node.node).to_string(),
            provider: node.node.provider().unwrap_or_default().to_string(),
        }
    }
}

/// Indices into the node slice, grouped by block key.
#[derive(Debug, Clone)]
pub struct Block {
    pub key: BlockKey,
    pub members: Vec<usize>,
}

impl Block {
    /// Pairs `(i, j)` with `i < j` from different repositories.
    pub fn candidate_pairs<'a>(
        &'a self,
        nodes: &'a [ScopedNode],
    ) -> impl Iterator<Item = (usize, usize)> + 'a {
        self.members.iter().enumerate().flat_map(move |(pos, &i)| {
            self.members[pos + 1..]
                .iter()
                .filter(move |&&j| nodes[i].repository_id != nodes[j].repository_id)
                .map(move |&j| (i, j))
        })
    }

    pub fn candidate_count(&self, nodes: &[ScopedNode]) -> u64 {
        let mut per_repo: BTreeMap<&str, u64> = BTreeMap::new();
        for &i in &self.members {
            *per_repo.entry(nodes[i].repository_id.as_str()).or_default() += 1;
        }
        let total: u64 = per_repo.values().sum();
        let same_repo: u64 = per_repo.values().map(|n| n * n.saturating_sub(1) / 2).sum();
        total * total.saturating_sub(1) / 2 - same_repo
    }
}

/// Blocks that span at least two repositories, in key order.
pub fn build_blocks(nodes: &[ScopedNode]) -> Vec<Block> {
    let mut grouped: BTreeMap<BlockKey, Vec<usize>> = BTreeMap::new();
    for (i, node) in nodes.iter().enumerate() {
        grouped.entry(BlockKey::of(node)).or_default().push(i);
    }
    grouped
        .into_iter()
        .filter(|(_, members)| {
            members
                .iter()
                .any(|&i| nodes[i].repository_id != nodes[members[0]].repository_id)
        })
        .map(|(key, members)| Block { key, members })
        .collect()
}
