use std::collections::{BTreeMap, HashSet};

use super::dto::CategoryNode;
use super::repo::Category;

/// Nests `cats` under their parents. Categories whose parent is missing are
/// roots. A parent chain that loops back on itself is emitted once, starting
/// at its lowest id, and never walked twice.
pub fn build_tree(cats: &[Category]) -> Vec<CategoryNode> {
    let known: HashSet<i32> = cats.iter().map(|c| c.id).collect();
    let mut children: BTreeMap<i32, Vec<&Category>> = BTreeMap::new();
    let mut roots = Vec::new();
    for c in cats {
        match c.parent_id {
            Some(p) if known.contains(&p) => children.entry(p).or_default().push(c),
            _ => roots.push(c),
        }
    }

    let mut visited = HashSet::with_capacity(cats.len());
    let mut out: Vec<CategoryNode> = roots
        .into_iter()
        .filter_map(|c| attach(c, &children, &mut visited))
        .collect();

    // Whatever is left hangs off a cycle with no root above it.
    let mut leftovers: Vec<&Category> = cats.iter().filter(|c| !visited.contains(&c.id)).collect();
    leftovers.sort_by_key(|c| c.id);
    for c in leftovers {
        if let Some(node) = attach(c, &children, &mut visited) {
            out.push(node);
        }
    }
    out
}

fn attach(
    c: &Category,
    children: &BTreeMap<i32, Vec<&Category>>,
    visited: &mut HashSet<i32>,
) -> Option<CategoryNode> {
    if !visited.insert(c.id) {
        return None;
    }
    let mut node = CategoryNode::from(c);
    if let Some(kids) = children.get(&c.id) {
        node.children = kids
            .iter()
            .filter_map(|k| attach(k, children, visited))
            .collect();
    }
    Some(node)
}
