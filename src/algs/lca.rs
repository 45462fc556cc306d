//! Offline lowest-common-ancestor computation.
//!
//! Answers a whole batch of LCA queries with one walk over the tree (Tarjan's
//! offline algorithm over a union-find), instead of a root-to-node walk per
//! pair. The traversal uses an explicit stack like the rest of the crate.

use std::collections::HashMap;

use crate::topology::graph::TreeGraph;

/// Union-find with path compression and union by rank.
struct Dsu {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl Dsu {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.rank[ra] < self.rank[rb] {
            self.parent[ra] = rb;
        } else if self.rank[ra] > self.rank[rb] {
            self.parent[rb] = ra;
        } else {
            self.parent[rb] = ra;
            self.rank[ra] += 1;
        }
    }
}

/// Resolve the LCA of every requested pair in one postorder pass from `root`.
///
/// Pairs naming nodes outside the tree are skipped; callers validate
/// membership up front. Results come back in input-pair order.
pub(crate) fn lcas_of_pairs(
    graph: &TreeGraph,
    root: &str,
    pairs: &[(String, String)],
) -> Vec<((String, String), String)> {
    let order = graph.node_order();
    let index: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();
    let n = order.len();
    let children: Vec<Vec<usize>> = order
        .iter()
        .map(|node| {
            graph
                .children_with_lengths(node)
                .iter()
                .map(|(c, _)| index[c.as_str()])
                .collect()
        })
        .collect();

    // queries[u] = (v, pair position)
    let mut queries: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
    for (k, (a, b)) in pairs.iter().enumerate() {
        let (Some(&u), Some(&v)) = (index.get(a.as_str()), index.get(b.as_str())) else {
            continue;
        };
        queries[u].push((v, k));
        if u != v {
            queries[v].push((u, k));
        }
    }

    let mut dsu = Dsu::new(n);
    let mut ancestor = vec![0usize; n];
    let mut colored = vec![false; n];
    let mut answers: Vec<Option<usize>> = vec![None; pairs.len()];

    let Some(&root_idx) = index.get(root) else {
        return Vec::new();
    };
    // (node, next child cursor); cursor > 0 means the previous child's
    // subtree just completed and gets merged into this node's set.
    let mut stack = vec![(root_idx, 0usize)];
    while let Some((u, cursor)) = stack.pop() {
        if cursor == 0 {
            ancestor[u] = u;
        } else {
            let done = children[u][cursor - 1];
            dsu.union(u, done);
            let r = dsu.find(u);
            ancestor[r] = u;
        }
        if cursor < children[u].len() {
            stack.push((u, cursor + 1));
            stack.push((children[u][cursor], 0));
        } else {
            colored[u] = true;
            for &(v, k) in &queries[u] {
                if colored[v] && answers[k].is_none() {
                    answers[k] = Some(ancestor[dsu.find(v)]);
                }
            }
        }
    }

    pairs
        .iter()
        .zip(answers)
        .filter_map(|(pair, ans)| ans.map(|i| (pair.clone(), order[i].clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::graph::RawTopology;

    fn graph() -> TreeGraph {
        TreeGraph::from_raw(&RawTopology::from_edges([
            ("root", "p"),
            ("p", "a"),
            ("p", "b"),
            ("root", "c"),
        ]))
        .unwrap()
    }

    fn pair(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    #[test]
    fn sibling_and_cross_subtree_pairs() {
        let g = graph();
        let pairs = vec![pair("a", "b"), pair("a", "c"), pair("p", "b")];
        let result = lcas_of_pairs(&g, "root", &pairs);
        assert_eq!(result[0].1, "p");
        assert_eq!(result[1].1, "root");
        assert_eq!(result[2].1, "p");
    }

    #[test]
    fn identical_pair_is_its_own_lca() {
        let g = graph();
        let result = lcas_of_pairs(&g, "root", &[pair("b", "b")]);
        assert_eq!(result[0].1, "b");
    }

    #[test]
    fn unknown_nodes_are_skipped() {
        let g = graph();
        let result = lcas_of_pairs(&g, "root", &[pair("a", "nope")]);
        assert!(result.is_empty());
    }
}
