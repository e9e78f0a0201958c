use std::fmt::Display;

use crate::{
    base_node::NodeType, key::LoadKey, node_ptr::NodePtr, tree::RawArt, Allocator,
};

/// Internal node statistics for both tree families.
#[derive(Default, Debug, serde::Serialize)]
pub struct NodeStats {
    levels: Vec<LevelStats>,
    static_nodes: StaticStats,
}

#[derive(Debug, serde::Serialize, Clone)]
pub struct LevelStats {
    level: usize,
    n4: (usize, usize), // (node count, child count)
    n16: (usize, usize),
    n48: (usize, usize),
    n256: (usize, usize),
}

#[derive(Default, Debug, serde::Serialize)]
pub struct StaticStats {
    d: usize,
    dp: usize,
    f: usize,
    fp: usize,
    bytes: usize,
}

impl LevelStats {
    fn new_level(level: usize) -> Self {
        Self {
            level,
            n4: (0, 0),
            n16: (0, 0),
            n48: (0, 0),
            n256: (0, 0),
        }
    }
}

impl NodeStats {
    pub fn total_nodes(&self) -> usize {
        self.levels
            .iter()
            .map(|l| l.n4.0 + l.n16.0 + l.n48.0 + l.n256.0)
            .sum()
    }

    pub fn static_node_count(&self) -> usize {
        self.static_nodes.d + self.static_nodes.dp + self.static_nodes.f + self.static_nodes.fp
    }

    pub fn dense_static_nodes(&self) -> usize {
        self.static_nodes.d + self.static_nodes.dp
    }

    pub fn full_static_nodes(&self) -> usize {
        self.static_nodes.f + self.static_nodes.fp
    }

    /// Per-class dynamic node population as (n4, n16, n48, n256).
    pub fn class_counts(&self) -> (usize, usize, usize, usize) {
        let mut totals = (0, 0, 0, 0);
        for l in self.levels.iter() {
            totals.0 += l.n4.0;
            totals.1 += l.n16.0;
            totals.2 += l.n48.0;
            totals.3 += l.n256.0;
        }
        totals
    }
}

impl Display for NodeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn calc_load_factor(n: (usize, usize), scale: usize) -> f64 {
            if n.0 == 0 {
                return 0.0;
            }
            (n.1 as f64) / (n.0 as f64 * scale as f64)
        }

        let mut total_node = 0;
        let mut total_f = 0.0;

        for l in self.levels.iter() {
            total_node += l.n4.0;
            total_node += l.n16.0;
            total_node += l.n48.0;
            total_node += l.n256.0;

            total_f += l.n4.1 as f64 / 4.0;
            total_f += l.n16.1 as f64 / 16.0;
            total_f += l.n48.1 as f64 / 48.0;
            total_f += l.n256.1 as f64 / 256.0;

            writeln!(
                f,
                "Level: {} --- || N4: {:8}, {:8.2} || N16: {:8}, {:8.2} || N48: {:8}, {:8.2} || N256: {:8}, {:8.2} ||",
                l.level,
                l.n4.0,
                calc_load_factor(l.n4, 4),
                l.n16.0,
                calc_load_factor(l.n16, 16),
                l.n48.0,
                calc_load_factor(l.n48, 48),
                l.n256.0,
                calc_load_factor(l.n256, 256),
            )?;
        }

        if total_node > 0 {
            writeln!(f, "Load factor: {:.2}", total_f / (total_node as f64))?;
        }

        writeln!(
            f,
            "Static --- || D: {:8} || DP: {:8} || F: {:8} || FP: {:8} || {} bytes",
            self.static_nodes.d,
            self.static_nodes.dp,
            self.static_nodes.f,
            self.static_nodes.fp,
            self.static_nodes.bytes,
        )?;

        Ok(())
    }
}

impl<const K_LEN: usize, L: LoadKey<K_LEN>, A: Allocator> RawArt<K_LEN, L, A> {
    /// Walks the dynamic tree for a per-level class breakdown; the static
    /// side is reported from the merge counters.
    pub(crate) fn stats(&self) -> NodeStats {
        let mut node_stats = NodeStats {
            levels: Vec::new(),
            static_nodes: StaticStats {
                d: self.counts.d,
                dp: self.counts.dp,
                f: self.counts.f,
                fp: self.counts.fp,
                bytes: self.static_memory,
            },
        };

        let mut sub_nodes: Vec<(usize, NodePtr)> = Vec::new();
        if !self.root.is_null() && !self.root.is_leaf() {
            sub_nodes.push((0, self.root));
        }

        while let Some((level, ptr)) = sub_nodes.pop() {
            let node_ptr = ptr.as_node();
            let node = unsafe { node_ptr.as_ref() };

            if node_stats.levels.len() <= level {
                node_stats.levels.push(LevelStats::new_level(level));
            }

            match node.get_type() {
                NodeType::N4 => {
                    node_stats.levels[level].n4.0 += 1;
                    node_stats.levels[level].n4.1 += node.get_count();
                }
                NodeType::N16 => {
                    node_stats.levels[level].n16.0 += 1;
                    node_stats.levels[level].n16.1 += node.get_count();
                }
                NodeType::N48 => {
                    node_stats.levels[level].n48.0 += 1;
                    node_stats.levels[level].n48.1 += node.get_count();
                }
                NodeType::N256 => {
                    node_stats.levels[level].n256.0 += 1;
                    node_stats.levels[level].n256.1 += node.get_count();
                }
            }

            for (_k, child) in node.get_children(0, 255) {
                if !child.is_leaf() {
                    sub_nodes.push((level + 1, child));
                }
            }
        }

        node_stats
    }
}
