//! Socket topology module.
//!
//! Provides `SocketConfiguration`, the equip-slot layout of a creature.
//! Sockets are nodes of an undirected graph; a linked pair is an edge.
//! Links are symmetric and each socket has at most one partner.

use crate::content::SocketLayout;
use crate::error::CombatError;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};

/// One equip slot, as handed to UI and equip logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Socket {
    pub index: usize,
    pub linked_partner: Option<usize>,
    pub required_level: u32,
}

/// Validated socket layout.
///
/// # Examples
///
/// ```rust
/// use zzcombat::SocketConfiguration;
///
/// let config = SocketConfiguration::new(4, &[(0, 1)]).unwrap();
/// assert_eq!(config.partner(0), Some(1));
/// assert_eq!(config.partner(1), Some(0));
/// assert_eq!(config.partner(2), None);
///
/// // A socket cannot be linked twice.
/// assert!(SocketConfiguration::new(4, &[(0, 1), (1, 2)]).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct SocketConfiguration {
    graph: UnGraph<usize, ()>,
    nodes: Vec<NodeIndex>,
    required_levels: Vec<u32>,
}

impl SocketConfiguration {
    /// Build a layout with no level requirements.
    pub fn new(socket_count: usize, linked_pairs: &[(usize, usize)]) -> Result<Self, CombatError> {
        let mut graph = UnGraph::new_undirected();
        let nodes: Vec<NodeIndex> = (0..socket_count).map(|i| graph.add_node(i)).collect();

        for &(a, b) in linked_pairs {
            for idx in [a, b] {
                if idx >= socket_count {
                    return Err(CombatError::IllegalSocket {
                        index: idx,
                        reason: format!("link references socket {idx} of {socket_count}"),
                    });
                }
            }
            if a == b {
                return Err(CombatError::IllegalSocket {
                    index: a,
                    reason: "socket linked to itself".into(),
                });
            }
            for idx in [a, b] {
                if graph.neighbors(nodes[idx]).next().is_some() {
                    return Err(CombatError::IllegalSocket {
                        index: idx,
                        reason: "socket already linked".into(),
                    });
                }
            }
            graph.add_edge(nodes[a], nodes[b], ());
        }

        Ok(Self {
            graph,
            nodes,
            required_levels: vec![1; socket_count],
        })
    }

    /// Build from species content.
    pub fn from_layout(layout: &SocketLayout) -> Result<Self, CombatError> {
        let mut config = Self::new(layout.socket_count, &layout.linked_pairs)?;
        for (i, &level) in layout.required_levels.iter().enumerate().take(layout.socket_count) {
            config.required_levels[i] = level.max(1);
        }
        Ok(config)
    }

    pub fn socket_count(&self) -> usize {
        self.nodes.len()
    }

    /// Linked partner of a socket, if any.
    pub fn partner(&self, index: usize) -> Option<usize> {
        let node = *self.nodes.get(index)?;
        self.graph.neighbors(node).next().map(|n| self.graph[n])
    }

    pub fn required_level(&self, index: usize) -> Option<u32> {
        self.required_levels.get(index).copied()
    }

    /// The socket array, each entry carrying its partner.
    pub fn sockets(&self) -> Vec<Socket> {
        (0..self.socket_count())
            .map(|index| Socket {
                index,
                linked_partner: self.partner(index),
                required_level: self.required_levels[index],
            })
            .collect()
    }

    /// Linked pairs, each reported once with the lower index first.
    pub fn linked_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs: Vec<(usize, usize)> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(a, b)| {
                let (a, b) = (self.graph[a], self.graph[b]);
                (a.min(b), a.max(b))
            })
            .collect();
        pairs.sort_unstable();
        pairs
    }

    /// Check that `index` exists and `level` meets its requirement.
    pub fn check_access(&self, index: usize, level: u32) -> Result<(), CombatError> {
        let required = self.required_level(index).ok_or_else(|| CombatError::IllegalSocket {
            index,
            reason: format!("only {} sockets", self.socket_count()),
        })?;
        if level < required {
            return Err(CombatError::IllegalSocket {
                index,
                reason: format!("requires level {required}, creature is level {level}"),
            });
        }
        Ok(())
    }
}
