//! Join ordering.
//!
//! Aliases are nodes and join conditions are undirected edges. The planner
//! walks edges in declaration order from the first edge's left alias and
//! emits a left-deep sequence: each step joins one new table onto everything
//! joined so far.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;
use tracing::debug;

use super::{PlanError, PlanResult};
use crate::plan::JoinEdge;
use crate::resolver::ResolvedConfig;

/// Ordered join steps plus the conditions that close cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinPlan {
    /// Alias the sequence starts from.
    pub root: String,
    /// Steps in execution order; every step's `left_alias` is already joined.
    pub steps: Vec<JoinEdge>,
    /// Edges between two already-joined aliases, applied as filters.
    pub residual: Vec<JoinEdge>,
}

pub struct JoinPlanner<'a> {
    resolved: &'a ResolvedConfig,
}

impl<'a> JoinPlanner<'a> {
    pub fn new(resolved: &'a ResolvedConfig) -> Self {
        Self { resolved }
    }

    pub fn plan(&self) -> PlanResult<JoinPlan> {
        let tables = &self.resolved.tables;
        let edges = &self.resolved.joins;

        let first = tables
            .first()
            .ok_or_else(|| PlanError::InvalidJoin("no tables declared".into()))?;

        self.check_pairs()?;

        if tables.len() == 1 {
            return Ok(JoinPlan {
                root: first.alias.clone(),
                steps: Vec::new(),
                residual: Vec::new(),
            });
        }

        let mut graph: UnGraph<&str, usize> = UnGraph::new_undirected();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
        for table in tables {
            nodes.insert(table.alias.as_str(), graph.add_node(table.alias.as_str()));
        }
        let node = |alias: &str| {
            nodes
                .get(alias)
                .copied()
                .ok_or_else(|| PlanError::InvalidJoin(format!("undeclared alias '{}'", alias)))
        };
        for (i, edge) in edges.iter().enumerate() {
            graph.add_edge(node(&edge.left_alias)?, node(&edge.right_alias)?, i);
        }

        for table in tables {
            if graph.neighbors(node(&table.alias)?).next().is_none() {
                return Err(PlanError::UnjoinedTable {
                    alias: table.alias.clone(),
                });
            }
        }

        // Every table has an edge here, so there is at least one.
        let root = edges[0].left_alias.clone();

        let mut reached = HashSet::new();
        let mut bfs = Bfs::new(&graph, node(&root)?);
        while let Some(nx) = bfs.next(&graph) {
            reached.insert(graph[nx]);
        }
        let unreached: Vec<String> = tables
            .iter()
            .filter(|t| !reached.contains(t.alias.as_str()))
            .map(|t| t.alias.clone())
            .collect();
        if !unreached.is_empty() {
            return Err(PlanError::DisconnectedGraph { root, unreached });
        }

        let (steps, residual) = order_edges(&root, edges);

        debug!(
            root = %root,
            steps = steps.len(),
            residual = residual.len(),
            "planned joins"
        );

        Ok(JoinPlan {
            root,
            steps,
            residual,
        })
    }

    /// Reject self-joins and repeated alias pairs; the first declaration wins.
    fn check_pairs(&self) -> PlanResult<()> {
        let mut seen: HashSet<(&str, &str)> = HashSet::new();
        for edge in &self.resolved.joins {
            let (l, r) = (edge.left_alias.as_str(), edge.right_alias.as_str());
            if l == r {
                return Err(PlanError::SelfJoin {
                    alias: l.to_string(),
                });
            }
            let pair = if l < r { (l, r) } else { (r, l) };
            if !seen.insert(pair) {
                return Err(PlanError::DuplicateJoin {
                    left: l.to_string(),
                    right: r.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Walk edges in declaration order, repeatedly taking the first unused edge
/// with exactly one joined endpoint.
fn order_edges(root: &str, edges: &[JoinEdge]) -> (Vec<JoinEdge>, Vec<JoinEdge>) {
    let mut joined: HashSet<&str> = HashSet::from([root]);
    let mut used = vec![false; edges.len()];
    let mut steps = Vec::with_capacity(edges.len());

    loop {
        let next = edges.iter().enumerate().find(|(i, e)| {
            let left_in = joined.contains(e.left_alias.as_str());
            !used[*i] && left_in != joined.contains(e.right_alias.as_str())
        });
        let Some((i, edge)) = next else { break };

        used[i] = true;
        if joined.contains(edge.left_alias.as_str()) {
            joined.insert(edge.right_alias.as_str());
            steps.push(edge.clone());
        } else {
            joined.insert(edge.left_alias.as_str());
            steps.push(edge.reversed());
        }
    }

    let residual = edges
        .iter()
        .zip(&used)
        .filter(|(_, used)| !**used)
        .map(|(edge, _)| edge.clone())
        .collect();

    (steps, residual)
}
