//! Stage dependency graph.
//!
//! The topology is fixed:
//!
//! ```text
//!                 ┌─► html   ─┐
//!                 ├─► css    ─┤     ┌─► serve
//!       clean ────┼─► js     ─┼─────┤
//!                 ├─► fonts  ─┤     └─► watch
//!                 └─► images ─┘
//! ```
//!
//! [`StageGraph::build`] layers it into phases. Nodes in one phase have no
//! edges between them and may run concurrently; a phase starts only after
//! the previous one finished.

use std::fmt;

use thiserror::Error;

use crate::{asset::AssetKind, cli::Task};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("stage graph has a cycle through: {}", join(.0))]
    Cycle(Vec<Node>),
}

fn join(nodes: &[Node]) -> String {
    nodes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A unit of work in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    /// Remove the whole output tree.
    Clean,
    /// The build stage for one asset kind.
    Content(AssetKind),
    /// Long-lived dev server.
    Serve,
    /// Long-lived file watches.
    Watch,
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => f.write_str("clean"),
            Self::Content(kind) => f.write_str(kind.name()),
            Self::Serve => f.write_str("serve"),
            Self::Watch => f.write_str("watch"),
        }
    }
}

/// Phases in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    phases: Vec<Vec<Node>>,
}

impl ExecutionPlan {
    pub fn phases(&self) -> &[Vec<Node>] {
        &self.phases
    }

    pub fn contains(&self, node: Node) -> bool {
        self.nodes().any(|n| n == node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = Node> + '_ {
        self.phases.iter().flatten().copied()
    }

    /// Content stages of the plan, in declaration order.
    pub fn content_kinds(&self) -> Vec<AssetKind> {
        self.nodes()
            .filter_map(|n| match n {
                Node::Content(kind) => Some(kind),
                _ => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

pub struct StageGraph {
    nodes: Vec<Node>,
    /// `(from, to)`: `to` starts after `from` finished.
    edges: Vec<(Node, Node)>,
}

impl Default for StageGraph {
    fn default() -> Self {
        let content = AssetKind::ALL.map(Node::Content);

        let mut nodes = vec![Node::Clean];
        nodes.extend(content);
        nodes.extend([Node::Serve, Node::Watch]);

        let mut edges = Vec::with_capacity(content.len() * 3);
        for &node in &content {
            edges.push((Node::Clean, node));
            edges.push((node, Node::Serve));
            edges.push((node, Node::Watch));
        }

        Self { nodes, edges }
    }
}

impl StageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer the whole graph with Kahn's algorithm.
    ///
    /// Within a phase nodes keep their declaration order.
    pub fn build(&self) -> Result<ExecutionPlan, GraphError> {
        let index = |node: Node| self.nodes.iter().position(|&n| n == node);

        let mut in_degree = vec![0usize; self.nodes.len()];
        for &(_, to) in &self.edges {
            if let Some(i) = index(to) {
                in_degree[i] += 1;
            }
        }

        let mut placed = vec![false; self.nodes.len()];
        let mut phases = Vec::new();
        loop {
            let ready: Vec<usize> = (0..self.nodes.len())
                .filter(|&i| !placed[i] && in_degree[i] == 0)
                .collect();
            if ready.is_empty() {
                break;
            }

            for &i in &ready {
                placed[i] = true;
                let node = self.nodes[i];
                for &(from, to) in &self.edges {
                    if from == node
                        && let Some(j) = index(to)
                    {
                        in_degree[j] -= 1;
                    }
                }
            }
            phases.push(ready.into_iter().map(|i| self.nodes[i]).collect());
        }

        let remaining: Vec<Node> = (0..self.nodes.len())
            .filter(|&i| !placed[i])
            .map(|i| self.nodes[i])
            .collect();
        if !remaining.is_empty() {
            return Err(GraphError::Cycle(remaining));
        }

        Ok(ExecutionPlan { phases })
    }

    /// The plan restricted to what `task` needs.
    pub fn plan(&self, task: Task) -> Result<ExecutionPlan, GraphError> {
        let full = self.build()?;
        let wanted = |node: &Node| match task {
            Task::Clean => *node == Node::Clean,
            Task::Build => matches!(node, Node::Clean | Node::Content(_)),
            Task::Watch | Task::Default => true,
            single => task_kind(single).is_some_and(|kind| *node == Node::Content(kind)),
        };

        let phases = full
            .phases
            .into_iter()
            .map(|phase| phase.into_iter().filter(wanted).collect::<Vec<_>>())
            .filter(|phase| !phase.is_empty())
            .collect();
        Ok(ExecutionPlan { phases })
    }
}

/// The asset kind behind a single-stage task.
pub fn task_kind(task: Task) -> Option<AssetKind> {
    match task {
        Task::Html => Some(AssetKind::Html),
        Task::Css => Some(AssetKind::Css),
        Task::Js => Some(AssetKind::Js),
        Task::Fonts => Some(AssetKind::Fonts),
        Task::Images => Some(AssetKind::Images),
        Task::Clean | Task::Build | Task::Watch | Task::Default => None,
    }
}
