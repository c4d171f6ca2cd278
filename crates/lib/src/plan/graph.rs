//! Dependency graph over a plan's steps.
//!
//! The plan itself is a flat, ordered list. The graph view answers the
//! questions a backend asks of it: is it acyclic, and which steps can run
//! together.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

use super::types::{BuildStep, StepName};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
  #[error("step '{step}' depends on unknown step '{dependency}'")]
  UnknownDependency { step: StepName, dependency: StepName },

  #[error("dependency cycle detected")]
  CycleDetected,
}

/// Steps as nodes, `dependency -> dependent` as edges.
pub struct PlanGraph {
  graph: DiGraph<StepName, ()>,
  nodes: HashMap<StepName, NodeIndex>,
}

impl PlanGraph {
  pub fn from_steps(steps: &[BuildStep]) -> Result<Self, GraphError> {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();

    for step in steps {
      let idx = graph.add_node(step.name.clone());
      nodes.insert(step.name.clone(), idx);
    }

    for step in steps {
      let to = nodes[&step.name];
      for dep in &step.depends_on {
        let from = *nodes.get(dep).ok_or_else(|| GraphError::UnknownDependency {
          step: step.name.clone(),
          dependency: dep.clone(),
        })?;
        graph.add_edge(from, to, ());
      }
    }

    let dag = Self { graph, nodes };
    dag.verify_acyclic()?;
    Ok(dag)
  }

  fn verify_acyclic(&self) -> Result<(), GraphError> {
    toposort(&self.graph, None).map_err(|_| GraphError::CycleDetected)?;
    Ok(())
  }

  pub fn step_count(&self) -> usize {
    self.graph.node_count()
  }

  /// Direct dependencies of `name`, sorted.
  pub fn dependencies(&self, name: &StepName) -> Vec<StepName> {
    let Some(&idx) = self.nodes.get(name) else {
      return Vec::new();
    };
    let mut deps: Vec<_> = self
      .graph
      .neighbors_directed(idx, Direction::Incoming)
      .map(|n| self.graph[n].clone())
      .collect();
    deps.sort();
    deps
  }

  /// Groups of steps whose dependencies are all satisfied by earlier groups.
  ///
  /// Within a wave, steps keep their plan order.
  pub fn waves(&self) -> Vec<Vec<StepName>> {
    let mut in_degree: Vec<usize> = self
      .graph
      .node_indices()
      .map(|idx| self.graph.neighbors_directed(idx, Direction::Incoming).count())
      .collect();
    let mut remaining: Vec<NodeIndex> = self.graph.node_indices().collect();
    let mut waves = Vec::new();

    // Acyclic by construction, so every round makes progress.
    while !remaining.is_empty() {
      let (ready, rest): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|idx| in_degree[idx.index()] == 0);

      for &idx in &ready {
        for neighbor in self.graph.neighbors_directed(idx, Direction::Outgoing) {
          in_degree[neighbor.index()] = in_degree[neighbor.index()].saturating_sub(1);
        }
      }

      waves.push(ready.iter().map(|&idx| self.graph[idx].clone()).collect());
      remaining = rest;
    }

    waves
  }
}
