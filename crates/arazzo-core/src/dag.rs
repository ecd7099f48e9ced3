// Copyright (c) 2025 Arazzo Engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Workflow-level dependency ordering.
//!
//! Operates over *workflow* `dependsOn` edges rather than step-level edges —
//! steps within one workflow execute strictly sequentially, so the only
//! graph that needs topological resolution is workflow-to-workflow.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use crate::error::{ArazzoError, Result};
use crate::model::Workflow;

pub struct Dag {
    graph: DiGraph<String, ()>,
    index_of: HashMap<String, NodeIndex>,
}

impl Dag {
    /// Builds the dependency graph from each workflow's `dependsOn` list.
    /// An edge `dep -> workflow` means `dep` must run before `workflow`.
    pub fn from_workflows(workflows: &[Workflow]) -> Self {
        let mut graph = DiGraph::new();
        let mut index_of = HashMap::new();
        for workflow in workflows {
            let idx = graph.add_node(workflow.workflow_id.clone());
            index_of.insert(workflow.workflow_id.clone(), idx);
        }
        for workflow in workflows {
            let to = index_of[&workflow.workflow_id];
            for dep in &workflow.depends_on {
                if let Some(&from) = index_of.get(dep) {
                    graph.add_edge(from, to, ());
                }
            }
        }
        Self { graph, index_of }
    }

    /// A valid run order: every workflow after all of its dependencies.
    pub fn execution_order(&self) -> Result<Vec<String>> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|idx| self.graph[idx].clone()).collect())
            .map_err(|cycle| {
                let id = &self.graph[cycle.node_id()];
                ArazzoError::document_invalid(
                    "$.workflows[*].dependsOn",
                    format!("dependency cycle detected at workflow '{id}'"),
                )
            })
    }

    pub fn contains(&self, workflow_id: &str) -> bool {
        self.index_of.contains_key(workflow_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow(id: &str, deps: &[&str]) -> Workflow {
        serde_json::from_value(serde_json::json!({
            "workflowId": id,
            "dependsOn": deps,
            "steps": [{"stepId": "s", "operationId": "op"}]
        }))
        .unwrap()
    }

    #[test]
    fn orders_dependencies_before_dependents() {
        let workflows = vec![workflow("b", &["a"]), workflow("a", &[])];
        let dag = Dag::from_workflows(&workflows);
        let order = dag.execution_order().unwrap();
        assert_eq!(order, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn detects_cycle() {
        let workflows = vec![workflow("a", &["b"]), workflow("b", &["a"])];
        let dag = Dag::from_workflows(&workflows);
        assert!(dag.execution_order().is_err());
    }
}
