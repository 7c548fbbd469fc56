// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resolved plans.
//!
//! A [`Plan`] holds every declared manifest with its dependencies resolved,
//! checked for unknown references and cycles, and grouped into apply waves:
//! each wave only depends on earlier waves, so its members can be applied
//! concurrently.

use std::collections::HashMap;

use kube::discovery::ApiResource;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde_json::Value as JsonValue;

use crate::error::{Result, StackwrightError};
use crate::resource::ResourceRef;

/// One declared object with its manifest resolved.
#[derive(Debug, Clone)]
pub struct PlannedResource {
    pub reference: ResourceRef,
    pub api_resource: ApiResource,
    pub dependencies: Vec<ResourceRef>,
    pub manifest: JsonValue,
}

#[derive(Debug, Clone)]
pub struct Plan {
    stack: String,
    resources: Vec<PlannedResource>,
    waves: Vec<Vec<usize>>,
}

impl Plan {
    /// Build a plan from resources in declaration order.
    pub fn new(stack: impl Into<String>, resources: Vec<PlannedResource>) -> Result<Self> {
        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let mut nodes: HashMap<&ResourceRef, NodeIndex> = HashMap::new();

        for (i, resource) in resources.iter().enumerate() {
            let idx = graph.add_node(i);
            if nodes.insert(&resource.reference, idx).is_some() {
                return Err(StackwrightError::DuplicateResource(
                    resource.reference.to_string(),
                ));
            }
        }

        for resource in &resources {
            let dependent = nodes[&resource.reference];
            for dependency in &resource.dependencies {
                let Some(&dep_idx) = nodes.get(dependency) else {
                    return Err(StackwrightError::UnknownDependency {
                        resource: resource.reference.to_string(),
                        dependency: dependency.to_string(),
                    });
                };
                // Edge from dependency to dependent
                graph.add_edge(dep_idx, dependent, ());
            }
        }

        let sorted = toposort(&graph, None).map_err(|cycle| {
            let resource = &resources[graph[cycle.node_id()]];
            StackwrightError::DependencyCycle(resource.reference.to_string())
        })?;

        let waves = compute_waves(&graph, &sorted);

        Ok(Self {
            stack: stack.into(),
            resources,
            waves,
        })
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Resources in declaration order.
    pub fn resources(&self) -> &[PlannedResource] {
        &self.resources
    }

    pub fn get(&self, reference: &ResourceRef) -> Option<&PlannedResource> {
        self.resources.iter().find(|r| &r.reference == reference)
    }

    /// Resources grouped into apply waves.
    pub fn waves(&self) -> Vec<Vec<&PlannedResource>> {
        self.waves
            .iter()
            .map(|wave| wave.iter().map(|&i| &self.resources[i]).collect())
            .collect()
    }

    /// Resources in apply order: wave by wave, declaration order within a wave.
    pub fn ordered(&self) -> impl Iterator<Item = &PlannedResource> {
        self.waves.iter().flatten().map(|&i| &self.resources[i])
    }

    /// Render the plan as a multi-document YAML stream in apply order.
    pub fn to_yaml(&self) -> Result<String> {
        let mut out = String::new();
        for resource in self.ordered() {
            out.push_str("---\n");
            out.push_str(&serde_yaml::to_string(&resource.manifest)?);
        }
        Ok(out)
    }
}

/// Longest-path layering: a node's wave is one past its deepest dependency.
fn compute_waves(graph: &DiGraph<usize, ()>, sorted: &[NodeIndex]) -> Vec<Vec<usize>> {
    let mut level = vec![0usize; graph.node_count()];

    for &idx in sorted {
        level[graph[idx]] = graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|dep| level[graph[dep]] + 1)
            .max()
            .unwrap_or(0);
    }

    let depth = level.iter().max().map_or(0, |deepest| deepest + 1);
    let mut waves = vec![Vec::new(); depth];
    for (i, &l) in level.iter().enumerate() {
        waves[l].push(i);
    }
    waves
}
