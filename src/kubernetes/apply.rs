// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Server-side apply of a resolved plan.
//!
//! Waves are applied in order; the resources of one wave are applied
//! concurrently. The first failure stops the run, nothing is rolled back.

use std::collections::BTreeSet;

use futures::future;
use kube::api::{DynamicObject, Patch, PatchParams};
use kube::{Api, Client};
use tracing::{debug, info, instrument};

use super::namespaces::ensure_namespace_exists;
use crate::constants::FIELD_MANAGER;
use crate::error::Result;
use crate::plan::{Plan, PlannedResource};

/// What an apply run touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub waves: usize,
    pub applied: usize,
    /// Namespaces the plan used without declaring them
    pub external_namespaces: Vec<String>,
}

/// Namespaces referenced by namespaced resources but not declared in the plan.
pub fn external_namespaces(plan: &Plan) -> Vec<String> {
    let declared: BTreeSet<&str> = plan
        .resources()
        .iter()
        .filter(|r| r.reference.kind == "Namespace" && r.reference.namespace.is_none())
        .map(|r| r.reference.name.as_str())
        .collect();

    plan.resources()
        .iter()
        .filter_map(|r| r.reference.namespace.as_deref())
        .filter(|ns| !declared.contains(ns))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[instrument(skip(client, plan), fields(stack = %plan.stack()))]
pub async fn apply_plan(client: &Client, plan: &Plan) -> Result<ApplySummary> {
    let external = external_namespaces(plan);
    for namespace in &external {
        ensure_namespace_exists(client, namespace).await?;
    }

    let waves = plan.waves();
    info!(
        "Applying {} resources in {} waves for stack '{}'",
        plan.len(),
        waves.len(),
        plan.stack()
    );

    let mut applied = 0;
    for (i, wave) in waves.iter().enumerate() {
        debug!("Applying wave {} with {} resources", i + 1, wave.len());
        future::try_join_all(wave.iter().map(|resource| apply_resource(client, resource))).await?;
        applied += wave.len();
    }

    info!("Applied {} resources for stack '{}'", applied, plan.stack());
    Ok(ApplySummary {
        waves: waves.len(),
        applied,
        external_namespaces: external,
    })
}

async fn apply_resource(client: &Client, resource: &PlannedResource) -> Result<DynamicObject> {
    let api: Api<DynamicObject> = match &resource.reference.namespace {
        Some(namespace) => Api::namespaced_with(client.clone(), namespace, &resource.api_resource),
        None => Api::all_with(client.clone(), &resource.api_resource),
    };

    let pp = PatchParams::apply(FIELD_MANAGER).force();
    let applied = api
        .patch(&resource.reference.name, &pp, &Patch::Apply(&resource.manifest))
        .await?;

    debug!("Applied {}", resource.reference);
    Ok(applied)
}
