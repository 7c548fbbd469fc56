// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use crate::constants::DEFAULT_OUTPUTS_NAMESPACE;

/// Driver configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Name of the stack being planned
    pub stack_name: String,
    pub blueprint_path: PathBuf,
    /// Namespace stack outputs are published to and read from
    pub outputs_namespace: String,
    /// Print the plan instead of applying it
    pub dry_run: bool,
    /// YAML file with outputs of other stacks, used instead of the cluster
    pub stack_outputs_file: Option<PathBuf>,
    /// Kubeconfig context, the current one when unset
    pub kube_context: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let stack_name =
            lookup("STACK_NAME").context("STACK_NAME environment variable not set")?;
        let blueprint_path = lookup("BLUEPRINT_PATH")
            .unwrap_or_else(|| "blueprint.yaml".to_string())
            .into();
        let outputs_namespace = lookup("OUTPUTS_NAMESPACE")
            .unwrap_or_else(|| DEFAULT_OUTPUTS_NAMESPACE.to_string());
        let dry_run = match lookup("DRY_RUN") {
            Some(value) => value
                .parse()
                .with_context(|| format!("DRY_RUN must be true or false, got '{}'", value))?,
            None => false,
        };

        Ok(Config {
            stack_name,
            blueprint_path,
            outputs_namespace,
            dry_run,
            stack_outputs_file: lookup("STACK_OUTPUTS_FILE").map(PathBuf::from),
            kube_context: lookup("KUBE_CONTEXT"),
        })
    }
}
