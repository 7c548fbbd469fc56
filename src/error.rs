// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use thiserror::Error;

use crate::environment::Distribution;

#[derive(Error, Debug)]
pub enum StackwrightError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Failed to create Kubernetes client: {0}")]
    KubeconfigError(String),

    #[error("Namespace creation failed: {0}")]
    NamespaceError(String),

    #[error("JSON serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML serialization failed: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cannot merge environments with different distributions: {expected} and {found}")]
    DistributionMismatch {
        expected: Distribution,
        found: Distribution,
    },

    #[error("Resource {0} is declared more than once")]
    DuplicateResource(String),

    #[error("Resource {resource} depends on {dependency}, which is not declared")]
    UnknownDependency { resource: String, dependency: String },

    #[error("Dependency cycle detected at {0}")]
    DependencyCycle(String),

    #[error("Stack '{0}' has no published outputs")]
    StackNotFound(String),

    #[error("Stack '{stack}' does not export '{output}'")]
    MissingStackOutput { stack: String, output: String },

    #[error("Output '{output}' of stack '{stack}' is invalid: {reason}")]
    InvalidStackOutput {
        stack: String,
        output: String,
        reason: String,
    },

    #[error("Match rule {0} has no conditions, at least one is required")]
    EmptyMatch(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid manifest for {0}")]
    InvalidManifest(String),

    #[error(transparent)]
    Deferred(#[from] Arc<StackwrightError>),
}

impl StackwrightError {
    /// The error that originally failed, looking through outputs that re-surfaced it.
    pub fn root(&self) -> &StackwrightError {
        match self {
            StackwrightError::Deferred(inner) => inner.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, StackwrightError>;
