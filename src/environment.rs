// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Script environment descriptors and their merge rules.
//!
//! Merge policy per field:
//! - `distribution`: must agree across every environment that sets it
//! - `scripts`, `setup_scripts`, `cleanup_scripts`, `environment`: last wins by key
//! - `packages`, `volumes`, `volume_mounts`: concatenated, duplicates kept

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::core::v1::{
    ConfigMapKeySelector, EnvVar, EnvVarSource, ObjectFieldSelector, SecretKeySelector, Volume,
    VolumeMount,
};
use serde::{Deserialize, Serialize};

use crate::constants::images;
use crate::error::{Result, StackwrightError};
use crate::normalize::merge_arrays;
use crate::output::{Input, Output};

/// Base image family a script runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    Alpine,
    Ubuntu,
}

impl Distribution {
    pub fn image(&self) -> &'static str {
        match self {
            Distribution::Alpine => images::ALPINE,
            Distribution::Ubuntu => images::UBUNTU,
        }
    }

    /// Shell line installing `packages`, or `None` when there is nothing to install.
    ///
    /// Package names are shell-quoted; empty names and names that would be
    /// read as options are rejected.
    pub fn install_command(&self, packages: &[String]) -> Result<Option<String>> {
        if packages.is_empty() {
            return Ok(None);
        }
        let list = packages
            .iter()
            .map(|package| quote_package(package))
            .collect::<Result<Vec<_>>>()?
            .join(" ");
        Ok(Some(match self {
            Distribution::Alpine => format!("apk add --no-cache {}", list),
            Distribution::Ubuntu => format!(
                "apt-get update && DEBIAN_FRONTEND=noninteractive \
                 apt-get install -y --no-install-recommends {}",
                list
            ),
        }))
    }
}

fn quote_package(package: &str) -> Result<Cow<'_, str>> {
    let invalid = |reason: &str| {
        StackwrightError::InvalidArgument(format!("package '{}' {}", package, reason))
    };
    if package.trim().is_empty() {
        return Err(invalid("is empty"));
    }
    if package.starts_with('-') {
        return Err(invalid("looks like an option"));
    }
    shlex::try_quote(package).map_err(|e| invalid(&e.to_string()))
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Alpine => write!(f, "alpine"),
            Distribution::Ubuntu => write!(f, "ubuntu"),
        }
    }
}

/// Value of an environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    #[serde(rename_all = "camelCase")]
    SecretKey { secret: String, key: String },
    #[serde(rename_all = "camelCase")]
    ConfigMapKey { config_map: String, key: String },
    #[serde(rename_all = "camelCase")]
    FieldRef { field_path: String },
}

impl EnvValue {
    pub fn literal(value: impl Into<String>) -> Self {
        EnvValue::Literal(value.into())
    }

    pub fn secret_key(secret: impl Into<String>, key: impl Into<String>) -> Self {
        EnvValue::SecretKey {
            secret: secret.into(),
            key: key.into(),
        }
    }

    pub fn to_env_var(&self, name: &str) -> EnvVar {
        let (value, value_from) = match self {
            EnvValue::Literal(v) => (Some(v.clone()), None),
            EnvValue::SecretKey { secret, key } => (
                None,
                Some(EnvVarSource {
                    secret_key_ref: Some(SecretKeySelector {
                        name: secret.clone(),
                        key: key.clone(),
                        optional: None,
                    }),
                    ..Default::default()
                }),
            ),
            EnvValue::ConfigMapKey { config_map, key } => (
                None,
                Some(EnvVarSource {
                    config_map_key_ref: Some(ConfigMapKeySelector {
                        name: config_map.clone(),
                        key: key.clone(),
                        optional: None,
                    }),
                    ..Default::default()
                }),
            ),
            EnvValue::FieldRef { field_path } => (
                None,
                Some(EnvVarSource {
                    field_ref: Some(ObjectFieldSelector {
                        field_path: field_path.clone(),
                        api_version: None,
                    }),
                    ..Default::default()
                }),
            ),
        };

        EnvVar {
            name: name.to_string(),
            value,
            value_from,
        }
    }
}

/// Render a variable map as container env vars, sorted by name.
pub fn env_vars(environment: &BTreeMap<String, EnvValue>) -> Vec<EnvVar> {
    environment
        .iter()
        .map(|(name, value)| value.to_env_var(name))
        .collect()
}

/// Everything a script step needs from its container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptEnvironment {
    pub distribution: Option<Distribution>,
    pub packages: Vec<String>,
    pub scripts: BTreeMap<String, String>,
    pub setup_scripts: BTreeMap<String, String>,
    pub cleanup_scripts: BTreeMap<String, String>,
    pub environment: BTreeMap<String, EnvValue>,
    pub volumes: Vec<Volume>,
    pub volume_mounts: Vec<VolumeMount>,
}

impl ScriptEnvironment {
    pub fn new(distribution: Distribution) -> Self {
        Self {
            distribution: Some(distribution),
            ..Default::default()
        }
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.packages.push(package.into());
        self
    }

    pub fn with_script(mut self, name: impl Into<String>, body: impl Into<String>) -> Self {
        self.scripts.insert(name.into(), body.into());
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: EnvValue) -> Self {
        self.environment.insert(name.into(), value);
        self
    }

    /// Distribution to run on, Alpine when none was chosen.
    pub fn effective_distribution(&self) -> Distribution {
        self.distribution.unwrap_or(Distribution::Alpine)
    }

    /// Merge `other` on top of `self`.
    pub fn merge(mut self, other: ScriptEnvironment) -> Result<Self> {
        self.distribution = match (self.distribution, other.distribution) {
            (Some(expected), Some(found)) if expected != found => {
                return Err(StackwrightError::DistributionMismatch { expected, found });
            }
            (current, incoming) => current.or(incoming),
        };

        self.packages.extend(other.packages);
        self.scripts.extend(other.scripts);
        self.setup_scripts.extend(other.setup_scripts);
        self.cleanup_scripts.extend(other.cleanup_scripts);
        self.environment.extend(other.environment);
        self.volumes.extend(other.volumes);
        self.volume_mounts.extend(other.volume_mounts);
        Ok(self)
    }
}

/// Merge environments left to right.
pub fn merge_environments<I>(environments: I) -> Result<ScriptEnvironment>
where
    I: IntoIterator<Item = ScriptEnvironment>,
{
    environments
        .into_iter()
        .try_fold(ScriptEnvironment::default(), ScriptEnvironment::merge)
}

/// [`merge_environments`] over optional deferred environments.
pub fn merge_environment_inputs<I>(environments: I) -> Output<ScriptEnvironment>
where
    I: IntoIterator<Item = Option<Input<ScriptEnvironment>>>,
{
    let wrapped = environments
        .into_iter()
        .map(|env| env.map(|env| Input::Output(env.into_output().map(|e| vec![e]))));
    merge_arrays(wrapped).try_map(merge_environments)
}
