// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Script bundles.
//!
//! A bundle renders one merged [`ScriptEnvironment`] into a ConfigMap holding
//! every script plus a generated `entrypoint.sh`. The entrypoint installs the
//! environment's packages, runs the setup scripts in key order, registers the
//! cleanup scripts on exit and finally runs its arguments.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{ConfigMap, ConfigMapVolumeSource, Container, Volume, VolumeMount};
use serde::Deserialize;

use super::non_empty;
use crate::constants::scripts::{CLEANUP_PREFIX, ENTRYPOINT, MOUNT_PATH, SETUP_PREFIX, VOLUME_NAME};
use crate::context::Context;
use crate::environment::{env_vars, ScriptEnvironment};
use crate::error::{Result, StackwrightError};
use crate::output::{Input, Output};
use crate::resource::{NamespaceRef, Resource, ResourceRef};

const MAX_KEY_LENGTH: usize = 253;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptBundleArgs {
    #[serde(default)]
    pub namespace: NamespaceRef,
    pub environment: Input<ScriptEnvironment>,
    #[serde(skip)]
    pub depends_on: Vec<ResourceRef>,
}

#[derive(Debug, Clone)]
pub struct ScriptBundle {
    pub config_map: Resource<ConfigMap>,
    /// The environment the bundle was rendered from
    pub environment: Output<ScriptEnvironment>,
}

impl ScriptBundle {
    pub fn name(&self) -> &str {
        self.config_map.name()
    }

    /// Volume exposing the bundle's ConfigMap.
    pub fn volume(&self) -> Volume {
        Volume {
            name: VOLUME_NAME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: self.name().to_string(),
                default_mode: Some(0o755),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// The bundle volume followed by the environment's own volumes.
    pub fn volumes(&self) -> Output<Vec<Volume>> {
        let bundle_volume = self.volume();
        self.config_map
            .object()
            .zip(&self.environment)
            .map(move |(_, env)| {
                let mut volumes = vec![bundle_volume];
                volumes.extend(env.volumes);
                volumes
            })
    }

    /// Container running `script` through the entrypoint.
    ///
    /// Fails at resolution when the bundle holds no such script.
    pub fn container(&self, name: &str, script: &str, args: Vec<String>) -> Output<Container> {
        let name = name.to_string();
        let script = script.to_string();
        self.config_map
            .object()
            .zip(&self.environment)
            .try_map(move |(config_map, env)| {
                if !config_map.data.unwrap_or_default().contains_key(&script) {
                    return Err(StackwrightError::InvalidArgument(format!(
                        "script bundle has no script '{}'",
                        script
                    )));
                }

                let mut volume_mounts = vec![VolumeMount {
                    name: VOLUME_NAME.to_string(),
                    mount_path: MOUNT_PATH.to_string(),
                    read_only: Some(true),
                    ..Default::default()
                }];
                volume_mounts.extend(env.volume_mounts.iter().cloned());

                let mut command_args = vec![format!("{}/{}", MOUNT_PATH, script)];
                command_args.extend(args);

                Ok(Container {
                    name,
                    image: Some(env.effective_distribution().image().to_string()),
                    command: Some(vec![
                        "/bin/sh".to_string(),
                        format!("{}/{}", MOUNT_PATH, ENTRYPOINT),
                        "/bin/sh".to_string(),
                    ]),
                    args: Some(command_args),
                    env: non_empty(env_vars(&env.environment)),
                    volume_mounts: Some(volume_mounts),
                    ..Default::default()
                })
            })
    }
}

pub fn create_script_bundle(
    ctx: &Context,
    name: &str,
    args: ScriptBundleArgs,
) -> Result<ScriptBundle> {
    let environment = args.environment.into_output();
    let config_map = environment.try_map(|env| {
        Ok(ConfigMap {
            data: Some(render_scripts(&env)?),
            ..Default::default()
        })
    });

    let config_map = ctx.register(
        name,
        Some(args.namespace.name()),
        config_map,
        args.namespace.child_options(&args.depends_on),
    )?;

    Ok(ScriptBundle {
        config_map,
        environment,
    })
}

/// ConfigMap data: scripts under their own names, setup and cleanup scripts
/// prefixed, plus the entrypoint.
pub fn render_scripts(env: &ScriptEnvironment) -> Result<BTreeMap<String, String>> {
    let mut data = BTreeMap::new();

    let entries = env
        .scripts
        .iter()
        .map(|(k, v)| (k.clone(), v))
        .chain(
            env.setup_scripts
                .iter()
                .map(|(k, v)| (format!("{}{}", SETUP_PREFIX, k), v)),
        )
        .chain(
            env.cleanup_scripts
                .iter()
                .map(|(k, v)| (format!("{}{}", CLEANUP_PREFIX, k), v)),
        );

    for (key, body) in entries {
        validate_key(&key)?;
        if key == ENTRYPOINT || data.insert(key.clone(), body.clone()).is_some() {
            return Err(StackwrightError::InvalidArgument(format!(
                "script key '{}' is used more than once",
                key
            )));
        }
    }

    data.insert(ENTRYPOINT.to_string(), render_entrypoint(env)?);
    Ok(data)
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !matches!(key, "" | "." | "..")
        && key.len() <= MAX_KEY_LENGTH
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(StackwrightError::InvalidArgument(format!(
            "'{}' is not a valid ConfigMap key",
            key
        )))
    }
}

fn render_entrypoint(env: &ScriptEnvironment) -> Result<String> {
    let mut lines = vec!["#!/bin/sh".to_string(), "set -e".to_string()];

    if let Some(install) = env.effective_distribution().install_command(&env.packages)? {
        lines.push(install);
    }

    if !env.cleanup_scripts.is_empty() {
        lines.push("cleanup() {".to_string());
        for key in env.cleanup_scripts.keys() {
            lines.push(format!("  /bin/sh {}/{}{} || true", MOUNT_PATH, CLEANUP_PREFIX, key));
        }
        lines.push("}".to_string());
        lines.push("trap cleanup EXIT".to_string());
    }

    for key in env.setup_scripts.keys() {
        lines.push(format!("/bin/sh {}/{}{}", MOUNT_PATH, SETUP_PREFIX, key));
    }

    lines.push("\"$@\"".to_string());
    Ok(lines.join("\n") + "\n")
}
