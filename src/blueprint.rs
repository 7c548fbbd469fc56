// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Blueprint documents.
//!
//! A blueprint is a YAML document of option records keyed by name, one map
//! per component kind. Namespaces named by other records resolve to the
//! blueprint's own namespace declarations when one exists, so everything
//! placed in them is applied after them. Workload hostnames and route URLs
//! are exported as `<name>-hostname` and `<name>-url`.
//!
//! Any input field may instead name an output of another stack:
//!
//! ```yaml
//! hostname:
//!   stackOutput: { stack: infra, output: domain }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::components::{
    create_certificate, create_chart, create_credentials, create_http_route, create_namespace,
    create_script_job, create_secret, create_workload, CertificateArgs, CertificateBundle,
    ChartArgs, ChartBundle, Credentials, CredentialsArgs, HttpRouteArgs, HttpRouteBundle,
    NamespaceArgs, NamespaceBundle, ScriptJobArgs, ScriptJobBundle, SecretArgs, SecretBundle,
    WorkloadArgs, WorkloadBundle,
};
use crate::context::Context;
use crate::error::{Result, StackwrightError};
use crate::normalize::merge_objects;
use crate::output::Input;
use crate::resource::NamespaceRef;

/// Exposes declared credentials to a workload as environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsBinding {
    pub name: String,
    pub username_var: String,
    pub password_var: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadEntry {
    #[serde(flatten)]
    pub args: WorkloadArgs,
    #[serde(default)]
    pub credentials: Vec<CredentialsBinding>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Blueprint {
    pub namespaces: BTreeMap<String, NamespaceArgs>,
    pub secrets: BTreeMap<String, SecretArgs>,
    pub credentials: BTreeMap<String, CredentialsArgs>,
    pub workloads: BTreeMap<String, WorkloadEntry>,
    pub script_jobs: BTreeMap<String, ScriptJobArgs>,
    pub routes: BTreeMap<String, HttpRouteArgs>,
    pub certificates: BTreeMap<String, CertificateArgs>,
    pub charts: BTreeMap<String, ChartArgs>,
}

/// Bundles declared from a blueprint, by name.
#[derive(Debug, Default)]
pub struct Composition {
    pub namespaces: BTreeMap<String, NamespaceBundle>,
    pub secrets: BTreeMap<String, SecretBundle>,
    pub credentials: BTreeMap<String, Credentials>,
    pub workloads: BTreeMap<String, WorkloadBundle>,
    pub script_jobs: BTreeMap<String, ScriptJobBundle>,
    pub routes: BTreeMap<String, HttpRouteBundle>,
    pub certificates: BTreeMap<String, CertificateBundle>,
    pub charts: BTreeMap<String, ChartBundle>,
}

impl Composition {
    fn namespace(&self, namespace: NamespaceRef) -> NamespaceRef {
        match namespace {
            NamespaceRef::Existing(name) => match self.namespaces.get(&name) {
                Some(bundle) => bundle.namespace_ref(),
                None => NamespaceRef::Existing(name),
            },
            managed => managed,
        }
    }
}

impl Blueprint {
    /// Parse a blueprint. `stackOutput` values resolve through the stack
    /// references of `ctx`.
    pub fn from_yaml(ctx: &Context, yaml: &str) -> Result<Self> {
        Ok(ctx.scope(|| serde_yaml::from_str(yaml))?)
    }

    pub fn from_file<P: AsRef<Path>>(ctx: &Context, path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(ctx, &content)
    }

    /// Declare every record into `ctx`.
    pub fn compose(self, ctx: &Context) -> Result<Composition> {
        let mut composed = Composition::default();

        for (name, args) in self.namespaces {
            let bundle = create_namespace(ctx, &name, args)?;
            composed.namespaces.insert(name, bundle);
        }

        for (name, mut args) in self.secrets {
            args.namespace = composed.namespace(args.namespace);
            let bundle = create_secret(ctx, &name, args)?;
            composed.secrets.insert(name, bundle);
        }

        for (name, mut args) in self.credentials {
            args.namespace = composed.namespace(args.namespace);
            let bundle = create_credentials(ctx, &name, args)?;
            composed.credentials.insert(name, bundle);
        }

        for (name, entry) in self.workloads {
            let mut args = entry.args;
            args.namespace = composed.namespace(args.namespace);

            if !entry.credentials.is_empty() {
                let mut layers = vec![args.environment.take()];
                for binding in &entry.credentials {
                    let credentials = composed.credentials.get(&binding.name).ok_or_else(|| {
                        StackwrightError::InvalidArgument(format!(
                            "workload {} uses undeclared credentials {}",
                            name, binding.name
                        ))
                    })?;
                    let env = credentials.environment(&binding.username_var, &binding.password_var);
                    layers.push(Some(Input::Output(env)));
                }
                args.environment = Some(Input::Output(merge_objects(layers)));
            }

            let bundle = create_workload(ctx, &name, args)?;
            if let Some(hostname) = &bundle.hostname {
                ctx.export(&format!("{}-hostname", name), hostname.clone())?;
            }
            composed.workloads.insert(name, bundle);
        }

        for (name, mut args) in self.script_jobs {
            args.namespace = composed.namespace(args.namespace);
            let bundle = create_script_job(ctx, &name, args)?;
            composed.script_jobs.insert(name, bundle);
        }

        for (name, mut args) in self.routes {
            args.namespace = composed.namespace(args.namespace);
            let bundle = create_http_route(ctx, &name, args)?;
            ctx.export(&format!("{}-url", name), bundle.url.clone())?;
            composed.routes.insert(name, bundle);
        }

        for (name, mut args) in self.certificates {
            args.namespace = composed.namespace(args.namespace);
            let bundle = create_certificate(ctx, &name, args)?;
            composed.certificates.insert(name, bundle);
        }

        for (name, mut args) in self.charts {
            args.namespace = composed.namespace(args.namespace);
            args.target_namespace = args.target_namespace.map(|ns| composed.namespace(ns));
            let bundle = create_chart(ctx, &name, args)?;
            composed.charts.insert(name, bundle);
        }

        info!(
            "Composed blueprint into {} resources for stack '{}'",
            ctx.declared().len(),
            ctx.stack()
        );
        Ok(composed)
    }
}
