// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deployments and StatefulSets, with an optional ClusterIP Service.

use std::collections::{BTreeMap, HashSet};

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use serde::Deserialize;

use super::non_empty;
use crate::constants::{labels, CLUSTER_DOMAIN};
use crate::context::Context;
use crate::environment::{env_vars, EnvValue};
use crate::error::{Result, StackwrightError};
use crate::normalize::{merge_objects, none_if_empty, normalize};
use crate::output::{Input, Output};
use crate::resource::{NamespaceRef, Resource, ResourceRef};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum WorkloadKind {
    #[default]
    Deployment,
    StatefulSet,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerArgs {
    /// Defaults to the workload name, suffixed with the index for extra containers
    pub name: Option<String>,
    pub image: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    /// Merged over the pod-wide environment
    pub environment: BTreeMap<String, EnvValue>,
    pub volume_mounts: Vec<VolumeMount>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortArgs {
    pub name: Option<String>,
    pub port: i32,
    /// Container port, defaults to `port`
    pub target_port: Option<i32>,
    pub protocol: Option<String>,
}

impl PortArgs {
    pub fn new(port: i32) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    pub fn named(name: &str, port: i32) -> Self {
        Self {
            name: Some(name.to_string()),
            port,
            ..Default::default()
        }
    }

    fn container_port(&self) -> ContainerPort {
        ContainerPort {
            name: self.name.clone(),
            container_port: self.target_port.unwrap_or(self.port),
            protocol: self.protocol.clone(),
            ..Default::default()
        }
    }

    fn service_port(&self) -> ServicePort {
        ServicePort {
            name: self.name.clone(),
            port: self.port,
            target_port: Some(IntOrString::Int(self.target_port.unwrap_or(self.port))),
            protocol: self.protocol.clone(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkloadArgs {
    pub namespace: NamespaceRef,
    pub kind: WorkloadKind,
    pub replicas: Option<i32>,
    pub container: Option<Input<ContainerArgs>>,
    pub containers: Option<Input<Vec<ContainerArgs>>>,
    /// Ports are exposed on the first container and through a Service
    pub port: Option<Input<PortArgs>>,
    pub ports: Option<Input<Vec<PortArgs>>>,
    pub volume: Option<Input<Volume>>,
    pub volumes: Option<Input<Vec<Volume>>>,
    /// Variables shared by every container
    pub environment: Option<Input<BTreeMap<String, EnvValue>>>,
    /// Extra pod labels
    pub labels: BTreeMap<String, String>,
    pub service_account_name: Option<String>,
    #[serde(skip)]
    pub depends_on: Vec<ResourceRef>,
}

#[derive(Debug, Clone)]
pub enum Workload {
    Deployment(Resource<Deployment>),
    StatefulSet(Resource<StatefulSet>),
}

impl Workload {
    pub fn reference(&self) -> &ResourceRef {
        match self {
            Workload::Deployment(r) => r.reference(),
            Workload::StatefulSet(r) => r.reference(),
        }
    }

    pub fn kind(&self) -> WorkloadKind {
        match self {
            Workload::Deployment(_) => WorkloadKind::Deployment,
            Workload::StatefulSet(_) => WorkloadKind::StatefulSet,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkloadBundle {
    pub workload: Workload,
    pub service: Option<Resource<Service>>,
    /// In-cluster DNS name of the service
    pub hostname: Option<Output<String>>,
}

impl WorkloadBundle {
    pub fn service_name(&self) -> Option<&str> {
        self.service.as_ref().map(|s| s.name())
    }
}

/// Cluster-local DNS name of a service.
pub fn service_hostname(name: &str, namespace: &str) -> String {
    format!("{}.{}.svc.{}", name, namespace, CLUSTER_DOMAIN)
}

fn selector_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(labels::NAME.to_string(), name.to_string())])
}

pub fn create_workload(ctx: &Context, name: &str, args: WorkloadArgs) -> Result<WorkloadBundle> {
    if args.container.is_none() && args.containers.is_none() {
        return Err(StackwrightError::InvalidArgument(format!(
            "workload {} declares no containers",
            name
        )));
    }

    let has_ports = args.port.is_some() || args.ports.is_some();
    let namespace = args.namespace.name().to_string();
    let options = args.namespace.child_options(&args.depends_on);
    let selector = selector_labels(name);

    let mut pod_labels = args.labels;
    pod_labels.extend(selector.clone());

    let containers = normalize(args.container, args.containers);
    let ports = normalize(args.port, args.ports).try_map(validate_ports);
    let volumes = normalize(args.volume, args.volumes);
    let pod_env = merge_objects([args.environment]);

    let workload_name = name.to_string();
    let service_account = args.service_account_name;
    let template = containers.zip(&ports).zip(&volumes.zip(&pod_env)).try_map(
        move |((containers, ports), (volumes, env))| {
            let pod_containers = build_containers(&workload_name, containers, &ports, &env)?;
            Ok(PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pod_labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: pod_containers,
                    volumes: non_empty(volumes),
                    service_account_name: service_account,
                    ..Default::default()
                }),
            })
        },
    );

    let label_selector = LabelSelector {
        match_labels: Some(selector.clone()),
        ..Default::default()
    };
    let replicas = args.replicas;

    let workload = match args.kind {
        WorkloadKind::Deployment => {
            let deployment = template.map(move |template| Deployment {
                spec: Some(DeploymentSpec {
                    replicas,
                    selector: label_selector,
                    template,
                    ..Default::default()
                }),
                ..Default::default()
            });
            Workload::Deployment(ctx.register(
                name,
                Some(namespace.as_str()),
                deployment,
                options.clone(),
            )?)
        }
        WorkloadKind::StatefulSet => {
            let service_name = name.to_string();
            let stateful_set = template.map(move |template| StatefulSet {
                spec: Some(StatefulSetSpec {
                    replicas,
                    selector: label_selector,
                    service_name: service_name.into(),
                    template,
                    ..Default::default()
                }),
                ..Default::default()
            });
            Workload::StatefulSet(ctx.register(
                name,
                Some(namespace.as_str()),
                stateful_set,
                options.clone(),
            )?)
        }
    };

    let service = if has_ports {
        let service_name = name.to_string();
        let service = none_if_empty(ports.into()).try_map(move |ports| {
            let ports = ports.ok_or_else(|| {
                StackwrightError::InvalidArgument(format!(
                    "workload {} declares a service without ports",
                    service_name
                ))
            })?;
            Ok(Service {
                spec: Some(ServiceSpec {
                    type_: Some("ClusterIP".to_string()),
                    selector: Some(selector),
                    ports: Some(ports.iter().map(PortArgs::service_port).collect()),
                    ..Default::default()
                }),
                ..Default::default()
            })
        });
        Some(ctx.register(name, Some(namespace.as_str()), service, options)?)
    } else {
        None
    };

    let hostname = service.as_ref().map(|service| {
        let host = service_hostname(name, &namespace);
        service.object().map(move |_| host)
    });

    Ok(WorkloadBundle {
        workload,
        service,
        hostname,
    })
}

fn validate_ports(ports: Vec<PortArgs>) -> Result<Vec<PortArgs>> {
    let mut seen = HashSet::new();
    for port in &ports {
        if port.port <= 0 || port.target_port.is_some_and(|p| p <= 0) {
            return Err(StackwrightError::InvalidArgument(format!(
                "invalid port {}",
                port.port
            )));
        }
        let protocol = port.protocol.as_deref().unwrap_or("TCP");
        if !seen.insert((port.port, protocol.to_string())) {
            return Err(StackwrightError::InvalidArgument(format!(
                "duplicate port {}/{}",
                port.port, protocol
            )));
        }
    }
    Ok(ports)
}

fn build_containers(
    workload: &str,
    containers: Vec<ContainerArgs>,
    ports: &[PortArgs],
    pod_env: &BTreeMap<String, EnvValue>,
) -> Result<Vec<Container>> {
    if containers.is_empty() {
        return Err(StackwrightError::InvalidArgument(format!(
            "workload {} declares no containers",
            workload
        )));
    }

    containers
        .into_iter()
        .enumerate()
        .map(|(i, container)| {
            if container.image.is_empty() {
                return Err(StackwrightError::InvalidArgument(format!(
                    "container {} of workload {} has no image",
                    i, workload
                )));
            }

            // Container variables win over pod-wide ones
            let mut env = pod_env.clone();
            env.extend(container.environment);

            let container_ports = if i == 0 {
                ports.iter().map(PortArgs::container_port).collect()
            } else {
                Vec::new()
            };

            Ok(Container {
                name: container.name.unwrap_or_else(|| match i {
                    0 => workload.to_string(),
                    _ => format!("{}-{}", workload, i),
                }),
                image: Some(container.image),
                command: non_empty(container.command),
                args: non_empty(container.args),
                env: non_empty(env_vars(&env)),
                ports: non_empty(container_ports),
                volume_mounts: non_empty(container.volume_mounts),
                ..Default::default()
            })
        })
        .collect()
}
