// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Composition helpers.
//!
//! Each helper takes an options record, declares one or more objects into a
//! [`Context`](crate::context::Context) and returns a bundle of handles and
//! derived outputs.

pub mod certificate;
pub mod chart;
pub mod job;
pub mod namespace;
pub mod route;
pub mod script;
pub mod secret;
pub mod workload;

pub use certificate::{create_certificate, CertificateArgs, CertificateBundle, IssuerRef};
pub use chart::{create_chart, ChartArgs, ChartBundle};
pub use job::{create_script_job, ScriptJob, ScriptJobArgs, ScriptJobBundle};
pub use namespace::{create_namespace, NamespaceArgs, NamespaceBundle};
pub use route::{create_http_route, GatewayRef, HttpRouteArgs, HttpRouteBundle};
pub use script::{create_script_bundle, ScriptBundle, ScriptBundleArgs};
pub use secret::{
    create_credentials, create_secret, Credentials, CredentialsArgs, SecretArgs, SecretBundle,
};
pub use workload::{
    create_workload, ContainerArgs, PortArgs, Workload, WorkloadArgs, WorkloadBundle, WorkloadKind,
};

/// `None` for empty lists, so optional API fields stay unset.
pub(crate) fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}
