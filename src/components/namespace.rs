// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace declaration.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Namespace;
use kube::api::ObjectMeta;
use serde::Deserialize;

use crate::constants::labels;
use crate::context::Context;
use crate::error::Result;
use crate::output::Output;
use crate::resource::{NamespaceRef, Resource, ResourceOptions};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NamespaceArgs {
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    /// Enforce the `privileged` Pod Security level instead of the cluster default
    pub privileged: bool,
}

#[derive(Debug, Clone)]
pub struct NamespaceBundle {
    pub namespace: Resource<Namespace>,
}

impl NamespaceBundle {
    pub fn name(&self) -> &str {
        self.namespace.name()
    }

    /// Reference for components placed in this namespace.
    pub fn namespace_ref(&self) -> NamespaceRef {
        NamespaceRef::Managed {
            name: self.name().to_string(),
            resource: self.namespace.reference().clone(),
        }
    }
}

impl From<&NamespaceBundle> for NamespaceRef {
    fn from(bundle: &NamespaceBundle) -> Self {
        bundle.namespace_ref()
    }
}

pub fn create_namespace(ctx: &Context, name: &str, args: NamespaceArgs) -> Result<NamespaceBundle> {
    let mut namespace_labels = args.labels;
    if args.privileged {
        namespace_labels.insert(
            labels::POD_SECURITY_ENFORCE.to_string(),
            "privileged".to_string(),
        );
    }

    let namespace = Namespace {
        metadata: ObjectMeta {
            labels: Some(namespace_labels),
            annotations: (!args.annotations.is_empty()).then_some(args.annotations),
            ..Default::default()
        },
        ..Default::default()
    };

    let namespace = ctx.register(name, None, Output::new(namespace), ResourceOptions::default())?;
    Ok(NamespaceBundle { namespace })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_context;

    #[tokio::test]
    async fn test_create_namespace() {
        let ctx = test_context();
        let bundle = create_namespace(
            &ctx,
            "apps",
            NamespaceArgs {
                labels: BTreeMap::from([("team".to_string(), "platform".to_string())]),
                ..Default::default()
            },
        )
        .unwrap();

        let ns = bundle.namespace.object().resolve().await.unwrap();
        let ns_labels = ns.metadata.labels.unwrap();
        assert_eq!(ns_labels["team"], "platform");
        assert!(!ns_labels.contains_key(labels::POD_SECURITY_ENFORCE));
        assert!(ns.metadata.annotations.is_none());
    }

    #[tokio::test]
    async fn test_privileged_namespace_label() {
        let ctx = test_context();
        let bundle = create_namespace(
            &ctx,
            "vpn",
            NamespaceArgs {
                privileged: true,
                ..Default::default()
            },
        )
        .unwrap();

        let ns = bundle.namespace.object().resolve().await.unwrap();
        assert_eq!(ns.metadata.labels.unwrap()[labels::POD_SECURITY_ENFORCE], "privileged");
    }

    #[test]
    fn test_bundle_as_namespace_ref() {
        let ctx = test_context();
        let bundle = create_namespace(&ctx, "apps", NamespaceArgs::default()).unwrap();
        let ns_ref = NamespaceRef::from(&bundle);

        assert_eq!(ns_ref.name(), "apps");
        assert_eq!(ns_ref.resource(), Some(bundle.namespace.reference()));
    }
}
