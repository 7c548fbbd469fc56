// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The planning context.
//!
//! One [`Context`] exists per planning pass. Components register the objects
//! they declare with it, stacks export values through it, and references to
//! other stacks are resolved and cached in it. Graph construction is
//! single-threaded, so the context uses `RefCell` and is not `Sync`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use kube::discovery::ApiResource;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::constants::{annotations, labels, DEFAULT_OUTPUTS_NAMESPACE, FIELD_MANAGER};
use crate::error::{Result, StackwrightError};
use crate::output::Output;
use crate::plan::{Plan, PlannedResource};
use crate::resource::{Resource, ResourceOptions, ResourceRef};
use crate::stack_ref::{
    encode_outputs, outputs_config_map_name, with_references, StackOutputSource, StackOutputs,
    StackReference, StackReferences,
};

#[derive(Clone)]
struct Declaration {
    reference: ResourceRef,
    api_resource: ApiResource,
    dependencies: Vec<ResourceRef>,
    manifest: Output<JsonValue>,
}

pub struct Context {
    stack: String,
    outputs_namespace: String,
    declarations: RefCell<Vec<Declaration>>,
    exports: RefCell<BTreeMap<String, Output<JsonValue>>>,
    references: StackReferences,
}

impl Context {
    pub fn new(stack: impl Into<String>, source: Arc<dyn StackOutputSource>) -> Self {
        Self {
            stack: stack.into(),
            outputs_namespace: DEFAULT_OUTPUTS_NAMESPACE.to_string(),
            declarations: RefCell::new(Vec::new()),
            exports: RefCell::new(BTreeMap::new()),
            references: StackReferences::new(source),
        }
    }

    /// Namespace the outputs ConfigMap of this stack is published to.
    pub fn with_outputs_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.outputs_namespace = namespace.into();
        self
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    pub fn outputs_namespace(&self) -> &str {
        &self.outputs_namespace
    }

    /// Reference to the published outputs of another stack.
    pub fn stack_reference(&self, stack: &str) -> StackReference {
        self.references.get(stack)
    }

    /// Run `f` with this context's stack references available to
    /// `stackOutput` inputs deserialized inside it.
    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        with_references(&self.references, f)
    }

    /// References of everything declared so far, in declaration order.
    pub fn declared(&self) -> Vec<ResourceRef> {
        self.declarations
            .borrow()
            .iter()
            .map(|d| d.reference.clone())
            .collect()
    }

    /// Declare an object.
    ///
    /// Name and namespace are stamped onto the object's metadata along with
    /// the managed-by and stack labels. Dependencies are the parent, the
    /// explicit `depends_on` list and every resource `object` was derived from.
    pub fn register<K>(
        &self,
        name: &str,
        namespace: Option<&str>,
        object: Output<K>,
        options: ResourceOptions,
    ) -> Result<Resource<K>>
    where
        K: kube::Resource<DynamicType = ()> + Serialize + Clone + Send + Sync + 'static,
    {
        let reference = ResourceRef::of::<K>(namespace, name);

        if self
            .declarations
            .borrow()
            .iter()
            .any(|d| d.reference == reference)
        {
            return Err(StackwrightError::DuplicateResource(reference.to_string()));
        }

        let (declaration, stamped) = self.declare(reference.clone(), object, &options);
        debug!(
            "Declared {} with {} dependencies",
            reference,
            declaration.dependencies.len()
        );
        self.declarations.borrow_mut().push(declaration);

        Ok(Resource::new(reference, stamped))
    }

    fn declare<K>(
        &self,
        reference: ResourceRef,
        object: Output<K>,
        options: &ResourceOptions,
    ) -> (Declaration, Output<K>)
    where
        K: kube::Resource<DynamicType = ()> + Serialize + Clone + Send + Sync + 'static,
    {
        let mut dependencies: Vec<ResourceRef> = Vec::new();
        for dependency in options.edges().chain(object.dependencies().iter()) {
            if !dependencies.contains(dependency) {
                dependencies.push(dependency.clone());
            }
        }

        let stack = self.stack.clone();
        let parent = options.parent.clone();
        let target = reference.clone();
        let stamped = object.map(move |mut obj| {
            stamp_metadata(obj.meta_mut(), &target, &stack, parent.as_ref());
            obj
        });

        let manifest_ref = reference.clone();
        let manifest = stamped.try_map(move |obj| to_manifest(&obj, &manifest_ref));

        let declaration = Declaration {
            reference,
            api_resource: ApiResource::erase::<K>(&()),
            dependencies,
            manifest,
        };
        (declaration, stamped)
    }

    /// Publish a value for other stacks to reference.
    pub fn export<T>(&self, name: &str, value: Output<T>) -> Result<()>
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        let mut exports = self.exports.borrow_mut();
        if exports.contains_key(name) {
            return Err(StackwrightError::InvalidArgument(format!(
                "output '{}' is exported more than once",
                name
            )));
        }
        let encoded = value.try_map(|v| Ok(serde_json::to_value(v)?));
        exports.insert(name.to_string(), encoded);
        Ok(())
    }

    /// ConfigMap publishing the exports, when there are any.
    fn outputs_declaration(&self) -> Option<Declaration> {
        let exports = self.exports.borrow();
        if exports.is_empty() {
            return None;
        }

        let names: Vec<String> = exports.keys().cloned().collect();
        let values = Output::all(exports.values().cloned());
        let name = outputs_config_map_name(&self.stack);
        let namespace = self.outputs_namespace.clone();

        let config_map_name = name.clone();
        let config_map = values.try_map(move |values| {
            let outputs: StackOutputs = names.into_iter().zip(values).collect();
            Ok(ConfigMap {
                metadata: ObjectMeta {
                    name: Some(config_map_name),
                    namespace: Some(namespace),
                    ..Default::default()
                },
                data: Some(encode_outputs(&outputs)?),
                ..Default::default()
            })
        });

        let reference = ResourceRef::of::<ConfigMap>(Some(&self.outputs_namespace), &name);
        let (declaration, _) = self.declare(reference, config_map, &ResourceOptions::default());
        Some(declaration)
    }

    /// Resolve every declaration and order the result.
    pub async fn plan(&self) -> Result<Plan> {
        let mut declarations = self.declarations.borrow().clone();
        declarations.extend(self.outputs_declaration());

        info!(
            "Resolving {} declared resources for stack '{}'",
            declarations.len(),
            self.stack
        );

        let manifests =
            future::try_join_all(declarations.iter().map(|d| d.manifest.resolve())).await?;

        let resources = declarations
            .into_iter()
            .zip(manifests)
            .map(|(d, manifest)| PlannedResource {
                reference: d.reference,
                api_resource: d.api_resource,
                dependencies: d.dependencies,
                manifest,
            })
            .collect();

        Plan::new(self.stack.clone(), resources)
    }
}

fn stamp_metadata(
    meta: &mut ObjectMeta,
    reference: &ResourceRef,
    stack: &str,
    parent: Option<&ResourceRef>,
) {
    meta.name = Some(reference.name.clone());
    meta.namespace = reference.namespace.clone();

    let labels = meta.labels.get_or_insert_with(BTreeMap::new);
    labels.insert(labels::MANAGED_BY.to_string(), FIELD_MANAGER.to_string());
    labels.insert(labels::STACK.to_string(), stack.to_string());

    if let Some(parent) = parent {
        meta.annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(annotations::PARENT.to_string(), parent.to_string());
    }
}

fn to_manifest<K: Serialize>(object: &K, reference: &ResourceRef) -> Result<JsonValue> {
    let mut manifest = serde_json::to_value(object)?;
    let JsonValue::Object(fields) = &mut manifest else {
        return Err(StackwrightError::InvalidManifest(reference.to_string()));
    };
    fields
        .entry("apiVersion")
        .or_insert_with(|| JsonValue::String(reference.api_version.clone()));
    fields
        .entry("kind")
        .or_insert_with(|| JsonValue::String(reference.kind.clone()));
    Ok(manifest)
}
