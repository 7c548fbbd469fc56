// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Identity and handles for declared resources.

use std::fmt;

use serde::{Deserialize, Deserializer};

use crate::output::Output;

/// Stable identity of a declared Kubernetes object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceRef {
    pub api_version: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceRef {
    pub fn new(api_version: &str, kind: &str, namespace: Option<&str>, name: &str) -> Self {
        Self {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }

    /// Reference to an object of the statically known type `K`.
    pub fn of<K>(namespace: Option<&str>, name: &str) -> Self
    where
        K: kube::Resource<DynamicType = ()>,
    {
        Self {
            api_version: K::api_version(&()).into_owned(),
            kind: K::kind(&()).into_owned(),
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Edges attached to a declaration.
#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
    /// The owning resource, typically the namespace.
    pub parent: Option<ResourceRef>,
    /// Resources that must be applied first.
    pub depends_on: Vec<ResourceRef>,
}

impl ResourceOptions {
    pub fn child_of(parent: Option<&ResourceRef>) -> Self {
        Self {
            parent: parent.cloned(),
            depends_on: Vec::new(),
        }
    }

    pub fn depends_on<I>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = ResourceRef>,
    {
        self.depends_on.extend(resources);
        self
    }

    /// All edges, parent first.
    pub fn edges(&self) -> impl Iterator<Item = &ResourceRef> {
        self.parent.iter().chain(self.depends_on.iter())
    }
}

/// Handle to a declared object of type `K`.
#[derive(Debug, Clone)]
pub struct Resource<K> {
    reference: ResourceRef,
    object: Output<K>,
}

impl<K> Resource<K>
where
    K: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(reference: ResourceRef, object: Output<K>) -> Self {
        Self {
            object: object.with_dependency(reference.clone()),
            reference,
        }
    }

    pub fn reference(&self) -> &ResourceRef {
        &self.reference
    }

    pub fn name(&self) -> &str {
        &self.reference.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.reference.namespace.as_deref()
    }

    /// The declared object; values read from it depend on this resource.
    pub fn object(&self) -> &Output<K> {
        &self.object
    }
}

/// Namespace a component is placed in.
///
/// A managed namespace is declared in the same plan and becomes the parent of
/// everything placed in it; an existing one is only referred to by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceRef {
    Managed { name: String, resource: ResourceRef },
    Existing(String),
}

impl NamespaceRef {
    pub fn name(&self) -> &str {
        match self {
            NamespaceRef::Managed { name, .. } => name,
            NamespaceRef::Existing(name) => name,
        }
    }

    pub fn resource(&self) -> Option<&ResourceRef> {
        match self {
            NamespaceRef::Managed { resource, .. } => Some(resource),
            NamespaceRef::Existing(_) => None,
        }
    }

    /// Options for a child of this namespace with extra dependencies.
    pub fn child_options(&self, depends_on: &[ResourceRef]) -> ResourceOptions {
        ResourceOptions::child_of(self.resource()).depends_on(depends_on.iter().cloned())
    }
}

impl Default for NamespaceRef {
    fn default() -> Self {
        NamespaceRef::Existing("default".to_string())
    }
}

impl From<&str> for NamespaceRef {
    fn from(name: &str) -> Self {
        NamespaceRef::Existing(name.to_string())
    }
}

impl From<String> for NamespaceRef {
    fn from(name: String) -> Self {
        NamespaceRef::Existing(name)
    }
}

impl<'de> Deserialize<'de> for NamespaceRef {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(NamespaceRef::Existing)
    }
}
