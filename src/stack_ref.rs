// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cross-stack references.
//!
//! A stack publishes its exports as a ConfigMap named `<stack>-outputs`; other
//! stacks read them back through a [`StackOutputSource`]. Lookups are cached
//! per stack for the lifetime of one planning context.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{Api, Client};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info, instrument};

use crate::constants::STACK_OUTPUTS_SUFFIX;
use crate::error::{Result, StackwrightError};
use crate::output::Output;

/// Named outputs published by one stack.
pub type StackOutputs = BTreeMap<String, JsonValue>;

/// Where published stack outputs are read from.
#[async_trait]
pub trait StackOutputSource: Send + Sync {
    async fn fetch_outputs(&self, stack: &str) -> Result<StackOutputs>;
}

/// Name of the ConfigMap holding the outputs of `stack`.
pub fn outputs_config_map_name(stack: &str) -> String {
    format!("{}{}", stack, STACK_OUTPUTS_SUFFIX)
}

/// Encode outputs as ConfigMap data, one JSON document per key.
pub fn encode_outputs(outputs: &StackOutputs) -> Result<BTreeMap<String, String>> {
    outputs
        .iter()
        .map(|(k, v)| Ok((k.clone(), serde_json::to_string(v)?)))
        .collect()
}

fn decode_outputs(stack: &str, data: BTreeMap<String, String>) -> Result<StackOutputs> {
    data.into_iter()
        .map(|(key, raw)| {
            serde_json::from_str(&raw)
                .map(|value| (key.clone(), value))
                .map_err(|e| StackwrightError::InvalidStackOutput {
                    stack: stack.to_string(),
                    output: key,
                    reason: e.to_string(),
                })
        })
        .collect()
}

/// Reads outputs from ConfigMaps in the cluster.
pub struct KubeStackSource {
    client: Client,
    namespace: String,
}

impl KubeStackSource {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl StackOutputSource for KubeStackSource {
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    async fn fetch_outputs(&self, stack: &str) -> Result<StackOutputs> {
        let config_maps: Api<ConfigMap> = Api::namespaced(self.client.clone(), &self.namespace);
        let name = outputs_config_map_name(stack);

        info!("Reading outputs of stack '{}' from {}/{}", stack, self.namespace, name);

        let Some(config_map) = config_maps.get_opt(&name).await? else {
            return Err(StackwrightError::StackNotFound(stack.to_string()));
        };

        decode_outputs(stack, config_map.data.unwrap_or_default())
    }
}

/// Outputs known up front, for offline planning and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticStackSource {
    stacks: BTreeMap<String, StackOutputs>,
}

impl StaticStackSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stack(mut self, stack: impl Into<String>, outputs: StackOutputs) -> Self {
        self.stacks.insert(stack.into(), outputs);
        self
    }

    /// Parse a YAML mapping of stack name to outputs.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(Self {
            stacks: serde_yaml::from_str(yaml)?,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }
}

#[async_trait]
impl StackOutputSource for StaticStackSource {
    async fn fetch_outputs(&self, stack: &str) -> Result<StackOutputs> {
        self.stacks
            .get(stack)
            .cloned()
            .ok_or_else(|| StackwrightError::StackNotFound(stack.to_string()))
    }
}

/// Read-through cache of stack lookups. Clones share the cache.
#[derive(Clone)]
pub struct StackReferences {
    source: Arc<dyn StackOutputSource>,
    cache: Rc<RefCell<HashMap<String, Output<StackOutputs>>>>,
}

impl StackReferences {
    pub fn new(source: Arc<dyn StackOutputSource>) -> Self {
        Self {
            source,
            cache: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub fn get(&self, stack: &str) -> StackReference {
        let outputs = self
            .cache
            .borrow_mut()
            .entry(stack.to_string())
            .or_insert_with(|| {
                debug!("Creating reference to stack '{}'", stack);
                let source = self.source.clone();
                let name = stack.to_string();
                Output::from_future(async move { source.fetch_outputs(&name).await })
            })
            .clone();

        StackReference {
            stack: stack.to_string(),
            outputs,
        }
    }
}

thread_local! {
    static SCOPE: RefCell<Option<StackReferences>> = const { RefCell::new(None) };
}

struct ScopeGuard(Option<StackReferences>);

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let previous = self.0.take();
        SCOPE.with(|scope| *scope.borrow_mut() = previous);
    }
}

/// Run `f` with `references` available to [`StackOutputRef`]s being
/// deserialized on this thread.
pub fn with_references<R>(references: &StackReferences, f: impl FnOnce() -> R) -> R {
    let previous = SCOPE.with(|scope| scope.borrow_mut().replace(references.clone()));
    let _guard = ScopeGuard(previous);
    f()
}

/// A `stackOutput` value in a document: one output of another stack.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackOutputRef {
    pub stack: String,
    pub output: String,
}

impl StackOutputRef {
    /// Resolve against the references in scope, `None` outside [`with_references`].
    pub fn resolve<T>(&self) -> Option<Output<T>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        SCOPE.with(|scope| {
            scope
                .borrow()
                .as_ref()
                .map(|references| references.get(&self.stack).require_output(&self.output))
        })
    }
}

/// Handle on the outputs of another stack.
#[derive(Debug, Clone)]
pub struct StackReference {
    stack: String,
    outputs: Output<StackOutputs>,
}

impl StackReference {
    pub fn name(&self) -> &str {
        &self.stack
    }

    pub fn outputs(&self) -> &Output<StackOutputs> {
        &self.outputs
    }

    /// An output that may be absent.
    pub fn output(&self, key: &str) -> Output<Option<JsonValue>> {
        let key = key.to_string();
        self.outputs.map(move |outputs| outputs.get(&key).cloned())
    }

    /// An output that must exist and deserialize into `T`.
    pub fn require_output<T>(&self, key: &str) -> Output<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let stack = self.stack.clone();
        let key = key.to_string();
        self.outputs.try_map(move |outputs| {
            let value = outputs
                .get(&key)
                .cloned()
                .ok_or_else(|| StackwrightError::MissingStackOutput {
                    stack: stack.clone(),
                    output: key.clone(),
                })?;
            serde_json::from_value(value).map_err(|e| StackwrightError::InvalidStackOutput {
                stack,
                output: key,
                reason: e.to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{config_map_json, not_found_json, MockService};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StackOutputSource for CountingSource {
        async fn fetch_outputs(&self, _stack: &str) -> Result<StackOutputs> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(BTreeMap::from([("domain".to_string(), json!("example.com"))]))
        }
    }

    fn infra_source() -> StaticStackSource {
        StaticStackSource::new().with_stack(
            "infra",
            BTreeMap::from([
                ("domain".to_string(), json!("example.com")),
                ("replicas".to_string(), json!(3)),
            ]),
        )
    }

    #[tokio::test]
    async fn test_require_output_present() {
        let refs = StackReferences::new(Arc::new(infra_source()));
        let domain: String = refs.get("infra").require_output("domain").resolve().await.unwrap();
        let replicas: i32 = refs.get("infra").require_output("replicas").resolve().await.unwrap();

        assert_eq!(domain, "example.com");
        assert_eq!(replicas, 3);
    }

    #[tokio::test]
    async fn test_require_output_missing_fails() {
        let refs = StackReferences::new(Arc::new(infra_source()));
        let err = refs
            .get("infra")
            .require_output::<String>("registry")
            .resolve()
            .await
            .unwrap_err();

        assert!(matches!(
            err.root(),
            StackwrightError::MissingStackOutput { stack, output }
                if stack == "infra" && output == "registry"
        ));
    }

    #[tokio::test]
    async fn test_require_output_wrong_type_fails() {
        let refs = StackReferences::new(Arc::new(infra_source()));
        let err = refs
            .get("infra")
            .require_output::<i32>("domain")
            .resolve()
            .await
            .unwrap_err();

        assert!(matches!(err.root(), StackwrightError::InvalidStackOutput { .. }));
    }

    #[tokio::test]
    async fn test_optional_output_absent() {
        let refs = StackReferences::new(Arc::new(infra_source()));
        let value = refs.get("infra").output("registry").resolve().await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_unknown_stack_fails() {
        let refs = StackReferences::new(Arc::new(infra_source()));
        let err = refs.get("other").outputs().resolve().await.unwrap_err();
        assert!(matches!(err.root(), StackwrightError::StackNotFound(s) if s == "other"));
    }

    #[tokio::test]
    async fn test_references_are_fetched_once() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let refs = StackReferences::new(source.clone());

        let a = refs.get("infra").require_output::<String>("domain");
        let b = refs.get("infra").require_output::<String>("domain");
        a.resolve().await.unwrap();
        b.resolve().await.unwrap();
        refs.get("infra").outputs().resolve().await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_static_source_from_yaml() {
        let source = StaticStackSource::from_yaml("infra:\n  domain: example.com\n").unwrap();
        assert_eq!(source.stacks["infra"]["domain"], json!("example.com"));
    }

    #[test]
    fn test_encode_outputs_as_json() {
        let encoded = encode_outputs(&BTreeMap::from([
            ("domain".to_string(), json!("example.com")),
            ("ports".to_string(), json!([80, 443])),
        ]))
        .unwrap();

        assert_eq!(encoded["domain"], "\"example.com\"");
        assert_eq!(encoded["ports"], "[80,443]");
    }

    #[tokio::test]
    async fn test_kube_source_reads_config_map() {
        let client = MockService::new()
            .on_get(
                "/api/v1/namespaces/stackwright-system/configmaps/infra-outputs",
                200,
                &config_map_json(
                    "infra-outputs",
                    "stackwright-system",
                    &[("domain", "\"example.com\""), ("replicas", "3")],
                ),
            )
            .into_client();
        let source = KubeStackSource::new(client, "stackwright-system");

        let outputs = source.fetch_outputs("infra").await.unwrap();
        assert_eq!(outputs["domain"], json!("example.com"));
        assert_eq!(outputs["replicas"], json!(3));
    }

    #[tokio::test]
    async fn test_kube_source_missing_config_map() {
        let client = MockService::new()
            .on_get(
                "/api/v1/namespaces/stackwright-system/configmaps/infra-outputs",
                404,
                &not_found_json("configmaps", "infra-outputs"),
            )
            .into_client();
        let source = KubeStackSource::new(client, "stackwright-system");

        let err = source.fetch_outputs("infra").await.unwrap_err();
        assert!(matches!(err, StackwrightError::StackNotFound(s) if s == "infra"));
    }

    #[tokio::test]
    async fn test_kube_source_rejects_invalid_json() {
        let client = MockService::new()
            .on_get(
                "/api/v1/namespaces/stackwright-system/configmaps/infra-outputs",
                200,
                &config_map_json("infra-outputs", "stackwright-system", &[("domain", "not json")]),
            )
            .into_client();
        let source = KubeStackSource::new(client, "stackwright-system");

        let err = source.fetch_outputs("infra").await.unwrap_err();
        assert!(matches!(
            err,
            StackwrightError::InvalidStackOutput { output, .. } if output == "domain"
        ));
    }
}
