// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deferred values.
//!
//! An [`Output`] is a value that may not be known while the plan is being
//! declared. It is backed by a shared future, so every consumer observes the
//! same result and `map` closures run at most once. Each output also records
//! the resources it was derived from, which become dependency edges when the
//! output flows into another resource.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt, Shared};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};

use crate::error::{Result, StackwrightError};
use crate::resource::ResourceRef;
use crate::stack_ref::StackOutputRef;

type SharedResult<T> = std::result::Result<T, Arc<StackwrightError>>;

/// A deferred value together with the resources it depends on.
pub struct Output<T> {
    future: Shared<BoxFuture<'static, SharedResult<T>>>,
    dependencies: BTreeSet<ResourceRef>,
}

impl<T> Clone for Output<T> {
    fn clone(&self) -> Self {
        Self {
            future: self.future.clone(),
            dependencies: self.dependencies.clone(),
        }
    }
}

impl<T> fmt::Debug for Output<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("resolved", &self.future.peek().is_some())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

impl<T> Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// An output that is already known.
    pub fn new(value: T) -> Self {
        Self::from_shared(future::ready(Ok(value)).boxed(), BTreeSet::new())
    }

    /// An output computed by `future` the first time anyone resolves it.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self::from_shared(
            async move { future.await.map_err(Arc::new) }.boxed(),
            BTreeSet::new(),
        )
    }

    /// An output that always fails with `error`.
    pub fn failed(error: StackwrightError) -> Self {
        Self::from_shared(future::ready(Err(Arc::new(error))).boxed(), BTreeSet::new())
    }

    fn from_shared(
        future: BoxFuture<'static, SharedResult<T>>,
        dependencies: BTreeSet<ResourceRef>,
    ) -> Self {
        Self {
            future: future.shared(),
            dependencies,
        }
    }

    /// Record that this value is derived from `resource`.
    pub fn with_dependency(mut self, resource: ResourceRef) -> Self {
        self.dependencies.insert(resource);
        self
    }

    pub fn dependencies(&self) -> &BTreeSet<ResourceRef> {
        &self.dependencies
    }

    /// Wait for the value.
    pub async fn resolve(&self) -> Result<T> {
        self.future.clone().await.map_err(StackwrightError::Deferred)
    }

    /// The value, if it has already been computed.
    pub fn peek(&self) -> Option<T> {
        self.future.peek().and_then(|r| r.as_ref().ok().cloned())
    }

    /// Transform the eventual value.
    pub fn map<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let inner = self.future.clone();
        Output::from_shared(
            async move { inner.await.map(f) }.boxed(),
            self.dependencies.clone(),
        )
    }

    /// Transform the eventual value with a fallible function.
    pub fn try_map<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        let inner = self.future.clone();
        Output::from_shared(
            async move { inner.await.and_then(|v| f(v).map_err(Arc::new)) }.boxed(),
            self.dependencies.clone(),
        )
    }

    /// Chain another deferred computation.
    ///
    /// Only the dependencies of `self` are known up front; those of the
    /// output returned by `f` are not tracked.
    pub fn and_then<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Output<U> + Send + 'static,
    {
        let inner = self.future.clone();
        Output::from_shared(
            async move {
                let value = inner.await?;
                f(value).future.await
            }
            .boxed(),
            self.dependencies.clone(),
        )
    }

    /// Combine two outputs into a pair.
    pub fn zip<U>(&self, other: &Output<U>) -> Output<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let left = self.future.clone();
        let right = other.future.clone();
        let dependencies = self
            .dependencies
            .union(&other.dependencies)
            .cloned()
            .collect();
        Output::from_shared(
            async move { future::try_join(left, right).await }.boxed(),
            dependencies,
        )
    }

    /// Join outputs into one output of all their values, in order.
    pub fn all<I>(outputs: I) -> Output<Vec<T>>
    where
        I: IntoIterator<Item = Output<T>>,
    {
        let mut dependencies = BTreeSet::new();
        let futures: Vec<_> = outputs
            .into_iter()
            .map(|o| {
                dependencies.extend(o.dependencies);
                o.future
            })
            .collect();
        Output::from_shared(
            async move { future::try_join_all(futures).await }.boxed(),
            dependencies,
        )
    }
}

/// Either a plain value or a deferred one.
///
/// Option records take `Input<T>` so callers can pass literals and outputs of
/// other resources interchangeably.
#[derive(Clone, Debug)]
pub enum Input<T> {
    Value(T),
    Output(Output<T>),
}

impl<T> Input<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn value(value: T) -> Self {
        Input::Value(value)
    }

    pub fn into_output(self) -> Output<T> {
        match self {
            Input::Value(v) => Output::new(v),
            Input::Output(o) => o,
        }
    }

    /// The plain value, when no resolution is needed.
    pub fn as_value(&self) -> Option<&T> {
        match self {
            Input::Value(v) => Some(v),
            Input::Output(_) => None,
        }
    }
}

impl<T> From<Output<T>> for Input<T> {
    fn from(output: Output<T>) -> Self {
        Input::Output(output)
    }
}

impl<T> From<&Output<T>> for Input<T> {
    fn from(output: &Output<T>) -> Self {
        Input::Output(output.clone())
    }
}

impl From<&str> for Input<String> {
    fn from(value: &str) -> Self {
        Input::Value(value.to_string())
    }
}

impl From<String> for Input<String> {
    fn from(value: String) -> Self {
        Input::Value(value)
    }
}

impl<T> From<Vec<T>> for Input<Vec<T>> {
    fn from(value: Vec<T>) -> Self {
        Input::Value(value)
    }
}

impl From<serde_json::Value> for Input<serde_json::Value> {
    fn from(value: serde_json::Value) -> Self {
        Input::Value(value)
    }
}

const STACK_OUTPUT_KEY: &str = "stackOutput";

/// A plain `T`, or `{stackOutput: {stack, output}}` naming an output of
/// another stack. The latter only deserializes inside
/// [`with_references`](crate::stack_ref::with_references).
impl<'de, T> Deserialize<'de> for Input<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_yaml::Value::deserialize(deserializer)?;

        if let Some(reference) = stack_output_ref(&raw) {
            let reference: StackOutputRef =
                serde_yaml::from_value(reference.clone()).map_err(D::Error::custom)?;
            return reference.resolve().map(Input::Output).ok_or_else(|| {
                D::Error::custom(format!(
                    "output {} of stack {} referenced outside a planning context",
                    reference.output, reference.stack
                ))
            });
        }

        T::deserialize(raw).map(Input::Value).map_err(D::Error::custom)
    }
}

fn stack_output_ref(raw: &serde_yaml::Value) -> Option<&serde_yaml::Value> {
    match raw {
        serde_yaml::Value::Mapping(mapping) if mapping.len() == 1 => {
            mapping.get(STACK_OUTPUT_KEY)
        }
        _ => None,
    }
}

/// Turn an optional input into an optional output.
pub fn lift<T>(input: Option<Input<T>>) -> Option<Output<T>>
where
    T: Clone + Send + Sync + 'static,
{
    input.map(Input::into_output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack_ref::{with_references, StackReferences, StaticStackSource};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn secret_ref(name: &str) -> ResourceRef {
        ResourceRef::new("v1", "Secret", Some("apps"), name)
    }

    #[tokio::test]
    async fn test_new_resolves_immediately() {
        let output = Output::new(42);
        assert_eq!(output.resolve().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_map_transforms_value() {
        let output = Output::new(21).map(|v| v * 2);
        assert_eq!(output.resolve().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_map_runs_once_for_many_consumers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let output = Output::new(1).map(move |v| {
            counter.fetch_add(1, Ordering::SeqCst);
            v + 1
        });

        let a = output.map(|v| v * 10);
        let b = output.map(|v| v * 100);
        assert_eq!(a.resolve().await.unwrap(), 20);
        assert_eq!(b.resolve().await.unwrap(), 200);
        assert_eq!(output.resolve().await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_preserves_order() {
        let slow = Output::from_future(async {
            tokio::task::yield_now().await;
            Ok(1)
        });
        let fast = Output::new(2);
        let all = Output::all(vec![slow, fast, Output::new(3)]);
        assert_eq!(all.resolve().await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_all_empty() {
        let all: Output<Vec<u8>> = Output::all(Vec::new());
        assert!(all.resolve().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zip() {
        let zipped = Output::new("a".to_string()).zip(&Output::new(1));
        assert_eq!(zipped.resolve().await.unwrap(), ("a".to_string(), 1));
    }

    #[tokio::test]
    async fn test_failure_propagates_through_map() {
        let failed: Output<i32> =
            Output::failed(StackwrightError::InvalidArgument("boom".to_string()));
        let mapped = failed.map(|v| v + 1);

        let err = mapped.resolve().await.unwrap_err();
        assert!(matches!(err.root(), StackwrightError::InvalidArgument(m) if m == "boom"));
    }

    #[tokio::test]
    async fn test_try_map_error() {
        let output = Output::new(1).try_map(|_| -> Result<i32> {
            Err(StackwrightError::InvalidArgument("nope".to_string()))
        });
        assert!(output.resolve().await.is_err());
    }

    #[tokio::test]
    async fn test_and_then_chains() {
        let output = Output::new(2).and_then(|v| Output::new(v * 3));
        assert_eq!(output.resolve().await.unwrap(), 6);
    }

    #[test]
    fn test_dependencies_are_unioned() {
        let a = Output::new(1).with_dependency(secret_ref("a"));
        let b = Output::new(2).with_dependency(secret_ref("b"));

        let all = Output::all(vec![a.clone(), b.clone()]);
        assert_eq!(all.dependencies().len(), 2);

        let zipped = a.zip(&b);
        assert!(zipped.dependencies().contains(&secret_ref("a")));
        assert!(zipped.dependencies().contains(&secret_ref("b")));

        let mapped = a.map(|v| v.to_string());
        assert_eq!(mapped.dependencies().len(), 1);
    }

    #[tokio::test]
    async fn test_peek_after_resolve() {
        let output = Output::new(5).map(|v| v + 1);
        assert_eq!(output.peek(), None);
        output.resolve().await.unwrap();
        assert_eq!(output.peek(), Some(6));
    }

    #[tokio::test]
    async fn test_input_into_output() {
        let plain: Input<String> = "x".into();
        assert_eq!(plain.as_value().unwrap(), "x");
        assert_eq!(plain.into_output().resolve().await.unwrap(), "x");

        let deferred: Input<String> = Output::new("y".to_string()).into();
        assert!(deferred.as_value().is_none());
        assert_eq!(deferred.into_output().resolve().await.unwrap(), "y");
    }

    #[test]
    fn test_stack_output_needs_references() {
        let err = serde_yaml::from_str::<Input<String>>(
            "stackOutput: {stack: infra, output: domain}",
        )
        .unwrap_err();
        assert!(err.to_string().contains("outside a planning context"));
    }

    #[tokio::test]
    async fn test_stack_output_deserializes_as_deferred() {
        let source = StaticStackSource::new().with_stack(
            "infra",
            BTreeMap::from([("domain".to_string(), serde_json::json!("example.com"))]),
        );
        let references = StackReferences::new(Arc::new(source));

        let input: Input<String> = with_references(&references, || {
            serde_yaml::from_str("stackOutput: {stack: infra, output: domain}")
        })
        .unwrap();

        assert!(input.as_value().is_none());
        let output = input.into_output();
        assert!(output.dependencies().is_empty());
        assert_eq!(output.resolve().await.unwrap(), "example.com");
    }

    #[test]
    fn test_map_with_other_keys_is_a_value() {
        let input: Input<BTreeMap<String, String>> =
            serde_yaml::from_str("{stackOutput: x, other: y}").unwrap();
        assert_eq!(input.as_value().unwrap()["stackOutput"], "x");
    }

    #[test]
    fn test_input_deserializes_as_value() {
        let input: Input<Vec<String>> = serde_yaml::from_str("[a, b]").unwrap();
        assert_eq!(
            input.as_value().unwrap(),
            &vec!["a".to_string(), "b".to_string()]
        );
    }
}
