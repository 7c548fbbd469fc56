// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Helm releases through the helm-controller `HelmChart` resource.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::context::Context;
use crate::error::{Result, StackwrightError};
use crate::normalize::{deep_merge, normalize};
use crate::output::{Input, Output};
use crate::resource::{NamespaceRef, Resource, ResourceRef};
use crate::types::helm::{HelmChart, HelmChartSpec};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartArgs {
    /// Namespace the `HelmChart` object lives in
    pub namespace: NamespaceRef,
    pub chart: String,
    pub repo: Option<String>,
    pub version: Option<String>,
    /// Namespace the release is installed into, defaults to `namespace`
    pub target_namespace: Option<NamespaceRef>,
    pub create_namespace: bool,
    pub values: Option<Input<JsonValue>>,
    /// Merged over `values` in order
    pub extra_values: Option<Input<Vec<JsonValue>>>,
    #[serde(skip)]
    pub depends_on: Vec<ResourceRef>,
}

impl Default for ChartArgs {
    fn default() -> Self {
        Self {
            namespace: NamespaceRef::Existing("kube-system".to_string()),
            chart: String::new(),
            repo: None,
            version: None,
            target_namespace: None,
            create_namespace: false,
            values: None,
            extra_values: None,
            depends_on: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChartBundle {
    pub chart: Resource<HelmChart>,
    /// Merged chart values
    pub values: Output<JsonValue>,
}

pub fn create_chart(ctx: &Context, name: &str, args: ChartArgs) -> Result<ChartBundle> {
    if args.chart.is_empty() {
        return Err(StackwrightError::InvalidArgument(format!(
            "chart release {} names no chart",
            name
        )));
    }

    let target = args.target_namespace.unwrap_or_else(|| args.namespace.clone());
    let mut options = args.namespace.child_options(&args.depends_on);
    if let Some(target_resource) = target.resource() {
        if !options.edges().any(|r| r == target_resource) {
            options.depends_on.push(target_resource.clone());
        }
    }

    let values = normalize(args.values, args.extra_values).map(|layers| {
        layers
            .iter()
            .fold(JsonValue::Null, |mut merged, layer| {
                deep_merge(&mut merged, layer);
                merged
            })
    });

    let spec = HelmChartSpec {
        chart: args.chart,
        repo: args.repo,
        version: args.version,
        target_namespace: Some(target.name().to_string()),
        create_namespace: args.create_namespace.then_some(true),
        values_content: None,
    };
    let chart = values.try_map(move |values| {
        let values_content = match values {
            JsonValue::Null => None,
            values => Some(serde_yaml::to_string(&values)?),
        };
        Ok(HelmChart::new(
            "",
            HelmChartSpec {
                values_content,
                ..spec
            },
        ))
    });

    let chart = ctx.register(name, Some(args.namespace.name()), chart, options)?;

    Ok(ChartBundle { chart, values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::namespace::{create_namespace, NamespaceArgs};
    use crate::test_utils::test_context;
    use serde_json::json;

    #[tokio::test]
    async fn test_values_are_deep_merged_in_order() {
        let ctx = test_context();
        let bundle = create_chart(
            &ctx,
            "traefik",
            ChartArgs {
                chart: "traefik".to_string(),
                repo: Some("https://traefik.github.io/charts".to_string()),
                values: Some(
                    json!({"ports": {"web": {"port": 80}, "websecure": {"port": 443}}}).into(),
                ),
                extra_values: Some(Input::value(vec![
                    json!({"ports": {"web": {"port": 8000}}}),
                    json!({"logs": {"level": "DEBUG"}}),
                ])),
                ..Default::default()
            },
        )
        .unwrap();

        let values = bundle.values.resolve().await.unwrap();
        assert_eq!(values["ports"]["web"]["port"], json!(8000));
        assert_eq!(values["ports"]["websecure"]["port"], json!(443));
        assert_eq!(values["logs"]["level"], json!("DEBUG"));

        let chart = bundle.chart.object().resolve().await.unwrap();
        assert_eq!(chart.metadata.namespace.as_deref(), Some("kube-system"));
        assert_eq!(chart.spec.target_namespace.as_deref(), Some("kube-system"));
        let content: JsonValue =
            serde_yaml::from_str(chart.spec.values_content.as_deref().unwrap()).unwrap();
        assert_eq!(content, values);
    }

    #[tokio::test]
    async fn test_no_values_no_content() {
        let ctx = test_context();
        let bundle = create_chart(
            &ctx,
            "metrics",
            ChartArgs {
                chart: "metrics-server".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

        let chart = bundle.chart.object().resolve().await.unwrap();
        assert!(chart.spec.values_content.is_none());
        assert!(chart.spec.create_namespace.is_none());
    }

    #[tokio::test]
    async fn test_managed_target_namespace_is_a_dependency() {
        let ctx = test_context();
        let ns = create_namespace(&ctx, "ingress", NamespaceArgs::default()).unwrap();
        let bundle = create_chart(
            &ctx,
            "traefik",
            ChartArgs {
                chart: "traefik".to_string(),
                target_namespace: Some(ns.namespace_ref()),
                ..Default::default()
            },
        )
        .unwrap();

        let plan = ctx.plan().await.unwrap();
        let planned = plan.get(bundle.chart.reference()).unwrap();
        assert_eq!(planned.dependencies, vec![ns.namespace.reference().clone()]);
        assert_eq!(planned.manifest["spec"]["targetNamespace"], json!("ingress"));
    }

    #[test]
    fn test_missing_chart_rejected() {
        let ctx = test_context();
        assert!(create_chart(&ctx, "x", ChartArgs::default()).is_err());
    }
}
