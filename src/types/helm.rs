// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Chart release handled by the k3s/RKE2 helm-controller (helm.cattle.io/v1)
#[derive(
    CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema,
)]
#[kube(group = "helm.cattle.io", version = "v1", kind = "HelmChart")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct HelmChartSpec {
    pub chart: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_namespace: Option<bool>,
    /// Values as a YAML document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values_content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_helm_chart_serializes() {
        let chart = HelmChart::new(
            "traefik",
            HelmChartSpec {
                chart: "traefik".to_string(),
                repo: Some("https://traefik.github.io/charts".to_string()),
                target_namespace: Some("ingress".to_string()),
                ..Default::default()
            },
        );

        let value = serde_json::to_value(chart).unwrap();
        assert_eq!(value["apiVersion"], json!("helm.cattle.io/v1"));
        assert_eq!(value["kind"], json!("HelmChart"));
        assert_eq!(value["spec"]["targetNamespace"], json!("ingress"));
        assert!(value["spec"].get("valuesContent").is_none());
    }
}
