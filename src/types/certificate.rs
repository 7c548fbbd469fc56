// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// cert-manager `Certificate` (cert-manager.io/v1)
#[derive(
    CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema,
)]
#[kube(group = "cert-manager.io", version = "v1", kind = "Certificate")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSpec {
    pub secret_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,
    pub issuer_ref: IssuerReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renew_before: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuerReference {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_certificate_serializes() {
        let cert = Certificate::new(
            "web-tls",
            CertificateSpec {
                secret_name: "web-tls".to_string(),
                dns_names: vec!["app.example.com".to_string()],
                issuer_ref: IssuerReference {
                    name: "letsencrypt".to_string(),
                    kind: Some("ClusterIssuer".to_string()),
                    group: Some("cert-manager.io".to_string()),
                },
                ..Default::default()
            },
        );

        let value = serde_json::to_value(cert).unwrap();
        assert_eq!(value["apiVersion"], json!("cert-manager.io/v1"));
        assert_eq!(value["spec"]["secretName"], json!("web-tls"));
        assert_eq!(value["spec"]["issuerRef"]["kind"], json!("ClusterIssuer"));
        assert!(value["spec"].get("renewBefore").is_none());
    }
}
