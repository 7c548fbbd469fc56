// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace management utilities

use crate::constants::{labels, FIELD_MANAGER};
use crate::error::{Result, StackwrightError};
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    api::{ObjectMeta, PostParams},
    Api, Client,
};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Ensure a namespace exists in the cluster, create if it doesn't
#[instrument(skip(client))]
pub async fn ensure_namespace_exists(client: &Client, namespace: &str) -> Result<()> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    match namespaces.get(namespace).await {
        Ok(_) => {
            debug!("Namespace {} already exists", namespace);
            Ok(())
        }
        Err(kube::Error::Api(err)) if err.code == 404 => {
            info!("Creating namespace {}", namespace);
            let ns = Namespace {
                metadata: ObjectMeta {
                    name: Some(namespace.to_string()),
                    labels: Some(BTreeMap::from([(
                        labels::MANAGED_BY.to_string(),
                        FIELD_MANAGER.to_string(),
                    )])),
                    ..Default::default()
                },
                ..Default::default()
            };
            namespaces.create(&PostParams::default(), &ns).await?;
            info!("Namespace {} created successfully", namespace);
            Ok(())
        }
        Err(e) => Err(StackwrightError::NamespaceError(format!(
            "Failed to check/create namespace {}: {}",
            namespace, e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{namespace_json, not_found_json, MockService};

    #[tokio::test]
    async fn test_existing_namespace_is_left_alone() {
        let mock =
            MockService::new().on_get("/api/v1/namespaces/apps", 200, &namespace_json("apps"));
        let client = mock.clone().into_client();

        ensure_namespace_exists(&client, "apps").await.unwrap();
        assert_eq!(
            mock.requests(),
            vec![("GET".to_string(), "/api/v1/namespaces/apps".to_string())]
        );
    }

    #[tokio::test]
    async fn test_missing_namespace_is_created() {
        let mock = MockService::new()
            .on_get("/api/v1/namespaces/apps", 404, &not_found_json("namespaces", "apps"))
            .on_post("/api/v1/namespaces", 201, &namespace_json("apps"));
        let client = mock.clone().into_client();

        ensure_namespace_exists(&client, "apps").await.unwrap();
        assert_eq!(mock.requests().len(), 2);
        assert_eq!(mock.requests()[1].0, "POST");
    }

    #[tokio::test]
    async fn test_api_failure_is_reported() {
        let client = MockService::new()
            .on_get(
                "/api/v1/namespaces/apps",
                500,
                r#"{"kind":"Status","apiVersion":"v1","status":"Failure","message":"boom","reason":"InternalError","code":500}"#,
            )
            .into_client();

        let err = ensure_namespace_exists(&client, "apps").await.unwrap_err();
        assert!(matches!(err, StackwrightError::NamespaceError(_)));
    }
}
