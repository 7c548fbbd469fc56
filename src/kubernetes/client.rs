// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Client creation and kubeconfig utilities

use crate::error::{Result, StackwrightError};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config as KConfig};
use tracing::{info, instrument};

/// Create a Kubernetes client, optionally for a named kubeconfig context
#[instrument]
pub async fn create_client(context: Option<&str>) -> Result<Client> {
    let config = match context {
        Some(context) => {
            info!("Using kubeconfig context '{}'", context);
            config_for_context(context).await?
        }
        None => KConfig::infer().await.map_err(|e| {
            StackwrightError::KubeconfigError(format!("Failed to infer config: {}", e))
        })?,
    };

    Client::try_from(config)
        .map_err(|e| StackwrightError::KubeconfigError(format!("Failed to create client: {}", e)))
}

async fn config_for_context(context: &str) -> Result<KConfig> {
    let kubeconfig = Kubeconfig::read().map_err(|e| {
        StackwrightError::KubeconfigError(format!("Failed to read kubeconfig: {}", e))
    })?;

    let options = KubeConfigOptions {
        context: Some(context.to_string()),
        ..Default::default()
    };

    KConfig::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .map_err(|e| {
            StackwrightError::KubeconfigError(format!(
                "Failed to create config for context {}: {}",
                context, e
            ))
        })
}
