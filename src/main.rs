// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use anyhow::{Context as _, Result};
use kube::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stackwright::blueprint::Blueprint;
use stackwright::config::Config;
use stackwright::context::Context;
use stackwright::kubernetes::{apply_plan, create_client};
use stackwright::stack_ref::{KubeStackSource, StackOutputSource, StaticStackSource};

async fn connect(config: &Config) -> Result<Client> {
    let client = create_client(config.kube_context.as_deref()).await?;
    info!("Connected to Kubernetes cluster");
    Ok(client)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting stackwright");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: stack={}, blueprint={}, dry_run={}",
        config.stack_name,
        config.blueprint_path.display(),
        config.dry_run
    );

    // With an outputs file, dry runs work without a cluster
    let mut client = None;
    let source: Arc<dyn StackOutputSource> = match &config.stack_outputs_file {
        Some(path) => Arc::new(
            StaticStackSource::from_file(path)
                .with_context(|| format!("Failed to load stack outputs {}", path.display()))?,
        ),
        None => {
            let connected = connect(&config).await?;
            client = Some(connected.clone());
            Arc::new(KubeStackSource::new(
                connected,
                config.outputs_namespace.clone(),
            ))
        }
    };

    let ctx = Context::new(config.stack_name.clone(), source)
        .with_outputs_namespace(config.outputs_namespace.clone());
    let blueprint = Blueprint::from_file(&ctx, &config.blueprint_path).with_context(|| {
        format!("Failed to load blueprint {}", config.blueprint_path.display())
    })?;
    blueprint.compose(&ctx)?;
    let plan = ctx.plan().await?;

    if config.dry_run {
        print!("{}", plan.to_yaml()?);
        return Ok(());
    }

    let client = match client {
        Some(client) => client,
        None => connect(&config).await?,
    };
    let summary = apply_plan(&client, &plan).await?;
    info!(
        "Stack '{}' applied: {} resources in {} waves",
        plan.stack(),
        summary.applied,
        summary.waves
    );

    Ok(())
}
