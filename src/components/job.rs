// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! One-shot and scheduled script jobs.

use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec, Job, JobSpec, JobTemplateSpec};
use k8s_openapi::api::core::v1::{PodSpec, PodTemplateSpec};
use serde::Deserialize;

use super::script::{create_script_bundle, ScriptBundle, ScriptBundleArgs};
use crate::context::Context;
use crate::environment::{merge_environment_inputs, merge_environments, ScriptEnvironment};
use crate::error::{Result, StackwrightError};
use crate::output::Input;
use crate::resource::{NamespaceRef, Resource, ResourceRef};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptJobArgs {
    pub namespace: NamespaceRef,
    pub environment: Option<Input<ScriptEnvironment>>,
    pub environments: Option<Input<Vec<ScriptEnvironment>>>,
    /// Script key to run
    pub script: String,
    pub args: Vec<String>,
    /// Cron schedule; a CronJob is declared when set
    pub schedule: Option<String>,
    pub backoff_limit: Option<i32>,
    #[serde(skip)]
    pub depends_on: Vec<ResourceRef>,
}

#[derive(Debug, Clone)]
pub enum ScriptJob {
    Job(Resource<Job>),
    CronJob(Resource<CronJob>),
}

impl ScriptJob {
    pub fn reference(&self) -> &ResourceRef {
        match self {
            ScriptJob::Job(r) => r.reference(),
            ScriptJob::CronJob(r) => r.reference(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScriptJobBundle {
    pub scripts: ScriptBundle,
    pub job: ScriptJob,
}

pub fn create_script_job(
    ctx: &Context,
    name: &str,
    args: ScriptJobArgs,
) -> Result<ScriptJobBundle> {
    if args.script.is_empty() {
        return Err(StackwrightError::InvalidArgument(format!(
            "script job {} names no script",
            name
        )));
    }

    let environments = args
        .environments
        .map(|envs| Input::Output(envs.into_output().try_map(merge_environments)));
    let environment = merge_environment_inputs([args.environment, environments]);

    let scripts = create_script_bundle(
        ctx,
        &format!("{}-scripts", name),
        ScriptBundleArgs {
            namespace: args.namespace.clone(),
            environment: Input::Output(environment),
            depends_on: args.depends_on.clone(),
        },
    )?;

    let container = scripts.container(name, &args.script, args.args);
    let volumes = scripts.volumes();
    let backoff_limit = args.backoff_limit;

    let job_spec = container.zip(&volumes).map(move |(container, volumes)| JobSpec {
        backoff_limit,
        template: PodTemplateSpec {
            spec: Some(PodSpec {
                containers: vec![container],
                volumes: Some(volumes),
                restart_policy: Some("Never".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    });

    let namespace = args.namespace.name();
    let options = args.namespace.child_options(&args.depends_on);

    let job = match args.schedule {
        Some(schedule) => {
            let cron_job = job_spec.map(move |spec| CronJob {
                spec: Some(CronJobSpec {
                    schedule,
                    concurrency_policy: Some("Forbid".to_string()),
                    job_template: JobTemplateSpec {
                        spec: Some(spec),
                        ..Default::default()
                    },
                    ..Default::default()
                }),
                ..Default::default()
            });
            ScriptJob::CronJob(ctx.register(name, Some(namespace), cron_job, options)?)
        }
        None => {
            let job = job_spec.map(|spec| Job {
                spec: Some(spec),
                ..Default::default()
            });
            ScriptJob::Job(ctx.register(name, Some(namespace), job, options)?)
        }
    };

    Ok(ScriptJobBundle { scripts, job })
}
