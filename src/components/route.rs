// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Gateway API HTTP routes.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::context::Context;
use crate::error::{Result, StackwrightError};
use crate::normalize::normalize;
use crate::output::{Input, Output};
use crate::resource::{NamespaceRef, Resource, ResourceRef};
use crate::types::gateway::{
    HttpBackendRef, HttpHeaderMatch, HttpPathMatch, HttpRoute, HttpRouteMatch, HttpRouteRule,
    HttpRouteSpec, ParentReference,
};

/// Gateway listener a route attaches to.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayRef {
    pub name: String,
    pub namespace: Option<String>,
    /// Listener name on the gateway
    pub section_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteMatchArgs {
    pub path_prefix: Option<String>,
    pub path: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub method: Option<String>,
}

impl RouteMatchArgs {
    pub fn prefix(prefix: &str) -> Self {
        Self {
            path_prefix: Some(prefix.to_string()),
            ..Default::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.path_prefix.is_none()
            && self.path.is_none()
            && self.headers.is_empty()
            && self.method.is_none()
    }

    fn to_match(&self) -> HttpRouteMatch {
        let path = match (&self.path, &self.path_prefix) {
            (Some(exact), _) => Some(HttpPathMatch {
                match_type: "Exact".to_string(),
                value: exact.clone(),
            }),
            (None, Some(prefix)) => Some(HttpPathMatch {
                match_type: "PathPrefix".to_string(),
                value: prefix.clone(),
            }),
            (None, None) => None,
        };

        HttpRouteMatch {
            path,
            headers: self
                .headers
                .iter()
                .map(|(name, value)| HttpHeaderMatch {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
            method: self.method.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendArgs {
    pub service: String,
    pub namespace: Option<String>,
    pub port: i32,
    pub weight: Option<i32>,
}

impl BackendArgs {
    pub fn new(service: &str, port: i32) -> Self {
        Self {
            service: service.to_string(),
            port,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteRuleArgs {
    /// No matches means the rule matches every request
    pub matches: Vec<RouteMatchArgs>,
    pub backends: Vec<BackendArgs>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpRouteArgs {
    pub namespace: NamespaceRef,
    pub gateway: GatewayRef,
    pub hostname: Option<Input<String>>,
    pub hostnames: Option<Input<Vec<String>>>,
    pub rules: Vec<RouteRuleArgs>,
    /// Scheme of the derived URL is `http` when set
    pub insecure: bool,
    #[serde(skip)]
    pub depends_on: Vec<ResourceRef>,
}

#[derive(Debug, Clone)]
pub struct HttpRouteBundle {
    pub route: Resource<HttpRoute>,
    pub hostnames: Output<Vec<String>>,
    /// URL of the first hostname, if any
    pub url: Output<Option<String>>,
}

pub fn create_http_route(
    ctx: &Context,
    name: &str,
    args: HttpRouteArgs,
) -> Result<HttpRouteBundle> {
    if args.gateway.name.is_empty() {
        return Err(StackwrightError::InvalidArgument(format!(
            "route {} has no parent gateway",
            name
        )));
    }
    let rules = build_rules(name, &args.rules)?;

    let parent = ParentReference {
        name: args.gateway.name,
        namespace: args.gateway.namespace,
        section_name: args.gateway.section_name,
        port: None,
    };

    let hostnames = normalize(args.hostname, args.hostnames);
    let route = hostnames.map(move |hostnames| {
        HttpRoute::new(
            "",
            HttpRouteSpec {
                parent_refs: vec![parent],
                hostnames,
                rules,
            },
        )
    });

    let route = ctx.register(
        name,
        Some(args.namespace.name()),
        route,
        args.namespace.child_options(&args.depends_on),
    )?;

    let hostnames = route.object().map(|r| r.spec.hostnames);
    let scheme = if args.insecure { "http" } else { "https" };
    let url = hostnames.map(move |hostnames| {
        hostnames
            .first()
            .map(|host| format!("{}://{}", scheme, host))
    });

    Ok(HttpRouteBundle {
        route,
        hostnames,
        url,
    })
}

fn build_rules(route: &str, rules: &[RouteRuleArgs]) -> Result<Vec<HttpRouteRule>> {
    rules
        .iter()
        .enumerate()
        .map(|(i, rule)| {
            if let Some(j) = rule.matches.iter().position(RouteMatchArgs::is_empty) {
                return Err(StackwrightError::EmptyMatch(format!(
                    "{} of route {} (rule {})",
                    j, route, i
                )));
            }
            Ok(HttpRouteRule {
                matches: rule.matches.iter().map(RouteMatchArgs::to_match).collect(),
                backend_refs: rule
                    .backends
                    .iter()
                    .map(|b| HttpBackendRef {
                        name: b.service.clone(),
                        namespace: b.namespace.clone(),
                        port: Some(b.port),
                        weight: b.weight,
                    })
                    .collect(),
            })
        })
        .collect()
}
