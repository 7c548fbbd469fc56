// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! cert-manager certificates.

use serde::Deserialize;

use crate::context::Context;
use crate::error::{Result, StackwrightError};
use crate::normalize::normalize;
use crate::output::{Input, Output};
use crate::resource::{NamespaceRef, Resource, ResourceRef};
use crate::types::certificate::{Certificate, CertificateSpec, IssuerReference};

const CERT_MANAGER_GROUP: &str = "cert-manager.io";

/// Issuer signing a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", content = "name")]
pub enum IssuerRef {
    /// Issuer in the certificate's namespace
    Issuer(String),
    ClusterIssuer(String),
}

impl IssuerRef {
    fn to_reference(&self) -> IssuerReference {
        let (kind, name) = match self {
            IssuerRef::Issuer(name) => ("Issuer", name),
            IssuerRef::ClusterIssuer(name) => ("ClusterIssuer", name),
        };
        IssuerReference {
            name: name.clone(),
            kind: Some(kind.to_string()),
            group: Some(CERT_MANAGER_GROUP.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateArgs {
    #[serde(default)]
    pub namespace: NamespaceRef,
    pub issuer: IssuerRef,
    #[serde(default)]
    pub dns_name: Option<Input<String>>,
    #[serde(default)]
    pub dns_names: Option<Input<Vec<String>>>,
    /// Defaults to `<name>-tls`
    #[serde(default)]
    pub secret_name: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub renew_before: Option<String>,
    #[serde(skip)]
    pub depends_on: Vec<ResourceRef>,
}

impl CertificateArgs {
    pub fn new(namespace: NamespaceRef, issuer: IssuerRef) -> Self {
        Self {
            namespace,
            issuer,
            dns_name: None,
            dns_names: None,
            secret_name: None,
            duration: None,
            renew_before: None,
            depends_on: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CertificateBundle {
    pub certificate: Resource<Certificate>,
    /// Secret cert-manager writes the key pair to
    pub secret_name: String,
    pub dns_names: Output<Vec<String>>,
}

pub fn create_certificate(
    ctx: &Context,
    name: &str,
    args: CertificateArgs,
) -> Result<CertificateBundle> {
    if args.dns_name.is_none() && args.dns_names.is_none() {
        return Err(StackwrightError::InvalidArgument(format!(
            "certificate {} needs at least one DNS name",
            name
        )));
    }

    let secret_name = args
        .secret_name
        .unwrap_or_else(|| format!("{}-tls", name));
    let issuer_ref = args.issuer.to_reference();
    let duration = args.duration;
    let renew_before = args.renew_before;
    let certificate_name = name.to_string();
    let spec_secret = secret_name.clone();

    let certificate = normalize(args.dns_name, args.dns_names).try_map(move |dns_names| {
        let Some(common_name) = dns_names.first().cloned() else {
            return Err(StackwrightError::InvalidArgument(format!(
                "certificate {} needs at least one DNS name",
                certificate_name
            )));
        };
        Ok(Certificate::new(
            "",
            CertificateSpec {
                secret_name: spec_secret,
                dns_names,
                issuer_ref,
                common_name: Some(common_name),
                duration,
                renew_before,
            },
        ))
    });

    let certificate = ctx.register(
        name,
        Some(args.namespace.name()),
        certificate,
        args.namespace.child_options(&args.depends_on),
    )?;
    let dns_names = certificate.object().map(|c| c.spec.dns_names);

    Ok(CertificateBundle {
        certificate,
        secret_name,
        dns_names,
    })
}
