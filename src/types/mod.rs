// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resources declared by components.

pub mod certificate;
pub mod gateway;
pub mod helm;

pub use certificate::{Certificate, CertificateSpec, IssuerReference};
pub use gateway::{HttpRoute, HttpRouteSpec};
pub use helm::{HelmChart, HelmChartSpec};
