// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod blueprint;
pub mod components;
pub mod config;
pub mod constants;
pub mod context;
pub mod environment;
pub mod error;
pub mod kubernetes;
pub mod normalize;
pub mod output;
pub mod plan;
pub mod resource;
pub mod stack_ref;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;
