// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Secrets and generated credentials.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use rand::Rng;
use serde::Deserialize;

use crate::constants::credentials::{
    DEFAULT_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH, PASSWORD_KEY, USERNAME_KEY,
};
use crate::context::Context;
use crate::environment::EnvValue;
use crate::error::{Result, StackwrightError};
use crate::output::{Input, Output};
use crate::resource::{NamespaceRef, Resource, ResourceRef};

const PASSWORD_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecretArgs {
    pub namespace: NamespaceRef,
    pub string_data: BTreeMap<String, Input<String>>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    #[serde(skip)]
    pub depends_on: Vec<ResourceRef>,
}

#[derive(Debug, Clone)]
pub struct SecretBundle {
    pub secret: Resource<Secret>,
    /// Resolved string data, keyed like the secret
    pub data: Output<BTreeMap<String, String>>,
}

impl SecretBundle {
    pub fn name(&self) -> &str {
        self.secret.name()
    }

    /// One key of the secret; fails at resolution when the key is absent.
    pub fn value(&self, key: &str) -> Output<String> {
        let key = key.to_string();
        let secret = self.secret.reference().to_string();
        self.data.try_map(move |data| {
            data.get(&key).cloned().ok_or_else(|| {
                StackwrightError::InvalidArgument(format!("{} has no key '{}'", secret, key))
            })
        })
    }

    /// Environment variable reading `key` from this secret.
    pub fn env_value(&self, key: &str) -> EnvValue {
        EnvValue::secret_key(self.name(), key)
    }
}

pub fn create_secret(ctx: &Context, name: &str, args: SecretArgs) -> Result<SecretBundle> {
    let entries: Vec<Output<(String, String)>> = args
        .string_data
        .into_iter()
        .map(|(key, value)| value.into_output().map(move |v| (key, v)))
        .collect();

    let type_ = args.type_.unwrap_or_else(|| "Opaque".to_string());
    let secret = Output::all(entries).map(move |pairs| Secret {
        string_data: Some(pairs.into_iter().collect()),
        type_: Some(type_),
        ..Default::default()
    });

    let secret = ctx.register(
        name,
        Some(args.namespace.name()),
        secret,
        args.namespace.child_options(&args.depends_on),
    )?;
    let data = secret.object().map(|s| s.string_data.unwrap_or_default());

    Ok(SecretBundle { secret, data })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CredentialsArgs {
    pub namespace: NamespaceRef,
    /// Defaults to the credentials name
    pub username: Option<String>,
    /// Generated when absent
    pub password: Option<Input<String>>,
    pub password_length: usize,
    #[serde(skip)]
    pub depends_on: Vec<ResourceRef>,
}

impl Default for CredentialsArgs {
    fn default() -> Self {
        Self {
            namespace: NamespaceRef::default(),
            username: None,
            password: None,
            password_length: DEFAULT_PASSWORD_LENGTH,
            depends_on: Vec::new(),
        }
    }
}

/// A username/password pair stored in a secret.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub secret: SecretBundle,
    pub username: Output<String>,
    pub password: Output<String>,
}

impl Credentials {
    pub fn username_env(&self) -> EnvValue {
        self.secret.env_value(USERNAME_KEY)
    }

    pub fn password_env(&self) -> EnvValue {
        self.secret.env_value(PASSWORD_KEY)
    }

    /// Variables exposing both keys; consumers depend on the secret.
    pub fn environment(
        &self,
        username_var: &str,
        password_var: &str,
    ) -> Output<BTreeMap<String, EnvValue>> {
        let vars = BTreeMap::from([
            (username_var.to_string(), self.username_env()),
            (password_var.to_string(), self.password_env()),
        ]);
        self.secret.secret.object().map(move |_| vars)
    }
}

pub fn create_credentials(ctx: &Context, name: &str, args: CredentialsArgs) -> Result<Credentials> {
    let password = match args.password {
        Some(password) => password,
        None => {
            if args.password_length < MIN_PASSWORD_LENGTH {
                return Err(StackwrightError::InvalidArgument(format!(
                    "password length for {} must be at least {}, got {}",
                    name, MIN_PASSWORD_LENGTH, args.password_length
                )));
            }
            Input::Value(generate_password(args.password_length))
        }
    };
    let username = args.username.unwrap_or_else(|| name.to_string());

    let secret = create_secret(
        ctx,
        name,
        SecretArgs {
            namespace: args.namespace,
            string_data: BTreeMap::from([
                (USERNAME_KEY.to_string(), Input::Value(username)),
                (PASSWORD_KEY.to_string(), password),
            ]),
            type_: None,
            depends_on: args.depends_on,
        },
    )?;

    Ok(Credentials {
        username: secret.value(USERNAME_KEY),
        password: secret.value(PASSWORD_KEY),
        secret,
    })
}

/// Random alphanumeric password.
pub fn generate_password(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| PASSWORD_CHARSET[rng.random_range(0..PASSWORD_CHARSET.len())] as char)
        .collect()
}
