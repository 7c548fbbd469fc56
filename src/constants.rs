// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Labels stamped on every declared object
pub mod labels {
    pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
    pub const NAME: &str = "app.kubernetes.io/name";
    /// Stack that declared the object
    pub const STACK: &str = "stackwright.dev/stack";
    /// Pod Security admission level for namespaces
    pub const POD_SECURITY_ENFORCE: &str = "pod-security.kubernetes.io/enforce";
}

/// Annotation keys used by stackwright
pub mod annotations {
    /// Owning resource of a declared object
    pub const PARENT: &str = "stackwright.dev/parent";
}

/// The field manager name used for server-side apply, and the managed-by label value
pub const FIELD_MANAGER: &str = "stackwright";

/// Default namespace holding published stack outputs
pub const DEFAULT_OUTPUTS_NAMESPACE: &str = "stackwright-system";

/// Suffix of the ConfigMap holding a stack's outputs
pub const STACK_OUTPUTS_SUFFIX: &str = "-outputs";

pub const CLUSTER_DOMAIN: &str = "cluster.local";

/// Base images for script environments
pub mod images {
    pub const ALPINE: &str = "alpine:3.20";
    pub const UBUNTU: &str = "ubuntu:24.04";
}

/// Script bundle layout inside containers
pub mod scripts {
    pub const MOUNT_PATH: &str = "/scripts";
    pub const VOLUME_NAME: &str = "scripts";
    pub const ENTRYPOINT: &str = "entrypoint.sh";
    pub const SETUP_PREFIX: &str = "setup-";
    pub const CLEANUP_PREFIX: &str = "cleanup-";
}

/// Password generation defaults for credentials
pub mod credentials {
    pub const DEFAULT_PASSWORD_LENGTH: usize = 32;
    pub const MIN_PASSWORD_LENGTH: usize = 8;
    pub const USERNAME_KEY: &str = "username";
    pub const PASSWORD_KEY: &str = "password";
}
