pub mod container_interface;
mod docker;
pub mod error;
pub mod fake;
pub mod image;
mod podman;
pub(crate) mod runtime_base;

use std::collections::HashMap;
use std::time::Duration;

use crate::config::{ContainerRuntimeName, Settings};
pub use container_interface::{
    ContainerRuntimeInterface, CreateOptions, ExposedPort, PortBinding,
};
use docker::Docker;
use enum_dispatch::enum_dispatch;
pub use error::{Result, RuntimeError};
pub use fake::FakeRuntime;
pub use image::ImageRef;
use podman::Podman;

#[enum_dispatch(ContainerRuntimeInterface)]
pub enum ContainerRuntime {
    Docker,
    Podman,
}

impl ContainerRuntime {
    pub fn from_name(name: ContainerRuntimeName) -> Self {
        match name {
            ContainerRuntimeName::Docker => Docker::default().into(),
            ContainerRuntimeName::Podman => Podman::default().into(),
        }
    }
}

/// Returns the CLI binary name for the configured container runtime.
pub fn runtime_binary(settings: &Settings) -> &'static str {
    match settings.runtime {
        ContainerRuntimeName::Docker => "docker",
        ContainerRuntimeName::Podman => "podman",
    }
}

/// Container name for a fixture: `<prefix><slug>-<8 hex chars>`.
pub fn generate_name(prefix: &str, image: &ImageRef) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}-{}", prefix, image.slug(), &suffix[..8])
}
