use std::fmt;
use std::time::Duration;

use crate::config::Settings;
use crate::containers::{ImageRef, PortBinding, RuntimeError};

use super::error::BoxError;
use super::PortMappings;

/// Readiness callback, run once the shared ready delay has elapsed.
/// Receives the finished `container port -> host port` table.
pub type ReadyFn = Box<dyn FnOnce(&PortMappings) -> Result<(), BoxError>>;

/// One container a test needs. Immutable once handed to the harness.
pub struct ContainerDecl {
    pub name: String,
    /// Explicit publications. When empty, every exposed port of the image is bound.
    pub port_bindings: Vec<PortBinding>,
    /// Publish exposed ports on random host ports instead of the same port number.
    pub random_ports: bool,
    /// How long to wait after start before the container is assumed ready.
    pub ready_delay: Duration,
    pub on_ready: Option<ReadyFn>,
}

impl ContainerDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port_bindings: Vec::new(),
            random_ports: false,
            ready_delay: Duration::ZERO,
            on_ready: None,
        }
    }

    /// A declaration using the harness-wide defaults for delay and port randomization.
    pub fn with_defaults(name: impl Into<String>, settings: &Settings) -> Self {
        Self {
            random_ports: settings.random_ports,
            ready_delay: settings.ready_delay(),
            ..Self::new(name)
        }
    }

    pub fn bind(mut self, binding: PortBinding) -> Self {
        self.port_bindings.push(binding);
        self
    }

    pub fn bind_port(self, container_port: u16, host_port: u16) -> Self {
        self.bind(PortBinding::new(container_port, host_port))
    }

    pub fn random_ports(mut self, random: bool) -> Self {
        self.random_ports = random;
        self
    }

    pub fn ready_delay(mut self, delay: Duration) -> Self {
        self.ready_delay = delay;
        self
    }

    pub fn on_ready<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&PortMappings) -> Result<(), BoxError> + 'static,
    {
        self.on_ready = Some(Box::new(f));
        self
    }

    pub fn image(&self) -> Result<ImageRef, RuntimeError> {
        ImageRef::parse(&self.name)
    }
}

impl fmt::Debug for ContainerDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerDecl")
            .field("name", &self.name)
            .field("port_bindings", &self.port_bindings)
            .field("random_ports", &self.random_ports)
            .field("ready_delay", &self.ready_delay)
            .field("on_ready", &self.on_ready.is_some())
            .finish()
    }
}

impl From<&str> for ContainerDecl {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
