use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::error::{Result, RuntimeError};
use super::image::ImageRef;
use enum_dispatch::enum_dispatch;

pub const DEFAULT_PROTOCOL: &str = "tcp";

/// A port an image declares as exposed, e.g. `6379/tcp`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExposedPort {
    pub port: String,
    pub protocol: String,
}

impl ExposedPort {
    /// Parse the runtime's `port/proto` key. The protocol defaults to tcp.
    pub fn parse(key: &str) -> Option<Self> {
        let (port, protocol) = match key.split_once('/') {
            Some((p, proto)) => (p, proto),
            None => (key, DEFAULT_PROTOCOL),
        };
        port.parse::<u16>().ok()?;
        Some(Self {
            port: port.to_string(),
            protocol: protocol.to_string(),
        })
    }
}

impl fmt::Display for ExposedPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

/// One `containerPort -> hostPort` publication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortBinding {
    pub container_port: String,
    pub protocol: String,
    pub host_port: String,
}

impl PortBinding {
    pub fn new(container_port: u16, host_port: u16) -> Self {
        Self {
            container_port: container_port.to_string(),
            protocol: DEFAULT_PROTOCOL.to_string(),
            host_port: host_port.to_string(),
        }
    }

    /// Argument for `-p`, e.g. `16379:6379/tcp`.
    pub fn publish_arg(&self) -> String {
        format!(
            "{}:{}/{}",
            self.host_port, self.container_port, self.protocol
        )
    }
}

impl FromStr for PortBinding {
    type Err = RuntimeError;

    /// Accepts `containerPort[/proto]:hostPort`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || RuntimeError::InvalidPortBinding(s.to_string());
        let (container, host) = s.trim().split_once(':').ok_or_else(invalid)?;
        let exposed = ExposedPort::parse(container).ok_or_else(invalid)?;
        host.parse::<u16>().map_err(|_| invalid())?;
        Ok(Self {
            container_port: exposed.port,
            protocol: exposed.protocol,
            host_port: host.to_string(),
        })
    }
}

pub struct CreateOptions {
    pub name: String,
    pub image: ImageRef,
    pub port_bindings: Vec<PortBinding>,
}

/// Capabilities the fixture layer needs from a container engine.
///
/// Implementations must be shareable across the pull threads.
#[enum_dispatch]
pub trait ContainerRuntimeInterface: Send + Sync {
    /// Check if the container runtime CLI is available
    fn is_available(&self) -> bool;

    /// Check if the container runtime daemon is running
    fn is_daemon_running(&self) -> bool;

    /// Get the container runtime version string
    fn get_version(&self) -> Result<String>;

    /// Every `repository:tag` present locally.
    fn list_local_images(&self) -> Result<Vec<String>>;

    /// Pull an image, handing each line of progress output to `on_output`.
    fn pull_image(&self, image: &ImageRef, on_output: &mut dyn FnMut(&str)) -> Result<()>;

    fn inspect_exposed_ports(&self, identity: &str) -> Result<Vec<ExposedPort>>;

    /// Create (but do not start) a container. Returns the runtime's id.
    fn create_container(&self, options: &CreateOptions) -> Result<String>;

    fn start_container(&self, id: &str) -> Result<()>;

    fn stop_container(&self, id: &str, timeout: Duration) -> Result<()>;

    fn kill_container(&self, id: &str) -> Result<()>;

    fn remove_container(&self, id: &str, force: bool) -> Result<()>;

    /// Combined stdout and stderr of the container.
    fn fetch_logs(&self, id: &str) -> Result<String>;

    /// Check running state of all containers matching a name prefix in a single call.
    /// Returns a map of container name -> is_running.
    fn running_containers(&self, prefix: &str) -> HashMap<String, bool>;
}
