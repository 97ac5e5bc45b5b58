//! The handle returned to a test: port lookup plus teardown.

use std::collections::HashMap;
use std::fmt::{self, Display, Write as _};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::containers::{ContainerRuntime, ContainerRuntimeInterface, ImageRef, RuntimeError};
use crate::report::Reporter;

use super::error::{TeardownError, TeardownFailure};
use super::PortMappings;

/// A container this fixture created and started.
#[derive(Debug, Clone)]
pub struct ProvisionedContainer {
    pub id: String,
    pub name: String,
    pub image: ImageRef,
    /// `container port -> host port` for this container alone.
    pub ports: PortMappings,
}

/// Owns the containers started by one provisioning call.
///
/// `close` is the happy-path teardown. `fail`/`fail_now` additionally collect
/// every container's logs into the failure report before aborting the test.
/// A fixture that is dropped without being closed closes itself; when that
/// drop happens during a panic, container logs are reported first.
pub struct Fixture<R: ContainerRuntimeInterface = ContainerRuntime> {
    runtime: Arc<R>,
    reporter: Arc<dyn Reporter>,
    containers: Vec<ProvisionedContainer>,
    port_mappings: PortMappings,
    stop_timeout: Duration,
    remove_on_close: bool,
    closed: AtomicBool,
}

impl<R: ContainerRuntimeInterface> Fixture<R> {
    pub(crate) fn new(
        runtime: Arc<R>,
        reporter: Arc<dyn Reporter>,
        stop_timeout: Duration,
        remove_on_close: bool,
    ) -> Self {
        Self {
            runtime,
            reporter,
            containers: Vec::new(),
            port_mappings: HashMap::new(),
            stop_timeout,
            remove_on_close,
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn push(&mut self, container: ProvisionedContainer) {
        for (container_port, host_port) in &container.ports {
            if let Some(previous) = self
                .port_mappings
                .insert(container_port.clone(), host_port.clone())
            {
                if previous != *host_port {
                    tracing::warn!(
                        "Port {} of {} replaces earlier mapping to host port {}",
                        container_port,
                        container.image,
                        previous
                    );
                }
            }
        }
        self.containers.push(container);
    }

    /// Host port bound to `container_port` (e.g. `"6379"`), if any container exposed it.
    pub fn port_mapping(&self, container_port: &str) -> Option<&str> {
        self.port_mappings.get(container_port).map(String::as_str)
    }

    /// Numeric form of [`Fixture::port_mapping`].
    pub fn host_port(&self, container_port: u16) -> Option<u16> {
        self.port_mapping(&container_port.to_string())?.parse().ok()
    }

    pub fn port_mappings(&self) -> &PortMappings {
        &self.port_mappings
    }

    pub fn containers(&self) -> &[ProvisionedContainer] {
        &self.containers
    }

    pub fn ids(&self) -> Vec<&str> {
        self.containers.iter().map(|c| c.id.as_str()).collect()
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop (and optionally remove) every owned container.
    ///
    /// Each failure is reported through `Reporter::error` and collected;
    /// one container failing to stop never blocks the others. Calling this
    /// again is safe and reports one error per container that is already gone.
    pub fn close(&self) -> Result<(), TeardownError> {
        self.closed.store(true, Ordering::Release);

        let mut failures = Vec::new();
        for container in &self.containers {
            if let Err(source) = self.stop_one(container) {
                self.reporter.error(&format!(
                    "Failed to stop container {} ({}) - {}",
                    container.image, container.id, source
                ));
                failures.push(TeardownFailure {
                    id: container.id.clone(),
                    image: container.image.identity(),
                    source,
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(TeardownError { failures })
        }
    }

    fn stop_one(&self, container: &ProvisionedContainer) -> Result<(), RuntimeError> {
        match self.runtime.stop_container(&container.id, self.stop_timeout) {
            Ok(()) => {}
            Err(e @ RuntimeError::ContainerNotFound(_)) => return Err(e),
            Err(e) => {
                tracing::warn!("Stop of {} failed ({}), killing", container.id, e);
                self.runtime.kill_container(&container.id)?;
            }
        }

        if self.remove_on_close {
            self.runtime.remove_container(&container.id, false)?;
        }

        tracing::debug!("Tore down {} ({})", container.image, container.id);
        Ok(())
    }

    /// Logs of every owned container, one labelled section each.
    pub fn collect_logs(&self) -> String {
        let mut out = String::new();
        for container in &self.containers {
            let _ = write!(
                out,
                "\n--- {} ({} {}) ---\n",
                container.image, container.name, container.id
            );
            match self.runtime.fetch_logs(&container.id) {
                Ok(logs) => out.push_str(&logs),
                Err(e) => {
                    let _ = write!(out, "<failed to fetch logs: {e}>");
                }
            }
        }
        out
    }

    /// Tear down, attach container logs to `message` and abort the test.
    ///
    /// Accepts anything printable, so `fixture.fail(format_args!("{} != {}", a, b))`
    /// covers formatted messages.
    pub fn fail(&self, message: impl Display) -> ! {
        // Logs first: removal on close would discard them.
        let logs = self.collect_logs();
        let _ = self.close();
        self.reporter.fatal(&format!("{message}{logs}"))
    }

    /// [`Fixture::fail`] without a message.
    pub fn fail_now(&self) -> ! {
        self.fail("fixture failed")
    }
}

impl<R: ContainerRuntimeInterface> fmt::Debug for Fixture<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fixture")
            .field("containers", &self.containers)
            .field("port_mappings", &self.port_mappings)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<R: ContainerRuntimeInterface> Drop for Fixture<R> {
    fn drop(&mut self) {
        if self.is_closed() || self.containers.is_empty() {
            return;
        }
        if std::thread::panicking() {
            let logs = self.collect_logs();
            self.reporter
                .error(&format!("Test panicked, container logs:{logs}"));
        }
        let _ = self.close();
    }
}
