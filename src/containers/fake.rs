//! In-memory runtime for exercising the fixture layer without a container engine.
//!
//! Every call is appended to an ordered log so tests can assert on sequencing
//! (for example that no `create` happens before the last `pull` returns).

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::container_interface::{
    ContainerRuntimeInterface, CreateOptions, ExposedPort, PortBinding,
};
use super::error::{Result, RuntimeError};
use super::image::ImageRef;

/// One recorded runtime call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListLocalImages,
    Pull(String),
    PullFinished(String),
    Inspect(String),
    Create {
        identity: String,
        name: String,
        port_bindings: Vec<PortBinding>,
    },
    Start(String),
    Stop(String),
    Kill(String),
    Remove(String),
    FetchLogs(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeState {
    Created,
    Running,
    Stopped,
}

struct FakeContainer {
    name: String,
    identity: String,
    state: FakeState,
}

#[derive(Default)]
struct Inner {
    calls: Vec<Call>,
    local: HashSet<String>,
    registry: HashMap<String, Vec<ExposedPort>>,
    containers: HashMap<String, FakeContainer>,
    logs: HashMap<String, String>,
    next_id: usize,
    pulls_in_flight: usize,
    max_pulls_in_flight: usize,
    fail_list: bool,
    fail_pull: HashSet<String>,
    fail_inspect: HashSet<String>,
    fail_create: HashSet<String>,
    fail_start: HashSet<String>,
}

#[derive(Default)]
pub struct FakeRuntime {
    inner: Mutex<Inner>,
    pull_delay: Duration,
}

fn ports(exposed: &[&str]) -> Vec<ExposedPort> {
    exposed.iter().filter_map(|p| ExposedPort::parse(p)).collect()
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner_mut(&mut self) -> &mut Inner {
        self.inner.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// An image already present locally, exposing `exposed` (e.g. `["6379/tcp"]`).
    pub fn with_local_image(mut self, identity: &str, exposed: &[&str]) -> Self {
        let inner = self.inner_mut();
        inner.local.insert(identity.to_string());
        inner.registry.insert(identity.to_string(), ports(exposed));
        self
    }

    /// An image that can be pulled but is not yet local.
    pub fn with_remote_image(mut self, identity: &str, exposed: &[&str]) -> Self {
        self.inner_mut()
            .registry
            .insert(identity.to_string(), ports(exposed));
        self
    }

    pub fn with_pull_delay(mut self, delay: Duration) -> Self {
        self.pull_delay = delay;
        self
    }

    /// Log text returned for every container created from `identity`.
    pub fn with_logs(mut self, identity: &str, logs: &str) -> Self {
        self.inner_mut()
            .logs
            .insert(identity.to_string(), logs.to_string());
        self
    }

    pub fn fail_list_images(mut self) -> Self {
        self.inner_mut().fail_list = true;
        self
    }

    pub fn fail_pull(mut self, identity: &str) -> Self {
        self.inner_mut().fail_pull.insert(identity.to_string());
        self
    }

    pub fn fail_inspect(mut self, identity: &str) -> Self {
        self.inner_mut().fail_inspect.insert(identity.to_string());
        self
    }

    pub fn fail_create(mut self, identity: &str) -> Self {
        self.inner_mut().fail_create.insert(identity.to_string());
        self
    }

    pub fn fail_start(mut self, identity: &str) -> Self {
        self.inner_mut().fail_start.insert(identity.to_string());
        self
    }

    /// All calls so far, in the order they reached the runtime.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn pull_count(&self, identity: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Pull(i) if i == identity))
            .count()
    }

    /// Highest number of pulls observed running at the same time.
    pub fn max_concurrent_pulls(&self) -> usize {
        self.lock().max_pulls_in_flight
    }

    pub fn container_state(&self, id: &str) -> Option<FakeState> {
        self.lock().containers.get(id).map(|c| c.state)
    }

    pub fn has_local_image(&self, identity: &str) -> bool {
        self.lock().local.contains(identity)
    }

    /// Stop a container behind the fixture's back, as a crashed dependency would.
    pub fn stop_externally(&self, id: &str) {
        if let Some(c) = self.lock().containers.get_mut(id) {
            c.state = FakeState::Stopped;
        }
    }
}

impl ContainerRuntimeInterface for FakeRuntime {
    fn is_available(&self) -> bool {
        true
    }

    fn is_daemon_running(&self) -> bool {
        true
    }

    fn get_version(&self) -> Result<String> {
        Ok("fake 0.0.0".to_string())
    }

    fn list_local_images(&self) -> Result<Vec<String>> {
        let mut inner = self.lock();
        inner.calls.push(Call::ListLocalImages);
        if inner.fail_list {
            return Err(RuntimeError::DaemonNotRunning);
        }
        let mut images: Vec<String> = inner.local.iter().cloned().collect();
        images.sort();
        Ok(images)
    }

    fn pull_image(&self, image: &ImageRef, on_output: &mut dyn FnMut(&str)) -> Result<()> {
        let identity = image.identity();
        {
            let mut inner = self.lock();
            inner.calls.push(Call::Pull(identity.clone()));
            inner.pulls_in_flight += 1;
            inner.max_pulls_in_flight = inner.max_pulls_in_flight.max(inner.pulls_in_flight);
        }

        on_output(&format!("{}: Pulling from {}", image.tag, image.repository));
        if !self.pull_delay.is_zero() {
            std::thread::sleep(self.pull_delay);
        }

        let mut inner = self.lock();
        inner.pulls_in_flight -= 1;
        inner.calls.push(Call::PullFinished(identity.clone()));

        if inner.fail_pull.contains(&identity) {
            return Err(RuntimeError::PullFailed(format!("{identity}: injected failure")));
        }
        if !inner.registry.contains_key(&identity) {
            return Err(RuntimeError::ImageNotFound(identity));
        }
        on_output(&format!("Status: Downloaded newer image for {identity}"));
        inner.local.insert(identity);
        Ok(())
    }

    fn inspect_exposed_ports(&self, identity: &str) -> Result<Vec<ExposedPort>> {
        let mut inner = self.lock();
        inner.calls.push(Call::Inspect(identity.to_string()));
        if inner.fail_inspect.contains(identity) || !inner.local.contains(identity) {
            return Err(RuntimeError::ImageNotFound(identity.to_string()));
        }
        Ok(inner.registry.get(identity).cloned().unwrap_or_default())
    }

    fn create_container(&self, options: &CreateOptions) -> Result<String> {
        let identity = options.image.identity();
        let mut inner = self.lock();
        inner.calls.push(Call::Create {
            identity: identity.clone(),
            name: options.name.clone(),
            port_bindings: options.port_bindings.clone(),
        });
        if inner.fail_create.contains(&identity) {
            return Err(RuntimeError::CreateFailed(format!("{identity}: injected failure")));
        }
        if inner.containers.values().any(|c| c.name == options.name) {
            return Err(RuntimeError::ContainerAlreadyExists(options.name.clone()));
        }

        inner.next_id += 1;
        let id = format!("fake{:04}", inner.next_id);
        inner.containers.insert(
            id.clone(),
            FakeContainer {
                name: options.name.clone(),
                identity,
                state: FakeState::Created,
            },
        );
        Ok(id)
    }

    fn start_container(&self, id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(Call::Start(id.to_string()));
        let fail_start = inner.fail_start.clone();
        let container = inner
            .containers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.to_string()))?;
        if fail_start.contains(&container.identity) {
            return Err(RuntimeError::StartFailed(format!(
                "{id}: port is already allocated"
            )));
        }
        container.state = FakeState::Running;
        Ok(())
    }

    fn stop_container(&self, id: &str, _timeout: Duration) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(Call::Stop(id.to_string()));
        let container = inner
            .containers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.to_string()))?;
        container.state = FakeState::Stopped;
        Ok(())
    }

    fn kill_container(&self, id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(Call::Kill(id.to_string()));
        let container = inner
            .containers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.to_string()))?;
        if container.state != FakeState::Running {
            return Err(RuntimeError::KillFailed(format!("{id} is not running")));
        }
        container.state = FakeState::Stopped;
        Ok(())
    }

    fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(Call::Remove(id.to_string()));
        let state = inner
            .containers
            .get(id)
            .map(|c| c.state)
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.to_string()))?;
        if state == FakeState::Running && !force {
            return Err(RuntimeError::RemoveFailed(format!("{id} is running")));
        }
        inner.containers.remove(id);
        Ok(())
    }

    fn fetch_logs(&self, id: &str) -> Result<String> {
        let mut inner = self.lock();
        inner.calls.push(Call::FetchLogs(id.to_string()));
        let container = inner
            .containers
            .get(id)
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.to_string()))?;
        Ok(inner
            .logs
            .get(&container.identity)
            .cloned()
            .unwrap_or_default())
    }

    fn running_containers(&self, prefix: &str) -> HashMap<String, bool> {
        self.lock()
            .containers
            .values()
            .filter(|c| c.name.starts_with(prefix))
            .map(|c| (c.name.clone(), c.state == FakeState::Running))
            .collect()
    }
}
